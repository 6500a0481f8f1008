use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use crate::domain::cluster::{Cluster, ClusterRegistry};
use crate::domain::jobspec::resource_tree::{ResourceKey, ResourceTree};
use crate::domain::jobspec::{Jobspec, Requirement};
use crate::domain::subsystem::{CONTAINMENT, GraphKey, GraphNode, SOFTWARE, SubsystemGraph};
use crate::domain::utils::id::ClusterName;

/// Target of the structured per-cluster match events.
pub const ANALYTICS_TARGET: &str = "match_analytics";

/// Resource type that is matched by its children only; it never corresponds to a vertex.
const SLOT: &str = "slot";

/// Verdict for one cluster. A negative verdict is a normal outcome, not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchResult {
    pub cluster: ClusterName,
    pub satisfied: bool,

    /// Ordered, human readable steps, e.g. `(2/4) found resource core`.
    pub trace: Vec<String>,

    /// Why the cluster was rejected, e.g. `No Matches due to containment`.
    pub reason: Option<String>,
}

impl MatchResult {
    fn success(cluster: ClusterName, trace: Vec<String>) -> Self {
        MatchResult { cluster, satisfied: true, trace, reason: None }
    }

    fn failure(cluster: ClusterName, trace: Vec<String>, reason: impl Into<String>) -> Self {
        MatchResult { cluster, satisfied: false, trace, reason: Some(reason.into()) }
    }
}

/// Results of matching one jobspec against every registered cluster, in registry order.
#[derive(Debug, Clone, Default)]
pub struct SatisfyReport {
    pub results: Vec<MatchResult>,
}

impl SatisfyReport {
    pub fn satisfied(&self) -> Vec<&MatchResult> {
        self.results.iter().filter(|result| result.satisfied).collect()
    }

    /// A run succeeds when any cluster can take the job.
    pub fn any_satisfied(&self) -> bool {
        self.results.iter().any(|result| result.satisfied)
    }

    pub fn satisfied_clusters(&self) -> Vec<ClusterName> {
        self.satisfied().into_iter().map(|result| result.cluster.clone()).collect()
    }
}

/// Decides whether `cluster` can run `jobspec`.
///
/// **Phase 1** checks every `requires.<kind>` entry against the cluster's subsystems of that
/// kind. **Phase 2** co-walks the job's resource tree and the containment graph. Both must pass.
pub fn satisfy(jobspec: &Jobspec, cluster: &Cluster) -> MatchResult {
    let mut trace = Vec::new();

    if let Err(reason) = software_pass(jobspec, cluster, &mut trace) {
        log::debug!("Cluster {} rejected: {}", cluster.name, reason);
        return MatchResult::failure(cluster.name.clone(), trace, reason);
    }

    if jobspec.resources.is_empty() {
        return MatchResult::success(cluster.name.clone(), trace);
    }

    let Some(graph) = cluster.containment() else {
        log::debug!("Cluster {} has no containment subsystem", cluster.name);
        return MatchResult::failure(cluster.name.clone(), trace, "No Matches due to containment");
    };

    let mut walk = ContainmentWalk::new(&jobspec.resources, graph);
    let satisfied = walk.satisfy_level(jobspec.resources.roots(), &graph.roots());
    trace.extend(walk.trace);

    if satisfied {
        MatchResult::success(cluster.name.clone(), trace)
    } else {
        log::debug!("Cluster {} cannot provide the requested resources", cluster.name);
        MatchResult::failure(cluster.name.clone(), trace, "No Matches due to containment")
    }
}

/// Matches `jobspec` against every cluster concurrently, one blocking task per cluster.
///
/// Matching is CPU bound and holds no shared mutable state, so each cluster runs on the
/// blocking pool. Results come back in registry order regardless of completion order.
pub async fn satisfy_all(jobspec: Arc<Jobspec>, registry: &ClusterRegistry) -> SatisfyReport {
    let handles: Vec<_> = registry
        .clusters()
        .iter()
        .map(|cluster| {
            let job = Arc::clone(&jobspec);
            let cluster = Arc::clone(cluster);
            let name = cluster.name.clone();
            let handle = tokio::task::spawn_blocking(move || {
                let started = Instant::now();
                let result = satisfy(&job, &cluster);
                (result, started.elapsed().as_micros())
            });
            (name, handle)
        })
        .collect();

    let mut results = Vec::with_capacity(handles.len());
    for (name, handle) in handles {
        let result = match handle.await {
            Ok((result, processing_time)) => {
                log_match(&result, processing_time);
                result
            }
            Err(e) => {
                log::error!("Matcher task for cluster {} failed: {}", name, e);
                MatchResult::failure(name, Vec::new(), format!("Matcher task failed: {}", e))
            }
        };
        results.push(result);
    }

    log::info!("Matched job against {} cluster(s), {} satisfied", results.len(), results.iter().filter(|r| r.satisfied).count());
    SatisfyReport { results }
}

fn log_match(result: &MatchResult, processing_time: u128) {
    if result.satisfied {
        tracing::info!(
            target: ANALYTICS_TARGET,
            LogDescription = "Cluster match finished",
            Cluster = %result.cluster,
            Satisfied = result.satisfied,
            TraceSteps = result.trace.len(),
            ProcessingTimeMicros = processing_time as u64,
        );
    } else {
        tracing::info!(
            target: ANALYTICS_TARGET,
            LogDescription = "Cluster match finished",
            Cluster = %result.cluster,
            Satisfied = result.satisfied,
            TraceSteps = result.trace.len(),
            Reason = result.reason.as_deref().unwrap_or_default(),
            ProcessingTimeMicros = processing_time as u64,
        );
    }
}

fn software_pass(jobspec: &Jobspec, cluster: &Cluster, trace: &mut Vec<String>) -> Result<(), String> {
    for (kind, requirements) in &jobspec.attributes.system.requires {
        if kind == CONTAINMENT || requirements.is_empty() {
            continue;
        }

        let subsystems = cluster.subsystems_of_kind(kind);
        if subsystems.is_empty() {
            return Err(format!("No Matches due to missing {} subsystem", kind));
        }

        match subsystems.iter().find(|graph| provides_all(graph, kind, requirements)) {
            Some(graph) => trace.push(format!("{} requirements satisfied by subsystem {}", kind, graph.name)),
            None => {
                let names: Vec<String> = subsystems.iter().map(|graph| graph.name.to_string()).collect();
                return Err(format!("No Matches due to {}", names.join(", ")));
            }
        }
    }
    Ok(())
}

/// All requirements must be found below one and the same root, e.g. one package manager.
fn provides_all(graph: &SubsystemGraph, kind: &str, requirements: &[Requirement]) -> bool {
    graph.roots().into_iter().filter(|root| kind != SOFTWARE || graph.node(*root).typ == SOFTWARE).any(|root| {
        let subtree = graph.descendants(root);
        requirements.iter().all(|requirement| subtree.iter().any(|key| requirement_matches(requirement, graph.node(*key))))
    })
}

fn requirement_matches(requirement: &Requirement, node: &GraphNode) -> bool {
    if node.name != requirement.name {
        return false;
    }
    if let Some(typ) = &requirement.typ {
        if &node.typ != typ {
            return false;
        }
    }
    requirement.attributes.iter().all(|(key, value)| node.attributes.get(key) == Some(value))
}

/// Greedy first-fit co-walk of a resource tree over a containment graph.
///
/// Vertices accepted for one resource are claimed so a sibling or a later slot repetition can
/// never count them again. When a candidate's nested requirements fail, every claim made below
/// it is released and the next candidate is tried; sibling choices that already succeeded are
/// never revisited.
struct ContainmentWalk<'a> {
    tree: &'a ResourceTree,
    graph: &'a SubsystemGraph,
    claimed: HashSet<GraphKey>,
    claim_log: Vec<GraphKey>,
    trace: Vec<String>,
}

impl<'a> ContainmentWalk<'a> {
    fn new(tree: &'a ResourceTree, graph: &'a SubsystemGraph) -> Self {
        ContainmentWalk { tree, graph, claimed: HashSet::new(), claim_log: Vec::new(), trace: Vec::new() }
    }

    fn satisfy_level(&mut self, resources: &[ResourceKey], frontier: &[GraphKey]) -> bool {
        resources.iter().all(|resource| self.satisfy_resource(*resource, frontier))
    }

    fn satisfy_resource(&mut self, resource: ResourceKey, frontier: &[GraphKey]) -> bool {
        let (tree, graph) = (self.tree, self.graph);
        let node = tree.node(resource);

        if node.typ == SLOT {
            for repetition in 1..=node.count {
                if !self.satisfy_level(&node.with, frontier) {
                    return false;
                }
                let verb = if repetition == node.count { "satisfied" } else { "found" };
                self.trace.push(format!("({}/{}) {} resource {}", repetition, node.count, verb, SLOT));
            }
            return true;
        }

        let needed = node.count;
        let mut found = 0u64;

        for candidate in graph.nearest_of_type(frontier, &node.typ) {
            if found >= needed {
                break;
            }
            if self.claimed.contains(&candidate) {
                continue;
            }

            let mark = self.claim_log.len();
            self.claim(candidate);

            if !node.with.is_empty() && !self.satisfy_level(&node.with, graph.children(candidate)) {
                self.release_to(mark);
                continue;
            }

            found = found.saturating_add(graph.node(candidate).count);
            if found >= needed {
                self.trace.push(format!("({}/{}) satisfied resource {}", needed, needed, node.typ));
            } else {
                self.trace.push(format!("({}/{}) found resource {}", found, needed, node.typ));
            }
        }

        found >= needed
    }

    fn claim(&mut self, key: GraphKey) {
        self.claimed.insert(key);
        self.claim_log.push(key);
    }

    fn release_to(&mut self, mark: usize) {
        for key in self.claim_log.drain(mark..) {
            self.claimed.remove(&key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::utils::id::SubsystemName;

    fn cluster_with_cores(cores: usize) -> Cluster {
        let mut graph = SubsystemGraph::new(SubsystemName::new("containment"), CONTAINMENT);
        let root = graph.add_node(GraphNode::new("0", "cluster", "c"));
        let node = graph.add_node(GraphNode::new("1", "node", "n0"));
        graph.add_edge(root, node);
        for i in 0..cores {
            let core = graph.add_node(GraphNode::new(format!("core{}", i), "core", format!("core{}", i)));
            graph.add_edge(node, core);
        }
        let mut cluster = Cluster::new(ClusterName::new("c"));
        cluster.add_subsystem(graph).unwrap();
        cluster
    }

    fn job(doc: &str) -> Jobspec {
        Jobspec::from_document(doc).unwrap()
    }

    #[test]
    fn test_slot_repetitions_claim_distinct_cores() {
        let spec = job(
            "version: 1\nresources:\n- type: slot\n  count: 2\n  label: task\n  with:\n  - type: core\n    count: 2\ntasks:\n- command: [hostname]\n  slot: task\n",
        );

        assert!(satisfy(&spec, &cluster_with_cores(4)).satisfied);

        let result = satisfy(&spec, &cluster_with_cores(3));
        assert!(!result.satisfied);
        assert_eq!(result.reason.as_deref(), Some("No Matches due to containment"));
        assert!(result.trace.contains(&"(1/2) found resource slot".to_string()));
    }

    #[test]
    fn test_missing_containment_graph_fails() {
        let spec = job("version: 1\nresources:\n- type: core\n  count: 1\n");
        let result = satisfy(&spec, &Cluster::new(ClusterName::new("empty")));
        assert!(!result.satisfied);
        assert_eq!(result.reason.as_deref(), Some("No Matches due to containment"));
    }

    #[test]
    fn test_missing_required_subsystem_kind_fails() {
        let spec = job("version: 1\nattributes:\n  system:\n    requires:\n      software:\n      - name: curl\n");
        let result = satisfy(&spec, &cluster_with_cores(1));
        assert_eq!(result.reason.as_deref(), Some("No Matches due to missing software subsystem"));
    }
}

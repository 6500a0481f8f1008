use std::collections::{BTreeMap, HashMap};

use slotmap::{SecondaryMap, SlotMap, new_key_type};

use crate::api::subsystem_dto::SubsystemGraphDto;
use crate::domain::utils::id::{ClusterName, SubsystemName};
use crate::error::ConversionError;

new_key_type! {
    pub struct GraphKey;
}

/// Subsystem kind describing the physical hierarchy of a cluster.
pub const CONTAINMENT: &str = "containment";

/// Subsystem kind describing installed software; its roots are of type `software`.
pub const SOFTWARE: &str = "software";

/// One vertex of a subsystem graph.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphNode {
    /// Id used by the source document.
    pub id: String,
    pub typ: String,
    pub name: String,

    /// Units this vertex stands for; a vertex for `core` with count 4 is four cores.
    pub count: u64,
    pub attributes: BTreeMap<String, serde_json::Value>,
}

impl GraphNode {
    pub fn new(id: impl Into<String>, typ: impl Into<String>, name: impl Into<String>) -> Self {
        GraphNode { id: id.into(), typ: typ.into(), name: name.into(), count: 1, attributes: BTreeMap::new() }
    }

    pub fn with_count(mut self, count: u64) -> Self {
        self.count = count;
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }
}

/// One cluster's view of one subsystem, stored as an arena with index based edges.
///
/// Edges always point from container to contained (or provider to provided). Roots are the
/// vertices without an incoming edge, in insertion order.
#[derive(Debug, Clone)]
pub struct SubsystemGraph {
    pub name: SubsystemName,

    /// `containment`, `software`, or any other kind a generator produced.
    pub kind: String,

    nodes: SlotMap<GraphKey, GraphNode>,
    children: SecondaryMap<GraphKey, Vec<GraphKey>>,
    has_parent: SecondaryMap<GraphKey, bool>,
    order: Vec<GraphKey>,
    by_id: HashMap<String, GraphKey>,
}

impl SubsystemGraph {
    pub fn new(name: SubsystemName, kind: impl Into<String>) -> Self {
        SubsystemGraph {
            name,
            kind: kind.into(),
            nodes: SlotMap::with_key(),
            children: SecondaryMap::new(),
            has_parent: SecondaryMap::new(),
            order: Vec::new(),
            by_id: HashMap::new(),
        }
    }

    /// Converts a JGF document. The kind comes from `metadata.type`; a subsystem stored as
    /// `containment` may omit it.
    pub fn from_dto(cluster: &ClusterName, name: SubsystemName, dto: SubsystemGraphDto) -> Result<Self, ConversionError> {
        let kind = match dto.metadata.typ {
            Some(kind) => kind,
            None if name == CONTAINMENT => CONTAINMENT.to_string(),
            None => return Err(ConversionError::MissingType { cluster: cluster.to_string(), subsystem: name.to_string() }),
        };

        let Some(graph_dto) = dto.graph else {
            return Err(ConversionError::MissingGraph { cluster: cluster.to_string(), subsystem: name.to_string() });
        };

        if graph_dto.nodes.is_empty() {
            return Err(ConversionError::MissingNodes { cluster: cluster.to_string(), subsystem: name.to_string() });
        }

        let mut graph = SubsystemGraph::new(name, kind);

        for (id, node_dto) in graph_dto.nodes.iter() {
            if graph.by_id.contains_key(&id) {
                return Err(ConversionError::DuplicateNode { cluster: cluster.to_string(), subsystem: graph.name.to_string(), node: id });
            }

            let metadata = &node_dto.metadata;
            let name = metadata.name.clone().or_else(|| metadata.basename.clone()).unwrap_or_else(|| id.clone());
            let count = metadata.size.and_then(|size| u64::try_from(size).ok()).unwrap_or(1);

            graph.add_node(GraphNode { id, typ: metadata.typ.clone(), name, count, attributes: metadata.attributes.clone() });
        }

        for edge in &graph_dto.edges {
            // Flux writes every containment edge twice; the reverse direction is called `in`.
            if edge.relation() == "in" {
                continue;
            }

            let lookup = |id: String| {
                graph.by_id.get(&id).copied().ok_or(ConversionError::UnknownNode {
                    cluster: cluster.to_string(),
                    subsystem: graph.name.to_string(),
                    node: id,
                })
            };
            let source = lookup(edge.source.to_string())?;
            let target = lookup(edge.target.to_string())?;
            graph.add_edge(source, target);
        }

        log::debug!("Loaded subsystem {} ({}) for cluster {} with {} nodes", graph.name, graph.kind, cluster, graph.len());
        Ok(graph)
    }

    pub fn add_node(&mut self, node: GraphNode) -> GraphKey {
        let id = node.id.clone();
        let key = self.nodes.insert(node);
        self.children.insert(key, Vec::new());
        self.has_parent.insert(key, false);
        self.order.push(key);
        self.by_id.insert(id, key);
        key
    }

    pub fn add_edge(&mut self, parent: GraphKey, child: GraphKey) {
        if let Some(children) = self.children.get_mut(parent) {
            children.push(child);
        }
        if let Some(flag) = self.has_parent.get_mut(child) {
            *flag = true;
        }
    }

    pub fn node(&self, key: GraphKey) -> &GraphNode {
        &self.nodes[key]
    }

    pub fn find(&self, id: &str) -> Option<GraphKey> {
        self.by_id.get(id).copied()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn roots(&self) -> Vec<GraphKey> {
        self.order.iter().copied().filter(|key| !self.has_parent.get(*key).copied().unwrap_or(false)).collect()
    }

    pub fn children(&self, key: GraphKey) -> &[GraphKey] {
        self.children.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// `key` and everything below it, depth-first pre-order. Each vertex is visited once even
    /// if the generator produced a DAG.
    pub fn descendants(&self, key: GraphKey) -> Vec<GraphKey> {
        let mut seen: SecondaryMap<GraphKey, ()> = SecondaryMap::new();
        let mut order = Vec::new();
        let mut stack = vec![key];

        while let Some(current) = stack.pop() {
            if seen.insert(current, ()).is_some() {
                continue;
            }
            order.push(current);
            stack.extend(self.children(current).iter().rev().copied());
        }
        order
    }

    /// The closest vertices of type `typ` at or below each frontier vertex. The search does not
    /// descend past a hit, so a `core` inside another `core` is never offered.
    pub fn nearest_of_type(&self, frontier: &[GraphKey], typ: &str) -> Vec<GraphKey> {
        let mut seen: SecondaryMap<GraphKey, ()> = SecondaryMap::new();
        let mut found = Vec::new();
        let mut stack: Vec<GraphKey> = frontier.iter().rev().copied().collect();

        while let Some(current) = stack.pop() {
            if seen.insert(current, ()).is_some() {
                continue;
            }
            if self.nodes[current].typ == typ {
                found.push(current);
                continue;
            }
            stack.extend(self.children(current).iter().rev().copied());
        }
        found
    }

    /// Units per vertex type over the whole graph.
    pub fn count_by_type(&self) -> BTreeMap<String, u64> {
        let mut totals = BTreeMap::new();
        for node in self.nodes.values() {
            *totals.entry(node.typ.clone()).or_insert(0) += node.count;
        }
        totals
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> (SubsystemGraph, GraphKey, GraphKey) {
        let mut graph = SubsystemGraph::new(SubsystemName::new("containment"), CONTAINMENT);
        let cluster = graph.add_node(GraphNode::new("0", "cluster", "tiny"));
        let node = graph.add_node(GraphNode::new("1", "node", "node0"));
        let socket = graph.add_node(GraphNode::new("2", "socket", "socket0"));
        let core_a = graph.add_node(GraphNode::new("3", "core", "core0"));
        let core_b = graph.add_node(GraphNode::new("4", "core", "core1").with_count(2));
        graph.add_edge(cluster, node);
        graph.add_edge(node, socket);
        graph.add_edge(socket, core_a);
        graph.add_edge(socket, core_b);
        (graph, cluster, socket)
    }

    #[test]
    fn test_roots_and_descendants() {
        let (graph, cluster, _) = sample();
        assert_eq!(graph.roots(), vec![cluster]);
        assert_eq!(graph.descendants(cluster).len(), 5);
    }

    #[test]
    fn test_nearest_of_type_skips_intermediate_levels() {
        let (graph, cluster, socket) = sample();
        let cores = graph.nearest_of_type(&[cluster], "core");
        assert_eq!(cores.len(), 2);
        assert_eq!(graph.nearest_of_type(&[socket], "socket"), vec![socket]);
    }

    #[test]
    fn test_count_by_type_uses_vertex_size() {
        let (graph, _, _) = sample();
        assert_eq!(graph.count_by_type().get("core"), Some(&3));
    }
}

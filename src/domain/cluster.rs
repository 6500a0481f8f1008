use std::collections::BTreeMap;
use std::sync::Arc;

use crate::domain::subsystem::{CONTAINMENT, SubsystemGraph};
use crate::domain::utils::id::ClusterName;
use crate::error::ConversionError;

/// A candidate cluster and the subsystem graphs known for it, keyed by subsystem name.
#[derive(Debug, Clone)]
pub struct Cluster {
    pub name: ClusterName,
    subsystems: BTreeMap<String, SubsystemGraph>,
}

impl Cluster {
    pub fn new(name: ClusterName) -> Self {
        Cluster { name, subsystems: BTreeMap::new() }
    }

    pub fn add_subsystem(&mut self, graph: SubsystemGraph) -> Result<(), ConversionError> {
        let key = graph.name.to_string();
        if self.subsystems.contains_key(&key) {
            return Err(ConversionError::DuplicateSubsystem { cluster: self.name.to_string(), subsystem: key });
        }
        self.subsystems.insert(key, graph);
        Ok(())
    }

    pub fn subsystem(&self, name: &str) -> Option<&SubsystemGraph> {
        self.subsystems.get(name)
    }

    pub fn subsystems(&self) -> impl Iterator<Item = &SubsystemGraph> {
        self.subsystems.values()
    }

    /// Every subsystem of the given kind, ordered by subsystem name.
    pub fn subsystems_of_kind(&self, kind: &str) -> Vec<&SubsystemGraph> {
        self.subsystems.values().filter(|graph| graph.kind == kind).collect()
    }

    /// The physical hierarchy. Prefers a subsystem literally named `containment`.
    pub fn containment(&self) -> Option<&SubsystemGraph> {
        self.subsystems.get(CONTAINMENT).filter(|graph| graph.kind == CONTAINMENT).or_else(|| self.subsystems_of_kind(CONTAINMENT).into_iter().next())
    }
}

/// All known clusters in a stable order. Clusters are shared read-only with matcher workers.
#[derive(Debug, Clone, Default)]
pub struct ClusterRegistry {
    clusters: Vec<Arc<Cluster>>,
}

impl ClusterRegistry {
    pub fn new() -> Self {
        ClusterRegistry { clusters: Vec::new() }
    }

    pub fn add_cluster(&mut self, cluster: Cluster) {
        log::debug!("Registered cluster {} with {} subsystem(s)", cluster.name, cluster.subsystems.len());
        self.clusters.push(Arc::new(cluster));
    }

    pub fn get_cluster(&self, name: &str) -> Option<Arc<Cluster>> {
        self.clusters.iter().find(|cluster| cluster.name == name).cloned()
    }

    pub fn clusters(&self) -> &[Arc<Cluster>] {
        &self.clusters
    }

    pub fn len(&self) -> usize {
        self.clusters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
    }
}

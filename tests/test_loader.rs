use std::fs;
use std::path::Path;

use jobmatch::config::Config;
use jobmatch::error::{ConversionError, Error};
use jobmatch::loader::parser::{load_cluster_registry, load_jobspec, load_subsystem};
use jobmatch::satisfy_jobspec;
use tempfile::TempDir;

/// JGF v1: nodes as a list, containment edges written in both directions.
const LIST_CONTAINMENT: &str = r#"{
  "graph": {
    "nodes": [
      {"id": "0", "metadata": {"type": "cluster", "basename": "tiny"}},
      {"id": "1", "metadata": {"type": "node", "name": "node0"}},
      {"id": "2", "metadata": {"type": "core", "name": "core0", "size": 4}}
    ],
    "edges": [
      {"source": "0", "target": "1", "metadata": {"name": {"containment": "contains"}}},
      {"source": "1", "target": "0", "metadata": {"name": {"containment": "in"}}},
      {"source": "1", "target": "2", "metadata": {"name": {"containment": "contains"}}},
      {"source": "2", "target": "1", "metadata": {"name": {"containment": "in"}}}
    ]
  }
}"#;

/// JGF v2: nodes keyed by id, integer edge endpoints.
const MAP_SOFTWARE: &str = r#"{
  "graph": {
    "nodes": {
      "1": {"metadata": {"type": "software", "name": "spack"}},
      "2": {"metadata": {"type": "package", "name": "curl"}},
      "3": {"metadata": {"type": "binary", "name": "curl"}}
    },
    "edges": [
      {"source": 1, "target": 2},
      {"source": 2, "target": 3}
    ]
  },
  "metadata": {"type": "software"}
}"#;

fn write_graph(root: &Path, cluster: &str, subsystem: &str, document: &str) {
    let dir = root.join(cluster).join(subsystem);
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("graph.json"), document).unwrap();
}

#[test]
fn test_list_layout_skips_reverse_edges() {
    let store = TempDir::new().unwrap();
    write_graph(store.path(), "tiny", "containment", LIST_CONTAINMENT);

    let (cluster, graph) = load_subsystem(&store.path().join("tiny/containment/graph.json")).unwrap();
    assert_eq!(cluster, "tiny");
    assert_eq!(graph.kind, "containment");
    assert_eq!(graph.len(), 3);
    assert_eq!(graph.roots().len(), 1);

    let root = graph.roots()[0];
    assert_eq!(graph.node(root).name, "tiny");
    assert_eq!(graph.count_by_type().get("core"), Some(&4));
}

#[test]
fn test_map_layout_with_numeric_ids() {
    let store = TempDir::new().unwrap();
    write_graph(store.path(), "tiny", "spack", MAP_SOFTWARE);

    let (_, graph) = load_subsystem(&store.path().join("tiny/spack/graph.json")).unwrap();
    assert_eq!(graph.kind, "software");
    assert_eq!(graph.name, "spack");
    assert_eq!(graph.descendants(graph.roots()[0]).len(), 3);
}

#[test]
fn test_missing_type_outside_containment_is_an_error() {
    let store = TempDir::new().unwrap();
    write_graph(store.path(), "tiny", "modules", LIST_CONTAINMENT);

    let result = load_subsystem(&store.path().join("tiny/modules/graph.json"));
    assert!(matches!(result, Err(Error::ConversionError(ConversionError::MissingType { .. }))));
}

#[test]
fn test_edge_to_unknown_node_is_an_error() {
    let store = TempDir::new().unwrap();
    let document = r#"{"graph": {"nodes": [{"id": "0", "metadata": {"type": "node"}}], "edges": [{"source": "0", "target": "9"}]}}"#;
    write_graph(store.path(), "tiny", "containment", document);

    let result = load_subsystem(&store.path().join("tiny/containment/graph.json"));
    assert!(matches!(result, Err(Error::ConversionError(ConversionError::UnknownNode { .. }))));
}

#[test]
fn test_missing_and_empty_store() {
    let store = TempDir::new().unwrap();

    let missing = load_cluster_registry(&store.path().join("clusters"));
    assert!(matches!(missing, Err(Error::ConversionError(ConversionError::MissingStore(_)))));

    fs::create_dir_all(store.path().join("clusters/tiny/containment")).unwrap();
    let empty = load_cluster_registry(&store.path().join("clusters"));
    assert!(matches!(empty, Err(Error::ConversionError(ConversionError::EmptyStore(_)))));
}

#[test]
fn test_registry_is_ordered_by_directory_name() {
    let store = TempDir::new().unwrap();
    for cluster in ["zeta", "alpha", "mid"] {
        write_graph(store.path(), cluster, "containment", LIST_CONTAINMENT);
    }
    write_graph(store.path(), "alpha", "spack", MAP_SOFTWARE);

    let registry = load_cluster_registry(store.path()).unwrap();
    let names: Vec<String> = registry.clusters().iter().map(|cluster| cluster.name.to_string()).collect();
    assert_eq!(names, vec!["alpha", "mid", "zeta"]);

    let alpha = registry.get_cluster("alpha").unwrap();
    assert_eq!(alpha.subsystems().count(), 2);
    assert!(alpha.containment().is_some());
}

#[test]
fn test_load_jobspec_reports_validation_issues() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("job.yaml");
    fs::write(&path, "version: 2\nresources:\n- type: core\n  count: 0\n").unwrap();

    match load_jobspec(&path) {
        Err(Error::ValidationError(e)) => {
            assert!(e.has_issue_at("version"));
            assert!(e.has_issue_at("resources[0].count"));
        }
        other => panic!("expected validation issues, got {:?}", other.map(|_| ())),
    }
}

#[tokio::test]
async fn test_satisfy_jobspec_end_to_end() {
    let store = TempDir::new().unwrap();
    let clusters = store.path().join("clusters");
    write_graph(&clusters, "tiny", "containment", LIST_CONTAINMENT);
    write_graph(&clusters, "tiny", "spack", MAP_SOFTWARE);

    let job = store.path().join("job.yaml");
    fs::write(
        &job,
        "version: 1\nresources:\n- type: node\n  count: 1\n  with:\n  - type: core\n    count: 4\nattributes:\n  system:\n    requires:\n      software:\n      - name: curl\n        type: binary\n",
    )
    .unwrap();

    let report = satisfy_jobspec(&job, &Config::new(store.path())).await.unwrap();
    assert!(report.any_satisfied(), "{:?}", report);
    assert_eq!(report.results.len(), 1);
}

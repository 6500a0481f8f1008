use serde::de::DeserializeOwned;
use std::fs;
use std::path::Path;

use crate::api::subsystem_dto::SubsystemGraphDto;
use crate::domain::cluster::{Cluster, ClusterRegistry};
use crate::domain::jobspec::Jobspec;
use crate::domain::subsystem::SubsystemGraph;
use crate::domain::utils::id::{ClusterName, SubsystemName};
use crate::error::{ConversionError, Error, ParseError, Result};

/// File name of a subsystem graph inside `<root>/<cluster>/<subsystem>/`.
pub const GRAPH_FILE: &str = "graph.json";

/// Reads a whole file as text.
///
/// Errors are converted into `crate::error::Error::IoError` if the file cannot be read.
pub fn read_text(file_path: &Path) -> Result<String> {
    fs::read_to_string(file_path).map_err(Error::IoError)
}

/// Parses a JSON file into a given type `T`.
pub fn parse_json_file<T: DeserializeOwned>(file_path: &Path) -> Result<T> {
    let data = read_text(file_path)?;

    let parsed_data: T = serde_json::from_str(&data).map_err(ParseError::Json)?;

    Ok(parsed_data)
}

/// Parses a JSON or YAML file into `T`, chosen by extension. Unknown extensions are read as
/// YAML, which also accepts JSON.
pub fn parse_document_file<T: DeserializeOwned>(file_path: &Path) -> Result<T> {
    match file_path.extension().and_then(|ext| ext.to_str()) {
        Some("json") => parse_json_file(file_path),
        _ => {
            let data = read_text(file_path)?;
            Ok(serde_yaml::from_str(&data).map_err(ParseError::Yaml)?)
        }
    }
}

/// Loads and validates a canonical jobspec document.
pub fn load_jobspec(file_path: &Path) -> Result<Jobspec> {
    let text = read_text(file_path)?;
    let jobspec = match file_path.extension().and_then(|ext| ext.to_str()) {
        Some("json") => Jobspec::from_json(&text)?,
        _ => Jobspec::from_document(&text)?,
    };
    log::debug!("Loaded jobspec {} with {} resource(s)", file_path.display(), jobspec.resources.len());
    Ok(jobspec)
}

/// Cluster and subsystem names encoded in `<root>/<cluster>/<subsystem>/graph.json`.
fn store_names(graph_path: &Path) -> Result<(ClusterName, SubsystemName)> {
    let invalid = || Error::ConversionError(ConversionError::InvalidStorePath(graph_path.display().to_string()));

    let subsystem_dir = graph_path.parent().ok_or_else(invalid)?;
    let cluster_dir = subsystem_dir.parent().ok_or_else(invalid)?;
    let subsystem = subsystem_dir.file_name().and_then(|name| name.to_str()).ok_or_else(invalid)?;
    let cluster = cluster_dir.file_name().and_then(|name| name.to_str()).ok_or_else(invalid)?;

    Ok((ClusterName::new(cluster), SubsystemName::new(subsystem)))
}

/// Loads one subsystem graph from the store, naming it after its directories.
pub fn load_subsystem(graph_path: &Path) -> Result<(ClusterName, SubsystemGraph)> {
    let (cluster, subsystem) = store_names(graph_path)?;
    let dto: SubsystemGraphDto = parse_json_file(graph_path)?;
    let graph = SubsystemGraph::from_dto(&cluster, subsystem, dto)?;
    Ok((cluster, graph))
}

fn sorted_dirs(path: &Path) -> Result<Vec<std::path::PathBuf>> {
    let mut dirs = Vec::new();
    for entry in fs::read_dir(path)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            dirs.push(entry.path());
        }
    }
    dirs.sort();
    Ok(dirs)
}

/// Loads every cluster below `clusters_root`, ordered by directory name. Subsystem directories
/// without a `graph.json` are skipped.
pub fn load_cluster_registry(clusters_root: &Path) -> Result<ClusterRegistry> {
    if !clusters_root.is_dir() {
        return Err(ConversionError::MissingStore(clusters_root.display().to_string()).into());
    }

    let mut registry = ClusterRegistry::new();
    for cluster_dir in sorted_dirs(clusters_root)? {
        let mut cluster: Option<Cluster> = None;

        for subsystem_dir in sorted_dirs(&cluster_dir)? {
            let graph_path = subsystem_dir.join(GRAPH_FILE);
            if !graph_path.is_file() {
                log::debug!("Skipping {}, no {}", subsystem_dir.display(), GRAPH_FILE);
                continue;
            }

            let (name, graph) = load_subsystem(&graph_path)?;
            cluster.get_or_insert_with(|| Cluster::new(name)).add_subsystem(graph)?;
        }

        if let Some(cluster) = cluster {
            registry.add_cluster(cluster);
        }
    }

    if registry.is_empty() {
        return Err(ConversionError::EmptyStore(clusters_root.display().to_string()).into());
    }

    log::info!("Loaded {} cluster(s) from {}", registry.len(), clusters_root.display());
    Ok(registry)
}

use std::path::Path;
use std::sync::Arc;

use crate::config::Config;
use crate::domain::matcher::{SatisfyReport, satisfy_all};
use crate::error::Result;
use crate::loader::parser::{load_cluster_registry, load_jobspec};

pub mod api;
pub mod config;
pub mod domain;
pub mod error;
pub mod loader;
pub mod logger;

/// Loads a jobspec and every cluster of the store, then matches them.
pub async fn satisfy_jobspec(jobspec_path: &Path, config: &Config) -> Result<SatisfyReport> {
    let jobspec = load_jobspec(jobspec_path)?;
    log::info!("Jobspec {} parsed and validated.", jobspec_path.display());

    let registry = load_cluster_registry(&config.clusters_root())?;
    log::info!("Cluster registry with {} cluster(s) loaded.", registry.len());

    Ok(satisfy_all(Arc::new(jobspec), &registry).await)
}

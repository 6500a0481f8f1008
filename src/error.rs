use std::fmt;

use thiserror::Error;

use crate::domain::directive::DirectiveReport;

#[derive(Debug, Error)]
pub enum Error {
    #[error("File not found or could not be read: {0}")]
    IoError(#[from] std::io::Error),

    #[error(transparent)]
    ParseError(#[from] ParseError),

    #[error(transparent)]
    ValidationError(#[from] ValidationError),

    #[error(transparent)]
    DirectiveError(#[from] DirectiveReport),

    #[error(transparent)]
    ConversionError(#[from] ConversionError),

    #[error(transparent)]
    TranslationError(#[from] TranslationError),
}

/// Malformed input syntax, raised before any semantic check runs.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Failed to parse JSON document: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to parse YAML document: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// One semantic problem found while validating a jobspec, located by its field path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    /// Field path inside the document, e.g. `resources[0].with[1].count`.
    pub path: String,
    pub message: String,
}

impl ValidationIssue {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self { path: path.into(), message: message.into() }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// All problems found while validating a jobspec. Validation never stops at the first issue.
#[derive(Debug, Clone, Error)]
pub struct ValidationError {
    pub issues: Vec<ValidationIssue>,
}

impl ValidationError {
    /// Returns true if any issue was reported for exactly this field path.
    pub fn has_issue_at(&self, path: &str) -> bool {
        self.issues.iter().any(|issue| issue.path == path)
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Jobspec validation failed with {} problem(s):", self.issues.len())?;
        for issue in &self.issues {
            write!(f, "\n  - {}", issue)?;
        }
        Ok(())
    }
}

/// Problems turning a stored subsystem graph document into the in-memory graph.
#[derive(Debug, Error)]
pub enum ConversionError {
    #[error("Subsystem {subsystem} for cluster {cluster} is missing a graph")]
    MissingGraph { cluster: String, subsystem: String },

    #[error("Subsystem {subsystem} for cluster {cluster} is missing nodes")]
    MissingNodes { cluster: String, subsystem: String },

    #[error("Subsystem {subsystem} for cluster {cluster} is missing a type (metadata->type)")]
    MissingType { cluster: String, subsystem: String },

    #[error("Subsystem {subsystem} for cluster {cluster} defines node {node} more than once")]
    DuplicateNode { cluster: String, subsystem: String, node: String },

    #[error("Subsystem {subsystem} for cluster {cluster} has an edge to unknown node {node}")]
    UnknownNode { cluster: String, subsystem: String, node: String },

    #[error("Cluster {cluster} already has a subsystem named {subsystem}")]
    DuplicateSubsystem { cluster: String, subsystem: String },

    #[error("Subsystem graph path {0} does not follow <root>/<cluster>/<subsystem>/graph.json")]
    InvalidStorePath(String),

    #[error("User subsystem directory {0} does not exist")]
    MissingStore(String),

    #[error("There are no cluster subsystems defined under root {0}")]
    EmptyStore(String),
}

/// Failures of the translation layer. Dropped fields are not errors, see `TranslationGap`.
#[derive(Debug, Error)]
pub enum TranslationError {
    #[error("Unknown format '{0}'. Supported formats: jobspec, flux, slurm, pbs, lsf, cobalt, kubernetes")]
    UnknownFormat(String),

    #[error("The {format} export requires the field '{field}'")]
    MissingField { format: &'static str, field: &'static str },

    #[error("Could not detect the source format of {0}, please pass --from")]
    UndetectedFormat(String),
}

pub type Result<T> = std::result::Result<T, Error>;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

fn default_count() -> i64 {
    1
}

fn default_encoding() -> String {
    "utf-8".to_string()
}

/// Canonical jobspec document as it appears on disk (JSON or YAML).
///
/// Counts are kept signed here so that a zero or negative count reaches validation
/// and is reported with its field path instead of failing deserialization.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct JobspecDto {
    pub version: i64,

    #[serde(default)]
    pub resources: Vec<ResourceDto>,

    #[serde(default)]
    pub tasks: Vec<TaskDto>,

    #[serde(default)]
    pub attributes: AttributesDto,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ResourceDto {
    #[serde(rename = "type", default)]
    pub typ: String,

    #[serde(default = "default_count")]
    pub count: i64,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub with: Vec<ResourceDto>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclusive: Option<bool>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct TaskDto {
    #[serde(default)]
    pub command: Vec<String>,

    #[serde(default)]
    pub slot: String,

    #[serde(default)]
    pub count: TaskCountDto,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct TaskCountDto {
    #[serde(default = "default_count")]
    pub per_slot: i64,
}

impl Default for TaskCountDto {
    fn default() -> Self {
        Self { per_slot: default_count() }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct AttributesDto {
    #[serde(default)]
    pub system: SystemAttributesDto,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub user: BTreeMap<String, serde_json::Value>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct SystemAttributesDto {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<i64>,

    /// Requirements keyed by subsystem type, e.g. `software`.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub requires: BTreeMap<String, Vec<RequirementDto>>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub files: BTreeMap<String, FileDto>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub queue: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cwd: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container: Option<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub environment: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job: Option<JobMetaDto>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<OutputDto>,

    /// Keys this crate does not interpret are carried through untouched.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct RequirementDto {
    #[serde(default)]
    pub name: String,

    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub typ: Option<String>,

    #[serde(flatten)]
    pub attributes: BTreeMap<String, serde_json::Value>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct FileDto {
    #[serde(default)]
    pub mode: u32,

    #[serde(default = "default_encoding")]
    pub encoding: String,

    #[serde(default)]
    pub data: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct JobMetaDto {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct OutputDto {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stdout: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stderr: Option<String>,
}

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A `batch/v1` Job manifest, reduced to the fields the translation layer reads or writes.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct JobManifestDto {
    pub api_version: String,
    pub kind: String,
    pub metadata: ObjectMetaDto,
    pub spec: JobSpecDto,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMetaDto {
    #[serde(default)]
    pub name: String,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct JobSpecDto {
    #[serde(default)]
    pub backoff_limit: i64,

    #[serde(default = "default_one")]
    pub completions: i64,

    #[serde(default = "default_one")]
    pub parallelism: i64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_deadline_seconds: Option<i64>,

    pub template: PodTemplateDto,
}

fn default_one() -> i64 {
    1
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PodTemplateDto {
    pub spec: PodSpecDto,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PodSpecDto {
    #[serde(default = "default_restart_policy")]
    pub restart_policy: String,

    pub containers: Vec<ContainerDto>,
}

fn default_restart_policy() -> String {
    "Never".to_string()
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ContainerDto {
    pub name: String,

    #[serde(default)]
    pub image: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub command: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub env: Vec<EnvVarDto>,

    #[serde(default)]
    pub resources: ResourceRequirementsDto,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct EnvVarDto {
    pub name: String,

    #[serde(default)]
    pub value: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct ResourceRequirementsDto {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub limits: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub requests: BTreeMap<String, String>,
}

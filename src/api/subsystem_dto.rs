use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A subsystem graph in JSON Graph Format, as written by the external generators.
///
/// Both JGF layouts are accepted: v1 stores nodes as a list with an `id` field,
/// v2 stores them as a map keyed by id.
#[derive(Debug, Deserialize, Clone, Serialize)]
pub struct SubsystemGraphDto {
    #[serde(default)]
    pub graph: Option<GraphDto>,

    #[serde(default)]
    pub metadata: SubsystemMetadataDto,
}

#[derive(Debug, Deserialize, Clone, Serialize, Default)]
pub struct SubsystemMetadataDto {
    /// Subsystem kind, e.g. `containment` or `software`.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub typ: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Serialize)]
pub struct GraphDto {
    #[serde(default)]
    pub nodes: GraphNodesDto,

    #[serde(default)]
    pub edges: Vec<GraphEdgeDto>,
}

#[derive(Debug, Deserialize, Clone, Serialize)]
#[serde(untagged)]
pub enum GraphNodesDto {
    List(Vec<GraphNodeDto>),
    Map(BTreeMap<String, GraphNodeDto>),
}

impl Default for GraphNodesDto {
    fn default() -> Self {
        GraphNodesDto::List(Vec::new())
    }
}

impl GraphNodesDto {
    pub fn is_empty(&self) -> bool {
        match self {
            GraphNodesDto::List(nodes) => nodes.is_empty(),
            GraphNodesDto::Map(nodes) => nodes.is_empty(),
        }
    }

    /// Yields `(id, node)` pairs for either layout. Map keys win over an inner `id`.
    pub fn iter(&self) -> Box<dyn Iterator<Item = (String, &GraphNodeDto)> + '_> {
        match self {
            GraphNodesDto::List(nodes) => Box::new(nodes.iter().map(|node| {
                let id = node.id.as_ref().map(|id| id.to_string()).or_else(|| node.label.clone()).unwrap_or_default();
                (id, node)
            })),
            GraphNodesDto::Map(nodes) => Box::new(nodes.iter().map(|(id, node)| (id.clone(), node))),
        }
    }
}

/// JGF ids are strings, but some generators write plain integers.
#[derive(Debug, Deserialize, Clone, Serialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum JgfId {
    Text(String),
    Number(i64),
}

impl fmt::Display for JgfId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JgfId::Text(id) => write!(f, "{}", id),
            JgfId::Number(id) => write!(f, "{}", id),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Serialize)]
pub struct GraphNodeDto {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<JgfId>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    #[serde(default)]
    pub metadata: GraphNodeMetadataDto,
}

#[derive(Debug, Deserialize, Clone, Serialize, Default)]
pub struct GraphNodeMetadataDto {
    #[serde(rename = "type", default)]
    pub typ: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub basename: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Number of units this vertex stands for; absent means one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<i64>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Deserialize, Clone, Serialize)]
pub struct GraphEdgeDto {
    pub source: JgfId,
    pub target: JgfId,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relation: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl GraphEdgeDto {
    /// The edge relation. Flux JGF nests it as `metadata.name.<subsystem>`; anything
    /// unspecified is treated as containment.
    pub fn relation(&self) -> String {
        if let Some(relation) = &self.relation {
            return relation.clone();
        }

        self.metadata
            .as_ref()
            .and_then(|metadata| metadata.get("name"))
            .and_then(|name| match name {
                serde_json::Value::String(relation) => Some(relation.clone()),
                serde_json::Value::Object(by_subsystem) => by_subsystem.values().find_map(|v| v.as_str().map(str::to_string)),
                _ => None,
            })
            .unwrap_or_else(|| "contains".to_string())
    }
}

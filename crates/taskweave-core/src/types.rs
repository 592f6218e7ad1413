//! Context tree types shared by the store, the gateway, and the worker

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Free-form metadata attached to nodes, contexts and responses.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// Nodes of one context, in insertion order.
pub type NodeMap = IndexMap<String, ContextNode>;

fn default_content_type() -> String {
    "text/plain".to_string()
}

/// Context identifier: a server-generated UUID string.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContextId(String);

impl ContextId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ContextId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ContextId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A single prompt, completion, or caller-supplied node in a context tree.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ContextNode {
    pub id: String,
    #[serde(default)]
    pub content: String,
    #[serde(default = "default_content_type")]
    pub content_type: String,
    #[serde(default)]
    pub metadata: Metadata,
    #[serde(default)]
    pub parent: Option<String>,
    #[serde(default)]
    pub children: Vec<String>,
}

impl ContextNode {
    pub fn new(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            content_type: default_content_type(),
            metadata: Metadata::new(),
            parent: None,
            children: Vec::new(),
        }
    }

    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }
}

/// A context: the node forest plus bookkeeping.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Context {
    pub id: ContextId,
    pub model_id: String,
    pub nodes: NodeMap,
    #[serde(default)]
    pub metadata: Metadata,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Context {
    pub fn new(model_id: impl Into<String>, nodes: Vec<ContextNode>, metadata: Metadata) -> Self {
        let now = Utc::now();
        Self {
            id: ContextId::generate(),
            model_id: model_id.into(),
            nodes: nodes.into_iter().map(|n| (n.id.clone(), n)).collect(),
            metadata,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn node(&self, id: &str) -> Option<&ContextNode> {
        self.nodes.get(id)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Nodes in insertion order.
    pub fn node_list(&self) -> Vec<ContextNode> {
        self.nodes.values().cloned().collect()
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Model descriptor returned alongside context responses.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub id: String,
    pub name: String,
    pub provider: String,
    #[serde(default)]
    pub capabilities: Vec<String>,
}

impl ModelInfo {
    pub fn describe(model_id: &str, provider: &str) -> Self {
        Self {
            id: model_id.to_string(),
            name: model_id.to_string(),
            provider: provider.to_string(),
            capabilities: vec!["text-generation".to_string()],
        }
    }
}

//! Task model: what the registry hands a worker and how the worker reads it

use crate::error::{Error, Result};
use base64::Engine;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::fmt;

/// Prefix some registries put on context task types.
const TASK_TYPE_PREFIX: &str = "mcp.";

/// Declared type of a task. Anything we don't know lands in `Unsupported`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TaskKind {
    Generation,
    CreateContext,
    AddPrompt,
    AddNode,
    DeleteNode,
    DeleteContext,
    Unsupported(String),
}

impl TaskKind {
    pub fn parse(raw: &str) -> Self {
        let name = raw.strip_prefix(TASK_TYPE_PREFIX).unwrap_or(raw);
        match name {
            "generation" => TaskKind::Generation,
            "create_context" => TaskKind::CreateContext,
            "add_prompt" => TaskKind::AddPrompt,
            "add_node" => TaskKind::AddNode,
            "delete_node" => TaskKind::DeleteNode,
            "delete_context" => TaskKind::DeleteContext,
            _ => TaskKind::Unsupported(raw.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            TaskKind::Generation => "generation",
            TaskKind::CreateContext => "create_context",
            TaskKind::AddPrompt => "add_prompt",
            TaskKind::AddNode => "add_node",
            TaskKind::DeleteNode => "delete_node",
            TaskKind::DeleteContext => "delete_context",
            TaskKind::Unsupported(raw) => raw,
        }
    }

    pub fn is_context_operation(&self) -> bool {
        !matches!(self, TaskKind::Generation | TaskKind::Unsupported(_))
    }
}

impl From<String> for TaskKind {
    fn from(s: String) -> Self {
        TaskKind::parse(&s)
    }
}

impl From<TaskKind> for String {
    fn from(kind: TaskKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Task lifecycle status as the registry tracks it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    #[default]
    Pending,
    Scheduled,
    Running,
    Completed,
    Failed,
    #[serde(other)]
    Unknown,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Scheduled => "scheduled",
            TaskStatus::Running => "running",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
            TaskStatus::Unknown => "unknown",
        }
    }
}

/// Worker availability as reported to the registry.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerStatus {
    #[default]
    Unregistered,
    Available,
    Busy,
}

/// Task payload as it arrived: either already structured, or an encoded blob
/// (JSON text, or base64 of JSON text) that still needs decoding.
#[derive(Clone, Debug, PartialEq)]
pub enum TaskInput {
    Raw(Vec<u8>),
    Decoded(Value),
}

impl Default for TaskInput {
    fn default() -> Self {
        TaskInput::Decoded(Value::Null)
    }
}

impl TaskInput {
    /// Decode the payload into structured data.
    pub fn resolve(&self) -> Result<Value> {
        match self {
            TaskInput::Decoded(value) => Ok(value.clone()),
            TaskInput::Raw(bytes) => {
                if let Ok(value) = serde_json::from_slice::<Value>(bytes) {
                    return Ok(value);
                }
                let trimmed: Vec<u8> = bytes
                    .iter()
                    .copied()
                    .filter(|b| !b.is_ascii_whitespace())
                    .collect();
                let decoded = base64::engine::general_purpose::STANDARD
                    .decode(&trimmed)
                    .map_err(|_| Error::invalid_input("task input is neither JSON nor base64 JSON"))?;
                serde_json::from_slice(&decoded)
                    .map_err(|e| Error::invalid_input(format!("task input is not valid JSON: {}", e)))
            }
        }
    }

    /// Decode and deserialize into a typed request.
    pub fn parse<T: serde::de::DeserializeOwned>(&self) -> Result<T> {
        let value = self.resolve()?;
        serde_json::from_value(value)
            .map_err(|e| Error::invalid_input(format!("malformed task input: {}", e)))
    }
}

impl<'de> Deserialize<'de> for TaskInput {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(match value {
            Value::String(s) => TaskInput::Raw(s.into_bytes()),
            other => TaskInput::Decoded(other),
        })
    }
}

impl Serialize for TaskInput {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            TaskInput::Decoded(value) => value.serialize(serializer),
            TaskInput::Raw(bytes) => match std::str::from_utf8(bytes) {
                Ok(s) => serializer.serialize_str(s),
                Err(_) => serializer
                    .serialize_str(&base64::engine::general_purpose::STANDARD.encode(bytes)),
            },
        }
    }
}

/// A unit of work handed out by the task registry.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: TaskKind,
    #[serde(default)]
    pub input: TaskInput,
    #[serde(default)]
    pub worker_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_id: Option<String>,
    #[serde(default)]
    pub status: TaskStatus,
}

impl Task {
    pub fn new(id: impl Into<String>, kind: TaskKind, input: TaskInput) -> Self {
        Self {
            id: id.into(),
            kind,
            input,
            worker_id: None,
            model_name: None,
            model_id: None,
            status: TaskStatus::Scheduled,
        }
    }

    pub fn assigned_to(mut self, worker_id: impl Into<String>) -> Self {
        self.worker_id = Some(worker_id.into());
        self
    }

    pub fn is_assigned_to(&self, worker_id: &str) -> bool {
        self.worker_id.as_deref() == Some(worker_id)
    }

    /// Model named on the task itself, if any.
    pub fn model(&self) -> Option<&str> {
        self.model_name.as_deref().or(self.model_id.as_deref())
    }
}

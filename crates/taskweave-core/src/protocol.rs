//! Wire protocol: context service requests/responses, context task inputs,
//! and task registry messages.

use crate::error::ErrorKind;
use crate::task::{TaskStatus, WorkerStatus};
use crate::types::{ContextNode, Metadata, ModelInfo};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

fn default_true() -> bool {
    true
}

// ============================================================
// Context service
// ============================================================

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct CreateContextRequest {
    /// Empty means "use the service default model".
    #[serde(default)]
    pub model_id: String,
    #[serde(default)]
    pub nodes: Vec<ContextNode>,
    #[serde(default)]
    pub metadata: Metadata,
    #[serde(default = "default_true")]
    pub return_context: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CreateContextResponse {
    pub context_id: String,
    pub model: ModelInfo,
    #[serde(default)]
    pub nodes: Vec<ContextNode>,
    #[serde(default)]
    pub metadata: Metadata,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ContextResponse {
    pub context_id: String,
    pub model: ModelInfo,
    pub nodes: Vec<ContextNode>,
    #[serde(default)]
    pub metadata: Metadata,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PromptRequest {
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub metadata: Metadata,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PromptResponse {
    pub context_id: String,
    pub prompt_id: String,
    pub completion_id: String,
    pub completion: String,
    #[serde(default)]
    pub metadata: Metadata,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AddNodeRequest {
    pub node: ContextNode,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AddNodeResponse {
    pub context_id: String,
    pub node: ContextNode,
}

/// Response for both node and context deletion.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DeletedResponse {
    pub context_id: String,
    pub deleted: bool,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ListContextsResponse {
    pub contexts: Vec<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RenderResponse {
    pub context_id: String,
    pub prompt: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub kind: ErrorKind,
    pub message: String,
}

// ============================================================
// Context task inputs
// ============================================================

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AddPromptInput {
    pub context_id: String,
    #[serde(flatten)]
    pub request: PromptRequest,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AddNodeInput {
    pub context_id: String,
    pub node: ContextNode,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DeleteNodeInput {
    pub context_id: String,
    pub node_id: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DeleteContextInput {
    pub context_id: String,
}

// ============================================================
// Task registry
// ============================================================

/// Host capacity snapshot sent with registration and status updates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceMetrics {
    /// Bytes of memory available.
    pub available_memory: u64,
    /// Fraction of CPU capacity available, 0.0 to 1.0.
    pub available_cpu: f64,
    /// Fraction of accelerator capacity available, 0.0 to 1.0.
    pub available_gpu: f64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RegisterWorkerRequest {
    pub name: String,
    pub capabilities: Vec<String>,
    #[serde(flatten)]
    pub metrics: ResourceMetrics,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RegisterWorkerResponse {
    pub id: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StatusUpdate {
    pub status: WorkerStatus,
    #[serde(default)]
    pub current_task_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_status: Option<TaskStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_output: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_error: Option<String>,
    #[serde(flatten)]
    pub metrics: ResourceMetrics,
}

impl StatusUpdate {
    pub fn idle(metrics: ResourceMetrics) -> Self {
        Self {
            status: WorkerStatus::Available,
            metrics,
            ..Default::default()
        }
    }

    pub fn running(task_id: &str, metrics: ResourceMetrics) -> Self {
        Self {
            status: WorkerStatus::Busy,
            current_task_id: Some(task_id.to_string()),
            task_status: Some(TaskStatus::Running),
            metrics,
            ..Default::default()
        }
    }

    pub fn completed(task_id: &str, output: String, metrics: ResourceMetrics) -> Self {
        Self {
            status: WorkerStatus::Available,
            current_task_id: Some(task_id.to_string()),
            task_status: Some(TaskStatus::Completed),
            task_output: Some(output),
            metrics,
            ..Default::default()
        }
    }

    pub fn failed(task_id: &str, error: String, metrics: ResourceMetrics) -> Self {
        Self {
            status: WorkerStatus::Available,
            current_task_id: Some(task_id.to_string()),
            task_status: Some(TaskStatus::Failed),
            task_error: Some(error),
            metrics,
            ..Default::default()
        }
    }
}

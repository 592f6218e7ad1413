//! Task executor: runs one task at a time and reports the outcome.

use crate::coordinator::Coordinator;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use taskweave_context::ContextService;
use taskweave_core::{
    AddNodeInput, AddNodeResponse, AddPromptInput, CreateContextRequest, DeleteContextInput,
    DeleteNodeInput, DeletedResponse, Error, Result, Task, TaskKind,
};
use taskweave_llm::{finalize_completion, GenerationOptions, InferenceProvider};
use tracing::{error, info, warn};

/// Executor lifecycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExecutorState {
    #[default]
    Idle,
    Running,
    Completed,
    Failed,
}

impl ExecutorState {
    pub fn can_transition_to(&self, target: ExecutorState) -> bool {
        use ExecutorState::*;

        matches!(
            (self, target),
            (Idle, Running) |
            (Running, Completed) | (Running, Failed) |
            (Completed, Idle) | (Failed, Idle)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl std::fmt::Display for ExecutorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

fn default_max_tokens() -> u32 {
    1024
}

fn default_temperature() -> f32 {
    0.7
}

fn default_top_p() -> f32 {
    0.9
}

/// Input of a `generation` task.
#[derive(Debug, Deserialize)]
struct GenerationInput {
    prompt: String,
    #[serde(default = "default_max_tokens")]
    max_tokens: u32,
    #[serde(default = "default_temperature")]
    temperature: f32,
    #[serde(default = "default_top_p")]
    top_p: f32,
    #[serde(default)]
    stop_sequences: Vec<String>,
    #[serde(default)]
    model: Option<String>,
}

pub struct TaskExecutor {
    provider: Arc<dyn InferenceProvider>,
    contexts: Arc<dyn ContextService>,
    default_model: String,
    state: ExecutorState,
}

impl TaskExecutor {
    pub fn new(
        provider: Arc<dyn InferenceProvider>,
        contexts: Arc<dyn ContextService>,
        default_model: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            contexts,
            default_model: default_model.into(),
            state: ExecutorState::Idle,
        }
    }

    pub fn state(&self) -> ExecutorState {
        self.state
    }

    fn transition(&mut self, next: ExecutorState) {
        if !self.state.can_transition_to(next) {
            warn!("Executor transition {} -> {} is not expected", self.state, next);
        }
        self.state = next;
    }

    /// Claim, run and report one task. Returns the terminal state reached;
    /// the executor is idle again afterwards.
    pub async fn execute(&mut self, task: &Task, coordinator: &mut Coordinator) -> ExecutorState {
        self.transition(ExecutorState::Running);
        info!(task_id = %task.id, task_type = %task.kind, "Executing task");
        if let Err(e) = coordinator.report_running(&task.id).await {
            warn!(task_id = %task.id, "Failed to report running status: {}", e);
        }

        let outcome = match self.dispatch(task).await {
            Ok(output) => serde_json::to_string(&output).map_err(Error::from),
            Err(e) => Err(e),
        };

        let terminal = match outcome {
            Ok(output) => {
                info!(task_id = %task.id, "Task completed");
                if let Err(e) = coordinator.report_completed(&task.id, output).await {
                    warn!(task_id = %task.id, "Failed to report completion: {}", e);
                }
                ExecutorState::Completed
            }
            Err(e) => {
                error!(task_id = %task.id, "Task failed: {}", e);
                if let Err(report_err) = coordinator.report_failed(&task.id, e.to_string()).await {
                    warn!(task_id = %task.id, "Failed to report failure: {}", report_err);
                }
                ExecutorState::Failed
            }
        };

        self.transition(terminal);
        self.transition(ExecutorState::Idle);
        terminal
    }

    /// Route a task to its handler and return the handler's output.
    pub async fn dispatch(&self, task: &Task) -> Result<Value> {
        match &task.kind {
            TaskKind::Generation => self.run_generation(task).await,
            TaskKind::CreateContext => {
                let mut request: CreateContextRequest = task.input.parse()?;
                if request.model_id.is_empty() {
                    if let Some(model) = task.model() {
                        request.model_id = model.to_string();
                    }
                }
                let created = self.contexts.create_context(request).await?;
                Ok(serde_json::to_value(created)?)
            }
            TaskKind::AddPrompt => {
                let input: AddPromptInput = task.input.parse()?;
                let response = self.contexts.add_prompt(&input.context_id, input.request).await?;
                Ok(serde_json::to_value(response)?)
            }
            TaskKind::AddNode => {
                let input: AddNodeInput = task.input.parse()?;
                let node = self.contexts.add_node(&input.context_id, input.node).await?;
                Ok(serde_json::to_value(AddNodeResponse {
                    context_id: input.context_id,
                    node,
                })?)
            }
            TaskKind::DeleteNode => {
                let input: DeleteNodeInput = task.input.parse()?;
                let deleted = self
                    .contexts
                    .delete_node(&input.context_id, &input.node_id)
                    .await?;
                Ok(serde_json::to_value(DeletedResponse {
                    context_id: input.context_id,
                    deleted,
                })?)
            }
            TaskKind::DeleteContext => {
                let input: DeleteContextInput = task.input.parse()?;
                let deleted = self.contexts.delete_context(&input.context_id).await?;
                Ok(serde_json::to_value(DeletedResponse {
                    context_id: input.context_id,
                    deleted,
                })?)
            }
            TaskKind::Unsupported(kind) => Err(Error::invalid_input(format!(
                "unsupported task type: {}",
                kind
            ))),
        }
    }

    async fn run_generation(&self, task: &Task) -> Result<Value> {
        let input: GenerationInput = task.input.parse()?;
        let model = input
            .model
            .as_deref()
            .or(task.model())
            .unwrap_or(&self.default_model)
            .to_string();
        let options = GenerationOptions {
            max_tokens: input.max_tokens,
            temperature: input.temperature,
            top_p: input.top_p,
            stop_sequences: input.stop_sequences,
        };
        let raw = self.provider.generate(&model, &input.prompt, &options).await?;
        let text = finalize_completion(&input.prompt, &raw, &options.stop_sequences);
        Ok(serde_json::json!({ "text": text }))
    }
}

//! Inference provider trait

use serde::{Deserialize, Serialize};

/// Result type for inference operations
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Inference error types
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("request failed: {0}")]
    RequestFailed(String),

    #[error("unknown model: {0}")]
    UnknownModel(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("timed out after {0}s")]
    Timeout(u64),

    #[error("network error: {0}")]
    NetworkError(#[from] reqwest::Error),
}

impl From<ProviderError> for taskweave_core::Error {
    fn from(e: ProviderError) -> Self {
        taskweave_core::Error::ProviderFailure(e.to_string())
    }
}

/// Sampling parameters for one generation call.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationOptions {
    pub max_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
    pub stop_sequences: Vec<String>,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            max_tokens: 512,
            temperature: 0.7,
            top_p: 0.9,
            stop_sequences: Vec::new(),
        }
    }
}

impl GenerationOptions {
    /// Overlay any `max_tokens`, `temperature`, `top_p` or `stop_sequences`
    /// present in `params` onto `self`. Unknown or mistyped keys are ignored.
    pub fn merged_with(mut self, params: &serde_json::Value) -> Self {
        if let Some(v) = params.get("max_tokens").and_then(|v| v.as_u64()) {
            self.max_tokens = v.min(u32::MAX as u64) as u32;
        }
        if let Some(v) = params.get("temperature").and_then(|v| v.as_f64()) {
            self.temperature = v as f32;
        }
        if let Some(v) = params.get("top_p").and_then(|v| v.as_f64()) {
            self.top_p = v as f32;
        }
        if let Some(list) = params.get("stop_sequences").and_then(|v| v.as_array()) {
            self.stop_sequences = list
                .iter()
                .filter_map(|s| s.as_str().map(String::from))
                .collect();
        }
        self
    }
}

/// Text generation backend.
///
/// Implementations return the raw model output; callers run it through
/// [`finalize_completion`](crate::finalize_completion) to strip the echoed
/// prompt and cut at stop sequences.
#[async_trait::async_trait]
pub trait InferenceProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn generate(
        &self,
        model: &str,
        prompt: &str,
        options: &GenerationOptions,
    ) -> ProviderResult<String>;
}

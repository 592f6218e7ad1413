//! HTTP inference provider: POSTs to a model server's `/generate` endpoint

use crate::provider::{GenerationOptions, InferenceProvider, ProviderError, ProviderResult};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, warn};

pub const DEFAULT_INFERENCE_URL: &str = "http://127.0.0.1:8000";

pub struct HttpInferenceProvider {
    client: Client,
    base_url: String,
    timeout_secs: Option<u64>,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    options: GenerateOptions<'a>,
}

#[derive(Serialize)]
struct GenerateOptions<'a> {
    max_tokens: u32,
    temperature: f32,
    top_p: f32,
    stop_tokens: &'a [String],
}

#[derive(Deserialize)]
struct GenerateResponse {
    text: String,
}

impl Default for HttpInferenceProvider {
    fn default() -> Self {
        Self::new(DEFAULT_INFERENCE_URL)
    }
}

impl HttpInferenceProvider {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout_secs: None,
        }
    }

    /// Apply a per-request timeout. If the client cannot be rebuilt the
    /// provider keeps its previous client and `timeout_secs` stays unchanged.
    pub fn with_timeout(mut self, secs: u64) -> Self {
        match Client::builder().timeout(Duration::from_secs(secs)).build() {
            Ok(client) => {
                self.client = client;
                self.timeout_secs = Some(secs);
            }
            Err(e) => warn!("Ignoring {}s inference timeout, client build failed: {}", secs, e),
        }
        self
    }

    pub fn timeout_secs(&self) -> Option<u64> {
        self.timeout_secs
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self) -> String {
        format!("{}/generate", self.base_url)
    }
}

#[async_trait::async_trait]
impl InferenceProvider for HttpInferenceProvider {
    fn name(&self) -> &str {
        "http"
    }

    async fn generate(
        &self,
        model: &str,
        prompt: &str,
        options: &GenerationOptions,
    ) -> ProviderResult<String> {
        let body = GenerateRequest {
            model,
            prompt,
            options: GenerateOptions {
                max_tokens: options.max_tokens,
                temperature: options.temperature,
                top_p: options.top_p,
                stop_tokens: &options.stop_sequences,
            },
        };

        debug!("Inference request: model={} prompt_chars={}", model, prompt.len());

        let response = match self.client.post(self.url()).json(&body).send().await {
            Ok(r) => r,
            Err(e) if e.is_timeout() => {
                return Err(ProviderError::Timeout(self.timeout_secs.unwrap_or_default()))
            }
            Err(e) => return Err(e.into()),
        };

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!("Inference error {}: {}", status, error_text);
            if status.as_u16() == 404 {
                return Err(ProviderError::UnknownModel(model.to_string()));
            }
            return Err(ProviderError::RequestFailed(format!("{}: {}", status, error_text)));
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;
        Ok(parsed.text)
    }
}

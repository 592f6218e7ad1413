//! Worker configuration
//!
//! Loaded from TOML at startup, falls back to defaults if no config file
//! exists. A few endpoints can be overridden from the environment.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Where a loaded `WorkerConfig` came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    File(PathBuf),
    Missing(PathBuf),
    Invalid { path: PathBuf, error: String },
}

impl ConfigSource {
    pub fn is_invalid(&self) -> bool {
        matches!(self, Self::Invalid { .. })
    }

    pub fn log(&self) {
        match self {
            Self::File(path) => tracing::info!("Loaded config from {}", path.display()),
            Self::Missing(path) => {
                tracing::info!("No config at {}, using defaults", path.display())
            }
            Self::Invalid { path, error } => {
                tracing::warn!("Failed to parse {}: {}, using defaults", path.display(), error)
            }
        }
    }
}

/// Top-level worker configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    pub registry: RegistryConfig,
    pub worker: WorkerSettings,
    pub provider: ProviderConfig,
    pub context: ContextConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Task registry base URL.
    pub base_url: String,
    /// Path polled for scheduled tasks.
    pub tasks_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerSettings {
    /// Name prefix; the hostname and a random suffix are appended.
    pub name_prefix: String,
    /// Capabilities declared at registration.
    pub capabilities: Vec<String>,
    pub heartbeat_interval_secs: u64,
    pub poll_interval_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Inference server base URL.
    pub base_url: String,
    /// Model used when a task doesn't name one.
    pub default_model: String,
    pub request_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContextMode {
    /// Keep contexts in this process.
    #[default]
    Local,
    /// Forward context tasks to a taskweave-gateway.
    Remote,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    pub mode: ContextMode,
    /// Gateway URL, used in remote mode.
    pub server_url: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter when RUST_LOG is unset.
    pub filter: String,
    pub format: LogFormat,
    /// If set, also write daily-rotated logs here.
    pub directory: Option<PathBuf>,
}

// ============================================================
// Defaults
// ============================================================

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8080".to_string(),
            tasks_path: "/api/v1/tasks".to_string(),
        }
    }
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            name_prefix: "worker".to_string(),
            capabilities: vec![
                "generation".to_string(),
                "create_context".to_string(),
                "add_prompt".to_string(),
                "add_node".to_string(),
                "delete_node".to_string(),
                "delete_context".to_string(),
            ],
            heartbeat_interval_secs: 10,
            poll_interval_secs: 1,
        }
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: taskweave_llm::http::DEFAULT_INFERENCE_URL.to_string(),
            default_model: "default".to_string(),
            request_timeout_secs: None,
        }
    }
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            mode: ContextMode::Local,
            server_url: "http://127.0.0.1:8001".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "taskweave=info".to_string(),
            format: LogFormat::Text,
            directory: None,
        }
    }
}

impl WorkerConfig {
    /// Load config from a TOML file. Returns defaults if the file doesn't
    /// exist or can't be parsed; the returned `ConfigSource` says which, so
    /// the caller can log it once logging is set up.
    pub fn load(path: &Path) -> (Self, ConfigSource) {
        let path_buf = path.to_path_buf();
        match std::fs::read_to_string(path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => (config, ConfigSource::File(path_buf)),
                Err(e) => (
                    Self::default(),
                    ConfigSource::Invalid {
                        path: path_buf,
                        error: e.to_string(),
                    },
                ),
            },
            Err(_) => (Self::default(), ConfigSource::Missing(path_buf)),
        }
    }

    /// Apply `TASKWEAVE_*_URL` overrides.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(url) = lookup("TASKWEAVE_REGISTRY_URL") {
            self.registry.base_url = url;
        }
        if let Some(url) = lookup("TASKWEAVE_PROVIDER_URL") {
            self.provider.base_url = url;
        }
        if let Some(url) = lookup("TASKWEAVE_CONTEXT_URL") {
            self.context.server_url = url;
            self.context.mode = ContextMode::Remote;
        }
        self
    }

    /// Write the current config as TOML (for generating a default config file).
    pub fn to_toml(&self) -> String {
        toml::to_string_pretty(self).unwrap_or_default()
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.worker.heartbeat_interval_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.worker.poll_interval_secs)
    }
}

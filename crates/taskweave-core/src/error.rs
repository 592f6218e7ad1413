//! Error types for Taskweave

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("provider failure: {0}")]
    ProviderFailure(String),

    #[error("registry unavailable: {0}")]
    RegistryUnavailable(String),

    #[error("context store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Wire-level tag for an [`Error`], used in HTTP error bodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    Conflict,
    InvalidInput,
    ProviderFailure,
    RegistryUnavailable,
    StoreUnavailable,
    Internal,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorKind::NotFound => "not_found",
            ErrorKind::Conflict => "conflict",
            ErrorKind::InvalidInput => "invalid_input",
            ErrorKind::ProviderFailure => "provider_failure",
            ErrorKind::RegistryUnavailable => "registry_unavailable",
            ErrorKind::StoreUnavailable => "store_unavailable",
            ErrorKind::Internal => "internal",
        };
        f.write_str(s)
    }
}

impl Error {
    pub fn context_not_found(id: impl Into<String>) -> Self {
        Self::NotFound {
            kind: "context",
            id: id.into(),
        }
    }

    pub fn node_not_found(id: impl Into<String>) -> Self {
        Self::NotFound {
            kind: "node",
            id: id.into(),
        }
    }

    pub fn context_busy(id: &str) -> Self {
        Self::Conflict(format!("context {} is being modified", id))
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::NotFound { .. } => ErrorKind::NotFound,
            Error::Conflict(_) => ErrorKind::Conflict,
            Error::InvalidInput(_) => ErrorKind::InvalidInput,
            Error::ProviderFailure(_) => ErrorKind::ProviderFailure,
            Error::RegistryUnavailable(_) => ErrorKind::RegistryUnavailable,
            Error::StoreUnavailable(_) => ErrorKind::StoreUnavailable,
            Error::Config(_) | Error::Io(_) => ErrorKind::Internal,
        }
    }

    /// Rebuild an error from a kind and message received over the wire.
    pub fn from_kind(kind: ErrorKind, message: impl Into<String>) -> Self {
        let message = message.into();
        match kind {
            ErrorKind::NotFound => Self::NotFound {
                kind: "resource",
                id: message,
            },
            ErrorKind::Conflict => Self::Conflict(message),
            ErrorKind::InvalidInput => Self::InvalidInput(message),
            ErrorKind::ProviderFailure => Self::ProviderFailure(message),
            ErrorKind::RegistryUnavailable => Self::RegistryUnavailable(message),
            ErrorKind::StoreUnavailable | ErrorKind::Internal => Self::StoreUnavailable(message),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::InvalidInput(e.to_string())
    }
}

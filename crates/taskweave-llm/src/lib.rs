//! Taskweave LLM - Inference provider seam, generation options, HTTP provider

pub mod completion;
pub mod http;
pub mod provider;

pub use completion::finalize_completion;
pub use http::HttpInferenceProvider;
pub use provider::{GenerationOptions, InferenceProvider, ProviderError, ProviderResult};

//! Taskweave Context - Per-context node trees, prompt assembly, local and remote access

pub mod prompt;
pub mod remote;
pub mod service;
pub mod store;

pub use prompt::build_prompt;
pub use remote::RemoteContextStore;
pub use service::ContextService;
pub use store::ContextStore;

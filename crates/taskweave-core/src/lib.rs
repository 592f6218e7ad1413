//! Taskweave Core - Types, task model, wire protocol, and error handling

pub mod error;
pub mod protocol;
pub mod task;
pub mod types;

pub use error::{Error, ErrorKind, Result};
pub use protocol::*;
pub use task::*;
pub use types::*;

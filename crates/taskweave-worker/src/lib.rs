//! Taskweave Worker - Registry client, task executor, and the worker loop

pub mod config;
pub mod coordinator;
pub mod executor;
pub mod logging;
pub mod metrics;
pub mod registry;
pub mod worker_loop;

pub use config::{ConfigSource, WorkerConfig};
pub use coordinator::{worker_name, Coordinator};
pub use executor::{ExecutorState, TaskExecutor};
pub use metrics::{FixedProbe, ResourceProbe, SystemProbe};
pub use registry::{HttpTaskRegistry, TaskRegistry};
pub use worker_loop::WorkerLoop;

//! Taskweave Gateway - HTTP surface for the context store

pub mod server;

pub use server::{router, start_gateway, ApiError, BindMode, GatewayConfig, GatewayState};

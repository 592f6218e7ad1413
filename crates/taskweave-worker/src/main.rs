//! Taskweave Worker: registers with the task registry and executes assigned
//! generation and context tasks.
//!
//! Usage:
//!   taskweave-worker --config worker.toml
//!   taskweave-worker --dump-config > worker.toml

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use taskweave_context::{ContextService, ContextStore, RemoteContextStore};
use taskweave_llm::{HttpInferenceProvider, InferenceProvider};
use taskweave_worker::config::ContextMode;
use taskweave_worker::{
    logging, worker_name, Coordinator, HttpTaskRegistry, SystemProbe, TaskExecutor, WorkerConfig,
    WorkerLoop,
};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "taskweave-worker", about = "Taskweave task worker")]
struct Cli {
    /// Path to config file (TOML)
    #[arg(short, long, default_value = "taskweave-worker.toml")]
    config: PathBuf,

    /// Override the registry URL
    #[arg(long)]
    registry_url: Option<String>,

    /// Dump default config as TOML and exit.
    #[arg(long)]
    dump_config: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.dump_config {
        print!("{}", WorkerConfig::default().to_toml());
        return Ok(());
    }

    let (config, source) = WorkerConfig::load(&cli.config);
    let mut config = config.with_env_overrides();
    if let Some(url) = cli.registry_url {
        config.registry.base_url = url;
    }
    let _log_guard = logging::init(&config.logging);
    source.log();

    let mut provider = HttpInferenceProvider::new(&config.provider.base_url);
    if let Some(secs) = config.provider.request_timeout_secs {
        provider = provider.with_timeout(secs);
    }
    let provider: Arc<dyn InferenceProvider> = Arc::new(provider);

    let contexts: Arc<dyn ContextService> = match config.context.mode {
        ContextMode::Local => Arc::new(
            ContextStore::new(provider.clone()).with_default_model(&config.provider.default_model),
        ),
        ContextMode::Remote => Arc::new(RemoteContextStore::new(&config.context.server_url)),
    };

    let registry = Arc::new(
        HttpTaskRegistry::new(&config.registry.base_url).with_tasks_path(&config.registry.tasks_path),
    );
    let probe = SystemProbe::default();
    probe.warn_if_unavailable();
    let mut coordinator = Coordinator::new(
        registry,
        Arc::new(probe),
        worker_name(&config.worker.name_prefix),
        config.worker.capabilities.clone(),
    );

    info!("Taskweave Worker v{} starting", env!("CARGO_PKG_VERSION"));
    info!("  Name:     {}", coordinator.name());
    info!("  Registry: {}", config.registry.base_url);
    info!("  Provider: {}", config.provider.base_url);
    info!("  Contexts: {:?}", config.context.mode);

    if let Err(e) = coordinator.register().await {
        error!("Registration failed: {}", e);
        std::process::exit(1);
    }

    let executor = TaskExecutor::new(provider, contexts, config.provider.default_model.clone());
    let mut worker = WorkerLoop::new(
        coordinator,
        executor,
        config.heartbeat_interval(),
        config.poll_interval(),
    );

    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown signal received");
            signal.cancel();
        }
    });

    worker.run(shutdown).await;
    Ok(())
}

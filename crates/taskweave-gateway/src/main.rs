//! Taskweave Gateway: serves the context store over HTTP

use clap::Parser;
use taskweave_gateway::{start_gateway, BindMode, GatewayConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "taskweave-gateway", about = "Taskweave context service")]
struct Cli {
    #[arg(short, long, default_value = "8001")]
    port: u16,
    /// loopback or lan
    #[arg(short, long, default_value = "loopback")]
    bind: String,
    /// Inference server base URL (or set TASKWEAVE_PROVIDER_URL)
    #[arg(long)]
    provider_url: Option<String>,
    /// Provider request timeout in seconds
    #[arg(long)]
    provider_timeout: Option<u64>,
    /// Model used when a context is created without one
    #[arg(short, long, default_value = "default")]
    model: String,
    /// Log output format: text or json
    #[arg(long, default_value = "text")]
    log_format: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "taskweave=info,tower_http=info".into());
    if cli.log_format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    let bind = match cli.bind.as_str() {
        "lan" | "0.0.0.0" => BindMode::Lan,
        _ => BindMode::Loopback,
    };
    let mut config = GatewayConfig {
        port: cli.port,
        bind,
        provider_timeout_secs: cli.provider_timeout,
        default_model: cli.model,
        ..Default::default()
    };
    if let Some(url) = cli
        .provider_url
        .or_else(|| std::env::var("TASKWEAVE_PROVIDER_URL").ok())
    {
        config.provider_url = url;
    }

    start_gateway(config).await
}

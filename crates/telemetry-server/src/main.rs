use anyhow::Result;
use clap::Parser;
use infrastructure::{BackendMode, Backends, ServiceConfig};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use telemetry_server::{api, setup_app_state};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Directory holding default.toml / {RUN_MODE}.toml
    #[arg(long, default_value = "config")]
    config_dir: String,

    /// API host (overrides configuration)
    #[arg(long)]
    host: Option<String>,

    /// API port (overrides configuration)
    #[arg(long)]
    port: Option<u16>,

    /// Backend mode: live or memory
    #[arg(long)]
    backend: Option<BackendMode>,
}

fn cli_overrides(args: &Args) -> Vec<(&'static str, String)> {
    let mut overrides = Vec::new();
    if let Some(host) = &args.host {
        overrides.push(("api.host", host.clone()));
    }
    if let Some(port) = args.port {
        overrides.push(("api.port", port.to_string()));
    }
    if let Some(mode) = args.backend {
        let mode = match mode {
            BackendMode::Live => "live",
            BackendMode::Memory => "memory",
        };
        overrides.push(("backend_mode", mode.to_string()));
    }
    overrides
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "info,telemetry_server=debug,application=debug,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    dotenv::dotenv().ok();
    let args = Args::parse();
    info!("🏠 Smart Home Telemetry Gateway Starting...");

    let config = ServiceConfig::load_with_overrides(&args.config_dir, &cli_overrides(&args))?;
    info!(mode = ?config.backend_mode, "✅ Configuration loaded");

    let backends = Backends::connect(&config).await?;
    info!("✅ Backends ready");

    let shutdown = CancellationToken::new();
    let state = setup_app_state(&config, backends, shutdown.clone());
    let app = api::create_router(state);

    let addr = format!("{}:{}", config.api.host, config.api.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("🚀 API Listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await?;

    info!("👋 Server stopped");
    Ok(())
}

/// Resolves on Ctrl-C and cancels in-flight gateway calls
async fn shutdown_signal(shutdown: CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("🛑 Shutdown requested");
    shutdown.cancel();
}

//! The sluice gateway binary.

use clap::Parser;
use sluice_server::config::ServerConfig;
use sluice_server::{app, build_state};
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "sluice", version, about = "Streaming gateway for heterogeneous file storage")]
struct Args {
    /// Path to the TOML configuration file
    #[arg(short, long, env = "SLUICE_CONFIG", default_value = "sluice.toml")]
    config: PathBuf,

    /// Override the configured bind address
    #[arg(long, env = "SLUICE_HOST")]
    host: Option<String>,

    /// Override the configured bind port
    #[arg(long, env = "SLUICE_PORT")]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let mut config = if args.config.exists() {
        ServerConfig::load(&args.config)?
    } else {
        warn!(path = %args.config.display(), "config file not found, using defaults");
        ServerConfig::default()
    };
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }

    let bind = format!("{}:{}", config.server.host, config.server.port);
    let state = build_state(config).await?;
    let router = app(state);

    let listener = tokio::net::TcpListener::bind(&bind).await?;
    info!(addr = %bind, "sluice listening");
    axum::serve(listener, router.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("shutdown signal received");
    }
}

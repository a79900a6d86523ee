use anyhow::{Context, Result};
use clap::Parser;
use std::net::SocketAddr;
use tracing::error;
use tumorclf_api::{AppState, Server, ServingState};
use tumorclf_core::{init_tracing, ConfigManager};
use tumorclf_tracking::{open_store, ModelUri};

#[derive(Parser)]
#[command(name = "tumorclf-api")]
#[command(about = "Serve predictions from a registered tumor classifier", long_about = None)]
#[command(version)]
struct Cli {
    /// Registered model version to serve
    #[arg(long)]
    model_version: Option<String>,

    /// Registered model name
    #[arg(long)]
    model_name: Option<String>,

    /// Tracking server URI (file:<dir> or http(s)://host:port)
    #[arg(long)]
    tracking_uri: Option<String>,

    /// Bind address
    #[arg(long)]
    host: Option<String>,

    /// Bind port
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let manager = ConfigManager::load().context("Failed to load configuration")?;
    let mut config = manager.config().clone();
    if let Some(version) = cli.model_version {
        config.serving.model_version = version;
    }
    if let Some(name) = cli.model_name {
        config.tracking.model_name = name;
    }
    if let Some(uri) = cli.tracking_uri {
        config.tracking.tracking_uri = uri;
    }
    if let Some(host) = cli.host {
        config.serving.host = host;
    }
    if let Some(port) = cli.port {
        config.serving.port = port;
    }

    init_tracing(&config.logging);

    let uri = ModelUri::new(&config.tracking.model_name, &config.serving.model_version);
    let serving = match open_store(&config.tracking.tracking_uri) {
        Ok(store) => ServingState::load(store.as_ref(), &uri).await,
        Err(e) => {
            error!("Error loading model/scaler for {}: {}", uri, e);
            ServingState::unready(e.to_string())
        }
    };

    let addr: SocketAddr = format!("{}:{}", config.serving.host, config.serving.port)
        .parse()
        .with_context(|| {
            format!(
                "Invalid bind address {}:{}",
                config.serving.host, config.serving.port
            )
        })?;

    Server::new(addr, AppState::new(serving))
        .run()
        .await
        .context("Server error")
}

use crate::{create_router, AppState};
use std::net::SocketAddr;
use tokio::signal;
use tracing::{error, info};

pub struct Server {
    state: AppState,
    addr: SocketAddr,
}

impl Server {
    pub fn new(addr: SocketAddr, state: AppState) -> Self {
        Self { state, addr }
    }

    pub async fn run(self) -> std::io::Result<()> {
        let router = create_router(self.state);
        let listener = tokio::net::TcpListener::bind(self.addr).await?;

        info!("Inference server listening on http://{}", listener.local_addr()?);
        info!("  GET  /health  - Readiness and served model version");
        info!("  POST /predict - Predict labels for {{\"features\": [[...], ...]}}");

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down gracefully");
        },
        _ = terminate => {
            info!("Received SIGTERM, shutting down gracefully");
        },
    }
}

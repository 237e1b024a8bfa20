//! Web server for the NLU service.

pub mod router;
pub mod types;

pub use router::create_router_with_state;
pub use types::{ServerState, MAX_REQUEST_BODY_SIZE};

use std::net::SocketAddr;

/// Run the web server with graceful shutdown.
pub async fn run(bind: SocketAddr, state: ServerState) -> anyhow::Result<()> {
    let app = create_router_with_state(state);

    let listener = tokio::net::TcpListener::bind(bind).await?;
    tracing::info!(addr = %bind, "NLU service listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(wait_for_stop_signal())
        .await?;

    tracing::info!("server shutdown complete");
    Ok(())
}

/// Resolve once the process is asked to stop (Ctrl+C, or SIGTERM on unix).
async fn wait_for_stop_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm =
            signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("received Ctrl+C, shutting down");
            }
            _ = sigterm.recv() => {
                tracing::info!("received SIGTERM, shutting down");
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("received Ctrl+C, shutting down");
    }
}

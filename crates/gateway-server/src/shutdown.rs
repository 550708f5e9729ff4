//! Shutdown signal handling.

use std::future::pending;
use tokio::signal;
use tracing::{error, info};

/// Resolve once the process is asked to stop.
///
/// Listens for Ctrl+C everywhere and SIGTERM on unix. A handler that cannot be
/// installed is logged and never fires, leaving the other one in place.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            pending::<()>().await;
        }
        "ctrl+c"
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                pending::<()>().await;
            }
        }
        "sigterm"
    };

    #[cfg(not(unix))]
    let terminate = pending::<&str>();

    let received = tokio::select! {
        name = ctrl_c => name,
        name = terminate => name,
    };

    info!(signal = received, "Shutdown signal received, draining connections");
}

//! HTTP server lifecycle.

use axum::Router;
use tokio::net::TcpListener;
use tracing::info;

use crate::{error::ServerError, routes::create_router, shutdown::shutdown_signal, state::AppState};

/// Gateway HTTP server
#[derive(Debug, Clone)]
pub struct Server {
    state: AppState,
}

impl Server {
    /// Create a server for `state`
    #[must_use]
    pub fn new(state: AppState) -> Self {
        Self { state }
    }

    /// Address the server binds to
    #[must_use]
    pub fn bind_address(&self) -> String {
        self.state.settings.bind_address()
    }

    /// Router serving the gateway API
    #[must_use]
    pub fn router(&self) -> Router {
        create_router(self.state.clone())
    }

    /// Bind and serve until a shutdown signal arrives
    pub async fn run(self) -> Result<(), ServerError> {
        let address = self.bind_address();
        let listener = TcpListener::bind(&address)
            .await
            .map_err(|source| ServerError::Bind {
                address: address.clone(),
                source,
            })?;

        self.serve(listener).await
    }

    /// Serve on an already bound listener until a shutdown signal arrives
    pub async fn serve(self, listener: TcpListener) -> Result<(), ServerError> {
        let local = listener.local_addr()?;
        info!(
            address = %local,
            providers = ?self.state.gateway.provider_names(),
            "Gateway listening"
        );

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        info!("Server stopped");
        Ok(())
    }
}

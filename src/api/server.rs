//! API Server
//!
//! Binds the REST router and serves it until shutdown is signalled.

use super::rest::{AppState, RestRouter};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::info;

// =============================================================================
// Server Configuration
// =============================================================================

/// Configuration for the API server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ApiServerConfig {
    /// REST API bind address
    pub listen_addr: SocketAddr,
    /// Whole-request timeout in seconds; covers several inventory commands
    pub request_timeout_secs: u64,
    /// Max request body size
    pub max_body_size: usize,
}

impl Default for ApiServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 3001)),
            request_timeout_secs: 180,
            max_body_size: 1024 * 1024, // 1MB
        }
    }
}

impl ApiServerConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

// =============================================================================
// API Server
// =============================================================================

pub struct ApiServer {
    config: ApiServerConfig,
    state: AppState,
    shutdown_tx: broadcast::Sender<()>,
}

impl ApiServer {
    pub fn new(config: ApiServerConfig, state: AppState) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            config,
            state,
            shutdown_tx,
        }
    }

    /// Bind the configured address and serve until shutdown
    pub async fn run(&self) -> Result<()> {
        let listener = TcpListener::bind(self.config.listen_addr)
            .await
            .map_err(|e| Error::Internal(format!("Failed to bind REST server: {}", e)))?;
        self.serve(listener).await
    }

    /// Serve on an already bound listener
    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        let app = RestRouter::new(self.state.clone())
            .with_limits(self.config.request_timeout(), self.config.max_body_size)
            .build();
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        info!("REST API listening on {}", listener.local_addr()?);

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
                info!("REST server shutting down");
            })
            .await
            .map_err(|e| Error::Internal(format!("REST server error: {}", e)))?;

        Ok(())
    }

    /// Sender that stops the server when signalled
    pub fn shutdown_handle(&self) -> broadcast::Sender<()> {
        self.shutdown_tx.clone()
    }

    /// Trigger graceful shutdown
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }
}

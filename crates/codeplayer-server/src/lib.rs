//! Code Player playground server.
//!
//! Provides HTTP and WebSocket endpoints for live-preview editing sessions.
//!
//! # Architecture
//!
//! The server consists of:
//! - **Session**: One per WebSocket connection; owns an execution controller and sandbox
//! - **Protocol**: Defines client/server message types
//! - **Routes**: HTTP and WebSocket handlers
//! - **Share**: Snippet storage behind share ids
//! - **Watcher**: File system monitoring for source directories

pub mod error;
pub mod protocol;
pub mod routes;
pub mod session;
pub mod share;
pub mod watcher;

use std::net::SocketAddr;
use std::sync::Arc;

use codeplayer_core::{ControllerConfig, SandboxConfig};

pub use error::{ServerError, ServerResult};
pub use protocol::{ClientMessage, ServerMessage};
pub use routes::{AppState, create_router};
pub use session::PlaygroundSession;
pub use share::{MemorySnippetStore, Snippet, SnippetStore};
pub use watcher::{FileEvent, FileWatcher};

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host address to bind to.
    pub host: String,
    /// Port to listen on.
    pub port: u16,
    /// Timings for every session's controller.
    pub controller: ControllerConfig,
    /// Limits for every session's sandbox.
    pub sandbox: SandboxConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            controller: ControllerConfig::default(),
            sandbox: SandboxConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn addr(&self) -> ServerResult<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|_| ServerError::Io {
                path: std::path::PathBuf::new(),
                message: format!("Invalid address: {}:{}", self.host, self.port),
            })
    }
}

/// Start the Code Player server.
pub async fn serve(config: ServerConfig) -> ServerResult<()> {
    let addr = config.addr()?;

    let state = Arc::new(AppState {
        store: Arc::new(MemorySnippetStore::new()),
        controller: config.controller,
        sandbox: config.sandbox,
    });

    let app = create_router(state);

    tracing::info!("Starting Code Player server at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    // Create shutdown signal channel
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

    // Handle Ctrl+C for graceful shutdown
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Received shutdown signal");
            let _ = shutdown_tx.send(());
        }
    });

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.await;
        })
        .await?;

    tracing::info!("Server shutdown complete");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 3000);
        assert_eq!(config.controller.max_render_attempts, 20);
    }

    #[test]
    fn test_invalid_addr() {
        let config = ServerConfig {
            host: "not a host".to_string(),
            ..ServerConfig::default()
        };
        assert!(matches!(config.addr(), Err(ServerError::Io { .. })));
    }
}

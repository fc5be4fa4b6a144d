//! Web server for dropload.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;

use crate::config::ServerConfig;
use crate::{DroploadError, Result};

use super::handlers::AppState;
use super::router::{create_health_router, create_router};

/// Upload server.
pub struct WebServer {
    /// Server address.
    addr: SocketAddr,
    /// Application state.
    app_state: Arc<AppState>,
    /// Request body limit in bytes.
    max_upload_size: usize,
}

impl WebServer {
    /// Create a new web server.
    pub fn new(config: &ServerConfig) -> Result<Self> {
        let addr = format!("{}:{}", config.host, config.port)
            .parse()
            .map_err(|e| {
                DroploadError::Config(format!(
                    "invalid server address {}:{}: {}",
                    config.host, config.port, e
                ))
            })?;

        let app_state = AppState::from_config(config)?;
        tracing::info!("Site storage initialized at: {}", config.data_dir);

        Ok(Self {
            addr,
            app_state: Arc::new(app_state),
            max_upload_size: (config.max_upload_size_mb as usize).saturating_mul(1024 * 1024),
        })
    }

    /// Get the server address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Shared state, for inspecting registered sites.
    pub fn state(&self) -> Arc<AppState> {
        self.app_state.clone()
    }

    fn router(&self) -> Router {
        create_router(self.app_state.clone(), self.max_upload_size).merge(create_health_router())
    }

    /// Run the web server.
    pub async fn run(self) -> std::result::Result<(), std::io::Error> {
        let router = self.router();

        let listener = TcpListener::bind(self.addr).await?;
        let local_addr = listener.local_addr()?;

        tracing::info!("Upload server listening on http://{}", local_addr);

        axum::serve(listener, router).await
    }

    /// Run the server and return the actual bound address.
    ///
    /// This is useful for testing when binding to port 0.
    pub async fn run_with_addr(self) -> std::result::Result<SocketAddr, std::io::Error> {
        let router = self.router();

        let listener = TcpListener::bind(self.addr).await?;
        let local_addr = listener.local_addr()?;

        tracing::info!("Upload server listening on http://{}", local_addr);

        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router).await {
                tracing::error!("Web server error: {}", e);
            }
        });

        Ok(local_addr)
    }
}

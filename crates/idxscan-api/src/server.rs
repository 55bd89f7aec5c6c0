//! API server

use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::{header, Method};
use axum::Router;
use idxscan_config::{log_api_info, ApiConfig};
use tokio::net::TcpListener;
use tokio::sync::Notify;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::field::display;

use crate::{create_router, ApiError, ApiState, Result};

pub struct ApiServer {
    config: ApiConfig,
    state: ApiState,
    shutdown: Arc<Notify>,
}

impl ApiServer {
    pub fn new(config: ApiConfig, state: ApiState) -> Self {
        Self {
            config,
            state,
            shutdown: Arc::new(Notify::new()),
        }
    }

    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    pub fn state(&self) -> &ApiState {
        &self.state
    }

    pub fn socket_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.config.host, self.config.port)
            .parse()
            .map_err(|e| ApiError::Config(format!("Invalid address: {}", e)))
    }

    /// Build the router with all middleware
    fn build_router(&self) -> Router {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([Method::GET, Method::OPTIONS])
            .allow_headers([header::CONTENT_TYPE]);

        create_router(self.state.clone())
            .layer(cors)
            .layer(TraceLayer::new_for_http())
    }

    /// Bind the listening socket without serving yet.
    pub async fn bind(&self) -> Result<TcpListener> {
        let addr = self.socket_addr()?;
        TcpListener::bind(addr).await.map_err(|e| ApiError::Bind {
            address: addr.to_string(),
            source: e,
        })
    }

    /// Serve on `listener` until [`ApiServer::shutdown`] is called.
    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        let router = self.build_router();
        if let Ok(addr) = listener.local_addr() {
            log_api_info!("API server listening", address = display(addr));
        }

        let shutdown = self.shutdown.clone();
        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                shutdown.notified().await;
            })
            .await
            .map_err(|e| ApiError::Server(e.to_string()))
    }

    /// Bind and serve
    pub async fn start(&self) -> Result<()> {
        let listener = self.bind().await?;
        self.serve(listener).await
    }

    /// Stop serving. Safe to call before `serve` starts waiting.
    pub fn shutdown(&self) {
        log_api_info!("Shutting down API server");
        self.shutdown.notify_one();
    }
}

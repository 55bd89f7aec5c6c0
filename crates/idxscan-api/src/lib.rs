//! Read-only HTTP API over a scan session.
//!
//! Every handler takes the session read lock, so the API can be queried
//! while a scan is still running.

pub mod routes;
pub mod server;

pub use routes::{create_router, ApiErrorResponse, ApiState, ErrorResponse};
pub use server::ApiServer;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Server error: {0}")]
    Server(String),

    #[error("Failed to bind to {address}: {source}")]
    Bind {
        address: String,
        source: std::io::Error,
    },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("File not found: {0}")]
    FileNotFound(String),
}

pub type Result<T> = std::result::Result<T, ApiError>;

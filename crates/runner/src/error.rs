//! Runner error types.

use auth::AuthError;
use binance_rest::BinanceRestError;
use delay_check::DelayCheckError;
use thiserror::Error;

/// Errors that stop the process with a non-zero exit code.
#[derive(Debug, Error)]
pub enum RunnerError {
    /// Credentials or the signing key are unusable.
    #[error("credentials: {0}")]
    Auth(#[from] AuthError),

    #[error("REST client: {0}")]
    Rest(#[from] BinanceRestError),

    #[error(transparent)]
    App(#[from] DelayCheckError),

    /// The application task panicked or was cancelled.
    #[error("application task failed: {0}")]
    Task(String),
}

/// Disk cache failures. The cache falls back to a live fetch on any of these.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache I/O: {0}")]
    Io(#[from] std::io::Error),

    #[error("cache format: {0}")]
    Format(#[from] serde_json::Error),
}

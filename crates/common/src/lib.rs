//! Shared building blocks used across the workspace.

mod backoff;
mod environment;
mod logging;
mod time;

pub use backoff::ExponentialBackoff;
pub use environment::{BinanceEnvironment, ParseEnvironmentError};
pub use logging::{init_logging, LogFormat};
pub use time::now_ms;

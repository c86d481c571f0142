//! Generic REST client infrastructure.
//!
//! This crate provides a thin wrapper around `reqwest` with:
//!
//! - One request entry point for every HTTP method
//! - Consistent error handling via `RestError`, separating transport
//!   failures from non-2xx responses
//! - Header injection for authentication
//! - Rate limit detection
//!
//! Response bodies are returned as text; decoding is left to the caller so
//! that structured error bodies can be inspected too.
//!
//! # Example
//!
//! ```rust,ignore
//! use rest_client::{Method, RestClient};
//!
//! let client = RestClient::with_default_timeout("https://testnet.binance.vision")?;
//! let body = client.request(Method::GET, "/api/v3/time", None, &[]).await?;
//! ```

mod client;
mod error;

pub use client::RestClient;
pub use error::RestError;
pub use reqwest::Method;

//! Authentication and signing for the Binance API.
//!
//! This crate provides credential management, canonical query serialization
//! and request signing for authenticated API calls.
//!
//! # Features
//!
//! - **Canonical queries**: `QueryParams` serializes in insertion order, which is
//!   the exact byte sequence that gets signed.
//! - **Asymmetric keys**: Ed25519 and RSA PEM keys, loaded once from disk.
//! - **HMAC fallback**: HMAC-SHA256 when only a shared secret is configured.
//! - **Environment loading**: credentials can come from environment variables
//!   or a `.env` file.
//!
//! # Example
//!
//! ```rust,ignore
//! use auth::{ApiCredentials, QueryParams, RequestSigner};
//!
//! let credentials = ApiCredentials::from_env()?;
//! let signer = RequestSigner::new(&credentials);
//!
//! let params = QueryParams::new().with("symbol", "BTCUSDT").with("side", "BUY");
//! let signed_query = signer.signed_query(params, timestamp_ms)?;
//! ```

mod credentials;
mod error;
mod query;
mod signer;

pub use credentials::ApiCredentials;
pub use error::AuthError;
pub use query::QueryParams;
pub use signer::{
    load_private_key_file, load_private_key_pem, Ed25519Signer, HmacSigner, PayloadSigner,
    RequestSigner, RsaSigner,
};

//! Binance REST API client.
//!
//! This crate provides the signed request layer and typed endpoints:
//!
//! - **Signed calls**: `call(endpoint, method, params, security)` builds the
//!   canonical query string, adds `timestamp` and `signature` when required and
//!   attaches the API key header
//! - **Listen key management**: create, refresh and close user data stream keys
//! - **Orders**: place orders, list and cancel open orders
//! - **Metadata**: exchange info, symbol price, account balances
//! - **Error handling**: structured exchange errors kept apart from transport failures
//!
//! # Example
//!
//! ```rust,ignore
//! use auth::ApiCredentials;
//! use binance_rest::BinanceRestClient;
//! use common::BinanceEnvironment;
//!
//! let credentials = ApiCredentials::from_env()?;
//! let client = BinanceRestClient::with_environment(credentials, BinanceEnvironment::Testnet)?;
//!
//! let listen_key = client.create_listen_key().await?;
//! let price = client.symbol_price("BNBUSDT").await?;
//! ```

mod client;
mod error;
mod responses;

pub use client::{order_params, BinanceRestClient, Security, REQUEST_TIMEOUT};
pub use error::BinanceRestError;
pub use responses::{
    AccountInfo, Balance, CanceledOrder, ListenKeyResponse, NewOrderResponse, OpenOrder,
    OrderFill, SymbolPrice,
};
pub use rest_client::Method;

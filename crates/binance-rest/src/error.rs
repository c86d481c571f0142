//! Binance REST API error types.

use auth::AuthError;
use rest_client::RestError;
use thiserror::Error;

/// Listen key does not exist (`-1125`).
const LISTEN_KEY_NOT_FOUND: i32 = -1125;

/// Errors that can occur when interacting with the Binance REST API.
#[derive(Debug, Error)]
pub enum BinanceRestError {
    /// Transport failure or rate limit from the REST client.
    #[error("REST client error: {0}")]
    Rest(#[from] RestError),

    /// Signing failed.
    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    /// Structured error returned by the exchange: `{"code": -1013, "msg": "..."}`.
    #[error("Binance API error {code} (HTTP {status}): {message}")]
    Exchange {
        status: u16,
        code: i32,
        message: String,
    },

    /// Non-2xx response whose body is not a structured error.
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// The caller passed an empty endpoint.
    #[error("Missing endpoint")]
    MissingEndpoint,

    /// A 2xx body did not match the expected shape.
    #[error("Parse error: {0}")]
    Parse(String),
}

impl BinanceRestError {
    /// Build the error for a non-2xx response body.
    ///
    /// Binance returns errors in the format: `{"code": -1000, "msg": "..."}`
    pub fn from_api_response(status: u16, body: &str) -> Self {
        #[derive(serde::Deserialize)]
        struct ApiError {
            code: i32,
            msg: String,
        }

        match serde_json::from_str::<ApiError>(body) {
            Ok(err) => Self::Exchange {
                status,
                code: err.code,
                message: err.msg,
            },
            Err(_) => Self::Http {
                status,
                body: body.to_string(),
            },
        }
    }

    /// Exchange error code, if the exchange returned one.
    pub fn code(&self) -> Option<i32> {
        match self {
            Self::Exchange { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// The request never produced an HTTP response (DNS, timeout, reset).
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Rest(e) if e.is_transport())
    }

    /// The listen key is unknown to the exchange (expired or closed).
    pub fn is_listen_key_invalid(&self) -> bool {
        self.code() == Some(LISTEN_KEY_NOT_FOUND)
    }

    /// Check if this error indicates the operation should be retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Rest(rest_err) => rest_err.is_retryable(),
            Self::Exchange { code, .. } => {
                // Binance server errors are often retryable
                matches!(code, -1000 | -1001 | -1003 | -1015 | -1016)
            }
            _ => false,
        }
    }
}

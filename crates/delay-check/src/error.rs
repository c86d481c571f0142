//! Delay-check error types.

use binance_rest::BinanceRestError;
use order_filters::TransformError;
use std::time::Duration;
use thiserror::Error;

/// Errors that end a command or a run. None of them stop the application.
#[derive(Debug, Error)]
pub enum DelayCheckError {
    /// A second delay check arrived while one is running.
    #[error("a delay check on {symbol} is already running")]
    RunInProgress { symbol: String },

    /// The stream did not open within the allowed wait.
    #[error("user data stream not ready after {0:?}")]
    StreamNotReady(Duration),

    /// The order intent cannot become a valid order.
    #[error("invalid order: {0}")]
    Transform(#[from] TransformError),

    /// REST API error.
    #[error("REST API error: {0}")]
    RestApi(#[from] BinanceRestError),

    /// Symbol filters could not be loaded.
    #[error("exchange metadata unavailable: {0}")]
    Metadata(String),

    /// The user data stream could not be kept open.
    #[error("user data stream unavailable: {0}")]
    SessionUnavailable(String),

    /// A command line or payload could not be understood.
    #[error("invalid command: {0}")]
    InvalidCommand(String),

    /// Event channel closed unexpectedly.
    #[error("channel closed")]
    ChannelClosed,
}

impl DelayCheckError {
    /// The exchange answered with a non-2xx response.
    pub fn is_exchange_rejection(&self) -> bool {
        matches!(
            self,
            Self::RestApi(BinanceRestError::Exchange { .. } | BinanceRestError::Http { .. })
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_messages_are_readable() {
        let err = DelayCheckError::RunInProgress {
            symbol: "BNBUSDT".into(),
        };
        assert_eq!(err.to_string(), "a delay check on BNBUSDT is already running");

        let err: DelayCheckError = TransformError::PriceOutOfBounds {
            price: dec!(400),
            min: dec!(270),
            max: dec!(330),
            filter: "PERCENT_PRICE",
        }
        .into();
        assert!(err.to_string().starts_with("invalid order: Price 400"));
    }

    #[test]
    fn test_exchange_rejection() {
        let err: DelayCheckError = BinanceRestError::from_api_response(
            400,
            r#"{"code":-2010,"msg":"insufficient balance"}"#,
        )
        .into();
        assert!(err.is_exchange_rejection());
        assert!(!DelayCheckError::ChannelClosed.is_exchange_rejection());
    }
}

//! Binance environment configuration.
//!
//! The monitor places real orders, so it targets the testnet unless told otherwise.

use std::fmt;
use std::str::FromStr;

/// Binance environment (testnet or production).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BinanceEnvironment {
    /// Testnet environment (fake money for testing).
    #[default]
    Testnet,
    /// Production environment (real money).
    Production,
}

impl BinanceEnvironment {
    /// REST API base URL.
    pub fn rest_base_url(&self) -> &'static str {
        match self {
            Self::Testnet => "https://testnet.binance.vision",
            Self::Production => "https://api.binance.com",
        }
    }

    /// WebSocket base URL for the combined user data stream.
    pub fn ws_base_url(&self) -> &'static str {
        match self {
            Self::Testnet => "wss://testnet.binance.vision",
            Self::Production => "wss://stream.binance.com:9443",
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

impl fmt::Display for BinanceEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Testnet => write!(f, "testnet"),
            Self::Production => write!(f, "production"),
        }
    }
}

impl FromStr for BinanceEnvironment {
    type Err = ParseEnvironmentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "testnet" | "test" | "sandbox" => Ok(Self::Testnet),
            "production" | "prod" | "mainnet" | "main" => Ok(Self::Production),
            _ => Err(ParseEnvironmentError(s.to_string())),
        }
    }
}

/// Error parsing environment string.
#[derive(Debug, Clone)]
pub struct ParseEnvironmentError(String);

impl fmt::Display for ParseEnvironmentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid environment '{}', expected 'testnet' or 'production'",
            self.0
        )
    }
}

impl std::error::Error for ParseEnvironmentError {}

//! Normalized messages from the private user data stream.

use crate::execution::ExecutionReport;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Parsed user data message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum UserDataMessage {
    /// Order execution report
    ExecutionReport(ExecutionReport),
    /// Account balance update
    AccountUpdate(AccountUpdate),
    /// The session token behind the stream expired
    ListenKeyExpired { event_time_ms: i64 },
    /// Message type this client does not handle
    Unknown(String),
}

impl UserDataMessage {
    pub fn as_execution_report(&self) -> Option<&ExecutionReport> {
        match self {
            Self::ExecutionReport(report) => Some(report),
            _ => None,
        }
    }
}

/// Account balance update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountUpdate {
    /// Event timestamp
    pub event_time_ms: i64,
    /// Updated balances
    pub balances: Vec<BalanceUpdate>,
}

/// Single balance update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceUpdate {
    /// Asset symbol (e.g., "BTC", "USDT")
    pub asset: String,
    /// Free (available) balance
    pub free: Decimal,
    /// Locked balance (in open orders)
    pub locked: Decimal,
}

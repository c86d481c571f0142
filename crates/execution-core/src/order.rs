//! Order and execution enums.
//!
//! Serde uses the exchange spelling (`BUY`, `LIMIT`, `PARTIALLY_FILLED`, ...),
//! so these types decode straight from REST bodies and stream frames.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Order side (buy or sell).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    /// Convert from Binance string representation.
    pub fn from_binance_str(s: &str) -> Option<Self> {
        match s {
            "BUY" => Some(Self::Buy),
            "SELL" => Some(Self::Sell),
            _ => None,
        }
    }

    /// Convert to Binance string representation.
    pub fn as_binance_str(&self) -> &'static str {
        match self {
            Self::Buy => "BUY",
            Self::Sell => "SELL",
        }
    }

    /// The side that flattens a position opened on this side.
    pub fn opposite(&self) -> Self {
        match self {
            Self::Buy => Self::Sell,
            Self::Sell => Self::Buy,
        }
    }
}

/// Order type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderType {
    Market,
    Limit,
    StopLoss,
    StopLossLimit,
    TakeProfit,
    TakeProfitLimit,
    LimitMaker,
}

impl OrderType {
    /// Convert from Binance string representation.
    pub fn from_binance_str(s: &str) -> Option<Self> {
        match s {
            "MARKET" => Some(Self::Market),
            "LIMIT" => Some(Self::Limit),
            "STOP_LOSS" => Some(Self::StopLoss),
            "STOP_LOSS_LIMIT" => Some(Self::StopLossLimit),
            "TAKE_PROFIT" => Some(Self::TakeProfit),
            "TAKE_PROFIT_LIMIT" => Some(Self::TakeProfitLimit),
            "LIMIT_MAKER" => Some(Self::LimitMaker),
            _ => None,
        }
    }

    /// Convert to Binance string representation.
    pub fn as_binance_str(&self) -> &'static str {
        match self {
            Self::Market => "MARKET",
            Self::Limit => "LIMIT",
            Self::StopLoss => "STOP_LOSS",
            Self::StopLossLimit => "STOP_LOSS_LIMIT",
            Self::TakeProfit => "TAKE_PROFIT",
            Self::TakeProfitLimit => "TAKE_PROFIT_LIMIT",
            Self::LimitMaker => "LIMIT_MAKER",
        }
    }
}

/// Order status (`X` in execution reports).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// Accepted by the engine but not yet processed.
    PendingNew,
    /// Order acknowledged by exchange.
    New,
    /// Order partially filled.
    PartiallyFilled,
    /// Order completely filled.
    Filled,
    /// Order canceled by user.
    Canceled,
    /// Order pending cancellation.
    PendingCancel,
    /// Order rejected by exchange.
    Rejected,
    /// Order expired (time in force or self-trade prevention).
    Expired,
    /// Order expired in match because of self-trade prevention.
    ExpiredInMatch,
}

impl OrderStatus {
    /// Convert from Binance string representation.
    pub fn from_binance_str(s: &str) -> Option<Self> {
        match s {
            "PENDING_NEW" => Some(Self::PendingNew),
            "NEW" => Some(Self::New),
            "PARTIALLY_FILLED" => Some(Self::PartiallyFilled),
            "FILLED" => Some(Self::Filled),
            "CANCELED" => Some(Self::Canceled),
            "PENDING_CANCEL" => Some(Self::PendingCancel),
            "REJECTED" => Some(Self::Rejected),
            "EXPIRED" => Some(Self::Expired),
            "EXPIRED_IN_MATCH" => Some(Self::ExpiredInMatch),
            _ => None,
        }
    }

    /// Convert to Binance string representation.
    pub fn as_binance_str(&self) -> &'static str {
        match self {
            Self::PendingNew => "PENDING_NEW",
            Self::New => "NEW",
            Self::PartiallyFilled => "PARTIALLY_FILLED",
            Self::Filled => "FILLED",
            Self::Canceled => "CANCELED",
            Self::PendingCancel => "PENDING_CANCEL",
            Self::Rejected => "REJECTED",
            Self::Expired => "EXPIRED",
            Self::ExpiredInMatch => "EXPIRED_IN_MATCH",
        }
    }

    /// Check if this is a terminal status (order is done).
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Filled | Self::Canceled | Self::Rejected | Self::Expired | Self::ExpiredInMatch
        )
    }

    /// Check if the order is still active/open.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            Self::PendingNew | Self::New | Self::PartiallyFilled | Self::PendingCancel
        )
    }
}

/// Execution type (`x` in execution reports): what happened to the order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionType {
    /// The order has been accepted into the engine.
    New,
    /// The order has been canceled by the user.
    Canceled,
    /// Currently unused by the exchange.
    Replaced,
    /// The order has been rejected.
    Rejected,
    /// Part of the order or all of the order's quantity has filled.
    Trade,
    /// The order was canceled according to its time in force rules.
    Expired,
    /// The order expired due to self-trade prevention.
    TradePrevention,
}

impl ExecutionType {
    /// Convert from Binance string representation.
    pub fn from_binance_str(s: &str) -> Option<Self> {
        match s {
            "NEW" => Some(Self::New),
            "CANCELED" => Some(Self::Canceled),
            "REPLACED" => Some(Self::Replaced),
            "REJECTED" => Some(Self::Rejected),
            "TRADE" => Some(Self::Trade),
            "EXPIRED" => Some(Self::Expired),
            "TRADE_PREVENTION" => Some(Self::TradePrevention),
            _ => None,
        }
    }

    /// Convert to Binance string representation.
    pub fn as_binance_str(&self) -> &'static str {
        match self {
            Self::New => "NEW",
            Self::Canceled => "CANCELED",
            Self::Replaced => "REPLACED",
            Self::Rejected => "REJECTED",
            Self::Trade => "TRADE",
            Self::Expired => "EXPIRED",
            Self::TradePrevention => "TRADE_PREVENTION",
        }
    }

    /// The order left the book without (further) fills.
    pub fn ends_without_fill(&self) -> bool {
        matches!(
            self,
            Self::Canceled | Self::Rejected | Self::Expired | Self::TradePrevention
        )
    }
}

/// Time in force for limit orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimeInForce {
    /// Good Till Canceled - remains active until filled or canceled.
    GTC,
    /// Immediate Or Cancel - fill what's possible immediately, cancel rest.
    IOC,
    /// Fill Or Kill - must be filled completely immediately or canceled.
    FOK,
}

impl TimeInForce {
    /// Convert from Binance string representation.
    pub fn from_binance_str(s: &str) -> Option<Self> {
        match s {
            "GTC" => Some(Self::GTC),
            "IOC" => Some(Self::IOC),
            "FOK" => Some(Self::FOK),
            _ => None,
        }
    }

    /// Convert to Binance string representation.
    pub fn as_binance_str(&self) -> &'static str {
        match self {
            Self::GTC => "GTC",
            Self::IOC => "IOC",
            Self::FOK => "FOK",
        }
    }
}

macro_rules! display_as_binance_str {
    ($($ty:ty),*) => {
        $(impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_binance_str())
            }
        })*
    };
}

display_as_binance_str!(OrderSide, OrderType, OrderStatus, ExecutionType, TimeInForce);

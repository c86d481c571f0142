//! Order intents (what the user asked for) and order requests (what gets sent).

use crate::order::{OrderSide, OrderType, TimeInForce};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Default `recvWindow` in milliseconds.
pub const DEFAULT_RECV_WINDOW_MS: u64 = 5000;

/// User-specified order, before exchange filters are applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderIntent {
    pub symbol: String,
    pub side: OrderSide,
    pub order_type: OrderType,
    pub quantity: Decimal,
    /// Absolute limit price, used when no modifier is given.
    #[serde(default)]
    pub price: Option<Decimal>,
    /// Limit price as a multiple of the current price (e.g. `0.99`).
    #[serde(default)]
    pub price_modifier: Option<Decimal>,
    #[serde(default = "default_recv_window")]
    pub recv_window: u64,
}

fn default_recv_window() -> u64 {
    DEFAULT_RECV_WINDOW_MS
}

impl OrderIntent {
    pub fn limit_with_modifier(
        symbol: impl Into<String>,
        side: OrderSide,
        quantity: Decimal,
        price_modifier: Decimal,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            side,
            order_type: OrderType::Limit,
            quantity,
            price: None,
            price_modifier: Some(price_modifier),
            recv_window: DEFAULT_RECV_WINDOW_MS,
        }
    }

    pub fn market(symbol: impl Into<String>, side: OrderSide, quantity: Decimal) -> Self {
        Self {
            symbol: symbol.into(),
            side,
            order_type: OrderType::Market,
            quantity,
            price: None,
            price_modifier: None,
            recv_window: DEFAULT_RECV_WINDOW_MS,
        }
    }

    /// Market order that flattens `quantity` filled on this intent.
    ///
    /// Same symbol, opposite side, no price, modifier or time in force.
    pub fn offsetting(&self, quantity: Decimal) -> OrderRequest {
        OrderRequest {
            symbol: self.symbol.clone(),
            side: self.side.opposite(),
            order_type: OrderType::Market,
            quantity,
            price: None,
            time_in_force: None,
            recv_window: self.recv_window,
            new_client_order_id: None,
        }
    }
}

/// Exchange-ready order parameters.
///
/// `timestamp` and `signature` are added at submission time, so one request
/// value can be signed only once per submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub symbol: String,
    pub side: OrderSide,
    pub order_type: OrderType,
    pub quantity: Decimal,
    pub price: Option<Decimal>,
    pub time_in_force: Option<TimeInForce>,
    pub recv_window: u64,
    pub new_client_order_id: Option<String>,
}

impl OrderRequest {
    pub fn with_client_order_id(mut self, client_order_id: impl Into<String>) -> Self {
        self.new_client_order_id = Some(client_order_id.into());
        self
    }
}

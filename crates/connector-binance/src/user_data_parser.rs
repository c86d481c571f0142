//! User data stream message parser.
//!
//! Parses messages from the Binance user data WebSocket stream:
//! - executionReport - Order status updates
//! - outboundAccountPosition - Account balance updates
//! - listenKeyExpired - The stream's listen key is no longer valid
//!
//! Frames arrive either raw or wrapped by the combined-stream endpoint as
//! `{"stream": "<listenKey>", "data": {...}}`.

use execution_core::{
    AccountUpdate, BalanceUpdate, ExecutionReport, ExecutionType, OrderSide, OrderStatus,
    OrderType, TimeInForce, UserDataMessage,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;

/// Raw execution report from Binance WebSocket.
#[derive(Debug, Deserialize)]
pub struct BinanceExecutionReportRaw {
    /// Event time
    #[serde(rename = "E")]
    pub event_time: i64,
    /// Symbol
    #[serde(rename = "s")]
    pub symbol: String,
    /// Client order ID; on a cancel this is the cancel request's ID
    #[serde(rename = "c")]
    pub client_order_id: String,
    /// Client order ID of the order being canceled, empty otherwise
    #[serde(rename = "C", default)]
    pub original_client_order_id: Option<String>,
    /// Side (BUY/SELL)
    #[serde(rename = "S")]
    pub side: OrderSide,
    /// Order type
    #[serde(rename = "o")]
    pub order_type: OrderType,
    /// Time in force
    #[serde(rename = "f")]
    pub time_in_force: String,
    /// Order quantity
    #[serde(rename = "q")]
    pub quantity: Decimal,
    /// Order price
    #[serde(rename = "p")]
    pub price: Decimal,
    /// Current execution type
    #[serde(rename = "x")]
    pub execution_type: ExecutionType,
    /// Current order status
    #[serde(rename = "X")]
    pub order_status: OrderStatus,
    /// Reject reason
    #[serde(rename = "r", default)]
    pub reject_reason: String,
    /// Order ID
    #[serde(rename = "i")]
    pub order_id: u64,
    /// Last executed quantity
    #[serde(rename = "l")]
    pub last_executed_qty: Decimal,
    /// Cumulative filled quantity
    #[serde(rename = "z")]
    pub cumulative_filled_qty: Decimal,
    /// Last executed price
    #[serde(rename = "L")]
    pub last_executed_price: Decimal,
    /// Commission amount
    #[serde(rename = "n")]
    pub commission: Decimal,
    /// Commission asset
    #[serde(rename = "N")]
    pub commission_asset: Option<String>,
    /// Transaction time
    #[serde(rename = "T")]
    pub transaction_time: i64,
    /// Trade ID (-1 if no trade)
    #[serde(rename = "t")]
    pub trade_id: i64,
    /// Is this the maker side?
    #[serde(rename = "m")]
    pub is_maker: bool,
}

/// Raw account update from Binance WebSocket.
#[derive(Debug, Deserialize)]
pub struct BinanceAccountUpdateRaw {
    /// Event time
    #[serde(rename = "E")]
    pub event_time: i64,
    /// Balances
    #[serde(rename = "B")]
    pub balances: Vec<BinanceBalanceRaw>,
}

/// Raw balance from Binance WebSocket.
#[derive(Debug, Deserialize)]
pub struct BinanceBalanceRaw {
    /// Asset
    #[serde(rename = "a")]
    pub asset: String,
    /// Free balance
    #[serde(rename = "f")]
    pub free: Decimal,
    /// Locked balance
    #[serde(rename = "l")]
    pub locked: Decimal,
}

/// Parse one text frame from the stream, combined or raw.
pub fn parse_stream_frame(text: &str) -> Result<UserDataMessage, serde_json::Error> {
    let value: Value = serde_json::from_str(text)?;

    let payload = match value {
        Value::Object(mut map) if map.get("data").is_some_and(Value::is_object) => {
            map.remove("data").unwrap_or_default()
        }
        other => other,
    };
    parse_user_data_value(payload)
}

/// Parse an unwrapped user data event.
pub fn parse_user_data_message(text: &str) -> Result<UserDataMessage, serde_json::Error> {
    parse_user_data_value(serde_json::from_str(text)?)
}

fn parse_user_data_value(value: Value) -> Result<UserDataMessage, serde_json::Error> {
    let event_type = value
        .get("e")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string();

    match event_type.as_str() {
        "executionReport" => {
            let raw: BinanceExecutionReportRaw = serde_json::from_value(value)?;
            Ok(UserDataMessage::ExecutionReport(raw.into()))
        }
        "outboundAccountPosition" => {
            let raw: BinanceAccountUpdateRaw = serde_json::from_value(value)?;
            Ok(UserDataMessage::AccountUpdate(raw.into()))
        }
        "listenKeyExpired" => Ok(UserDataMessage::ListenKeyExpired {
            event_time_ms: value.get("E").and_then(|v| v.as_i64()).unwrap_or_default(),
        }),
        _ => Ok(UserDataMessage::Unknown(event_type)),
    }
}

impl From<BinanceExecutionReportRaw> for ExecutionReport {
    fn from(raw: BinanceExecutionReportRaw) -> Self {
        // A cancel report is attributed to the order it cancels.
        let client_order_id = match raw.original_client_order_id {
            Some(original) if !original.is_empty() => original,
            _ => raw.client_order_id,
        };
        ExecutionReport {
            event_time_ms: raw.event_time,
            symbol: raw.symbol,
            client_order_id,
            side: raw.side,
            order_type: raw.order_type,
            time_in_force: parse_time_in_force(&raw.time_in_force),
            quantity: raw.quantity,
            price: raw.price,
            execution_type: raw.execution_type,
            order_status: raw.order_status,
            reject_reason: raw.reject_reason,
            order_id: raw.order_id,
            last_executed_qty: raw.last_executed_qty,
            cumulative_filled_qty: raw.cumulative_filled_qty,
            last_executed_price: raw.last_executed_price,
            commission: raw.commission,
            commission_asset: raw.commission_asset.unwrap_or_default(),
            transaction_time_ms: raw.transaction_time,
            trade_id: raw.trade_id,
            is_maker: raw.is_maker,
        }
    }
}

impl From<BinanceAccountUpdateRaw> for AccountUpdate {
    fn from(raw: BinanceAccountUpdateRaw) -> Self {
        AccountUpdate {
            event_time_ms: raw.event_time,
            balances: raw.balances.into_iter().map(|b| b.into()).collect(),
        }
    }
}

impl From<BinanceBalanceRaw> for BalanceUpdate {
    fn from(raw: BinanceBalanceRaw) -> Self {
        BalanceUpdate {
            asset: raw.asset,
            free: raw.free,
            locked: raw.locked,
        }
    }
}

// MARKET orders report GTC; anything unrecognised is treated the same way.
fn parse_time_in_force(s: &str) -> TimeInForce {
    TimeInForce::from_binance_str(s).unwrap_or(TimeInForce::GTC)
}

//! Commands from the command source.
//!
//! Two spellings are accepted, one command per line:
//!
//! ```text
//! {"action":"delayCheck","payload":{"orderParams":{"symbol":"BNBUSDT","side":"BUY","quantity":"1","priceModifier":"0.95"},"delay":10000}}
//! delayCheck BNBUSDT BUY 1 0.95 10000
//! balances
//! getOpenOrders [SYMBOL]
//! cancelOrder SYMBOL
//! done
//! ```

use crate::error::DelayCheckError;
use execution_core::{OrderIntent, OrderSide, OrderType, DEFAULT_RECV_WINDOW_MS};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;
use std::str::FromStr;

/// A delay-check request: the LIMIT leg to place and the threshold to report against.
#[derive(Debug, Clone, PartialEq)]
pub struct DelayCheckRequest {
    pub intent: OrderIntent,
    /// `None` uses the configured default.
    pub delay_threshold_ms: Option<i64>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    DelayCheck(DelayCheckRequest),
    /// Non-zero free balances.
    Balances,
    /// Open orders on one symbol, or on all symbols.
    GetOpenOrders(Option<String>),
    /// Cancel every open order on a symbol.
    CancelOrder(String),
    /// Close the session and exit.
    Done,
}

impl Command {
    pub fn action(&self) -> &'static str {
        match self {
            Self::DelayCheck(_) => "delayCheck",
            Self::Balances => "balances",
            Self::GetOpenOrders(_) => "getOpenOrders",
            Self::CancelOrder(_) => "cancelOrder",
            Self::Done => "done",
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawCommand {
    action: String,
    #[serde(default)]
    payload: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DelayCheckPayload {
    order_params: OrderParams,
    #[serde(default)]
    delay: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrderParams {
    symbol: String,
    side: OrderSide,
    quantity: Decimal,
    #[serde(default)]
    price: Option<Decimal>,
    #[serde(default)]
    price_modifier: Option<Decimal>,
    #[serde(default)]
    recv_window: Option<u64>,
}

impl OrderParams {
    // The first leg of a delay check is always a LIMIT order.
    fn into_intent(self, default_recv_window: u64) -> OrderIntent {
        OrderIntent {
            symbol: self.symbol.to_ascii_uppercase(),
            side: self.side,
            order_type: OrderType::Limit,
            quantity: self.quantity,
            price: self.price,
            price_modifier: self.price_modifier,
            recv_window: self.recv_window.unwrap_or(default_recv_window),
        }
    }
}

fn invalid(message: impl Into<String>) -> DelayCheckError {
    DelayCheckError::InvalidCommand(message.into())
}

/// Symbol named by a payload; `"all"` or nothing means every symbol.
fn symbol_from(payload: &Value) -> Option<String> {
    let symbol = match payload {
        Value::String(s) => s.as_str(),
        Value::Object(map) => map.get("symbol").and_then(Value::as_str)?,
        _ => return None,
    };
    if symbol.is_empty() || symbol.eq_ignore_ascii_case("all") {
        None
    } else {
        Some(symbol.to_ascii_uppercase())
    }
}

fn parse_json(line: &str, default_recv_window: u64) -> Result<Command, DelayCheckError> {
    let raw: RawCommand = serde_json::from_str(line).map_err(|e| invalid(e.to_string()))?;

    match raw.action.as_str() {
        "delayCheck" => {
            let payload: DelayCheckPayload =
                serde_json::from_value(raw.payload).map_err(|e| invalid(e.to_string()))?;
            Ok(Command::DelayCheck(DelayCheckRequest {
                intent: payload.order_params.into_intent(default_recv_window),
                delay_threshold_ms: payload.delay,
            }))
        }
        "balances" => Ok(Command::Balances),
        "getOpenOrders" => Ok(Command::GetOpenOrders(symbol_from(&raw.payload))),
        "cancelOrder" => symbol_from(&raw.payload)
            .map(Command::CancelOrder)
            .ok_or_else(|| invalid("cancelOrder needs a symbol")),
        "done" => Ok(Command::Done),
        other => Err(invalid(format!("unknown action {other}"))),
    }
}

fn parse_decimal(field: &str, value: &str) -> Result<Decimal, DelayCheckError> {
    Decimal::from_str(value).map_err(|_| invalid(format!("{field} must be a number, got {value}")))
}

fn parse_words(line: &str, default_recv_window: u64) -> Result<Command, DelayCheckError> {
    let words: Vec<&str> = line.split_whitespace().collect();

    match words.as_slice() {
        ["delayCheck", symbol, side, quantity, modifier, rest @ ..] if rest.len() <= 1 => {
            let side = OrderSide::from_binance_str(&side.to_ascii_uppercase())
                .ok_or_else(|| invalid(format!("side must be BUY or SELL, got {side}")))?;
            let intent = OrderIntent {
                recv_window: default_recv_window,
                ..OrderIntent::limit_with_modifier(
                    symbol.to_ascii_uppercase(),
                    side,
                    parse_decimal("quantity", quantity)?,
                    parse_decimal("price modifier", modifier)?,
                )
            };
            let delay_threshold_ms = match rest.first() {
                Some(delay) => Some(
                    delay
                        .parse::<i64>()
                        .map_err(|_| invalid(format!("delay must be milliseconds, got {delay}")))?,
                ),
                None => None,
            };
            Ok(Command::DelayCheck(DelayCheckRequest {
                intent,
                delay_threshold_ms,
            }))
        }
        ["delayCheck", ..] => Err(invalid(
            "usage: delayCheck SYMBOL SIDE QUANTITY PRICE_MODIFIER [DELAY_MS]",
        )),
        ["balances"] => Ok(Command::Balances),
        ["getOpenOrders"] => Ok(Command::GetOpenOrders(None)),
        ["getOpenOrders", symbol] => Ok(Command::GetOpenOrders(symbol_from(&Value::String(
            symbol.to_string(),
        )))),
        ["cancelOrder", symbol] => Ok(Command::CancelOrder(symbol.to_ascii_uppercase())),
        ["done"] => Ok(Command::Done),
        [] => Err(invalid("empty command")),
        [action, ..] => Err(invalid(format!("unknown or malformed command {action}"))),
    }
}

impl Command {
    /// Parse one command line; delay checks without a `recvWindow` get
    /// `default_recv_window`.
    pub fn parse_with_recv_window(
        line: &str,
        default_recv_window: u64,
    ) -> Result<Self, DelayCheckError> {
        let line = line.trim();
        if line.starts_with('{') {
            parse_json(line, default_recv_window)
        } else {
            parse_words(line, default_recv_window)
        }
    }
}

impl FromStr for Command {
    type Err = DelayCheckError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        Self::parse_with_recv_window(line, DEFAULT_RECV_WINDOW_MS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_parse_json_delay_check() {
        let line = r#"{"action":"delayCheck","payload":{"orderParams":{"symbol":"bnbusdt","side":"BUY","quantity":"1","priceModifier":"0.95","recvWindow":5000},"delay":2500}}"#;
        let command: Command = line.parse().unwrap();

        let Command::DelayCheck(request) = command else {
            panic!("expected delayCheck");
        };
        assert_eq!(request.delay_threshold_ms, Some(2500));
        assert_eq!(request.intent.symbol, "BNBUSDT");
        assert_eq!(request.intent.order_type, OrderType::Limit);
        assert_eq!(request.intent.price_modifier, Some(dec!(0.95)));
        assert_eq!(request.intent.price, None);
    }

    #[test]
    fn test_parse_word_delay_check() {
        let command: Command = "delayCheck BNBUSDT sell 0.5 1.05".parse().unwrap();
        assert_eq!(
            command,
            Command::DelayCheck(DelayCheckRequest {
                intent: OrderIntent::limit_with_modifier(
                    "BNBUSDT",
                    OrderSide::Sell,
                    dec!(0.5),
                    dec!(1.05)
                ),
                delay_threshold_ms: None,
            })
        );

        let command: Command = "delayCheck BNBUSDT BUY 1 0.95 250".parse().unwrap();
        assert_eq!(command.action(), "delayCheck");
        assert!(matches!(
            command,
            Command::DelayCheck(DelayCheckRequest {
                delay_threshold_ms: Some(250),
                ..
            })
        ));
    }

    #[test]
    fn test_default_recv_window_applies_only_when_missing() {
        let words = Command::parse_with_recv_window("delayCheck BNBUSDT BUY 1 0.95", 9000).unwrap();
        let json = Command::parse_with_recv_window(
            r#"{"action":"delayCheck","payload":{"orderParams":{"symbol":"BNBUSDT","side":"BUY","quantity":"1","priceModifier":"0.95","recvWindow":3000}}}"#,
            9000,
        )
        .unwrap();

        let recv_window = |command: Command| match command {
            Command::DelayCheck(request) => request.intent.recv_window,
            other => panic!("expected delayCheck, got {other:?}"),
        };
        assert_eq!(recv_window(words), 9000);
        assert_eq!(recv_window(json), 3000);
    }

    #[test]
    fn test_parse_auxiliary_commands() {
        assert_eq!("balances".parse::<Command>().unwrap(), Command::Balances);
        assert_eq!(" done ".parse::<Command>().unwrap(), Command::Done);
        assert_eq!(
            "getOpenOrders".parse::<Command>().unwrap(),
            Command::GetOpenOrders(None)
        );
        assert_eq!(
            "getOpenOrders all".parse::<Command>().unwrap(),
            Command::GetOpenOrders(None)
        );
        assert_eq!(
            "cancelOrder bnbusdt".parse::<Command>().unwrap(),
            Command::CancelOrder("BNBUSDT".into())
        );
        assert_eq!(
            r#"{"action":"getOpenOrders","payload":{"symbol":"ETHBTC"}}"#
                .parse::<Command>()
                .unwrap(),
            Command::GetOpenOrders(Some("ETHBTC".into()))
        );
        assert_eq!(
            r#"{"action":"done"}"#.parse::<Command>().unwrap(),
            Command::Done
        );
    }

    #[test]
    fn test_reject_malformed_commands() {
        for line in [
            "",
            "delayCheck BNBUSDT",
            "delayCheck BNBUSDT HOLD 1 0.95",
            "delayCheck BNBUSDT BUY one 0.95",
            "delayCheck BNBUSDT BUY 1 0.95 soon",
            "cancelOrder",
            "withdraw everything",
            r#"{"action":"cancelOrder","payload":{}}"#,
            r#"{"action":"delayCheck","payload":{"delay":1}}"#,
        ] {
            assert!(
                matches!(line.parse::<Command>(), Err(DelayCheckError::InvalidCommand(_))),
                "accepted {line:?}"
            );
        }
    }
}

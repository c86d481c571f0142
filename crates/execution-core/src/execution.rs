//! Execution report from exchange.

use crate::order::{ExecutionType, OrderSide, OrderStatus, OrderType, TimeInForce};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Execution report from exchange (maps to Binance executionReport).
///
/// This is received via WebSocket when an order status changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionReport {
    /// Event timestamp in milliseconds.
    pub event_time_ms: i64,
    /// Trading pair symbol.
    pub symbol: String,
    /// Client-generated order ID.
    pub client_order_id: String,
    /// Order side (buy/sell).
    pub side: OrderSide,
    /// Order type.
    pub order_type: OrderType,
    /// Time in force.
    pub time_in_force: TimeInForce,
    /// Original order quantity.
    pub quantity: Decimal,
    /// Order price.
    pub price: Decimal,
    /// What happened to the order in this event.
    pub execution_type: ExecutionType,
    /// Current order status.
    pub order_status: OrderStatus,
    /// Reject reason, `NONE` when not rejected.
    pub reject_reason: String,
    /// Exchange-assigned order ID.
    pub order_id: u64,
    /// Quantity of the last executed trade.
    pub last_executed_qty: Decimal,
    /// Cumulative filled quantity.
    pub cumulative_filled_qty: Decimal,
    /// Price of the last executed trade.
    pub last_executed_price: Decimal,
    /// Commission paid.
    pub commission: Decimal,
    /// Asset used for commission.
    pub commission_asset: String,
    /// Transaction time in milliseconds, the exchange-side timestamp of the event.
    pub transaction_time_ms: i64,
    /// Trade ID (-1 if no trade occurred).
    pub trade_id: i64,
    /// Whether this side was the maker.
    pub is_maker: bool,
}

impl ExecutionReport {
    /// Check if this report indicates the order is done (terminal state).
    pub fn is_terminal(&self) -> bool {
        self.order_status.is_terminal()
    }

    /// A trade that completed the order.
    pub fn is_full_fill(&self) -> bool {
        self.execution_type == ExecutionType::Trade && self.order_status == OrderStatus::Filled
    }

    /// A trade that left quantity on the book.
    pub fn is_partial_fill(&self) -> bool {
        self.execution_type == ExecutionType::Trade
            && self.order_status == OrderStatus::PartiallyFilled
    }

    /// Calculate remaining quantity to be filled.
    pub fn remaining_qty(&self) -> Decimal {
        self.quantity - self.cumulative_filled_qty
    }

    /// Milliseconds between the exchange transaction time and local receipt.
    pub fn delay_ms(&self, received_at_ms: i64) -> i64 {
        received_at_ms - self.transaction_time_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn make_report() -> ExecutionReport {
        ExecutionReport {
            event_time_ms: 1000,
            symbol: "BTCUSDT".into(),
            client_order_id: "test_order".into(),
            side: OrderSide::Buy,
            order_type: OrderType::Limit,
            time_in_force: TimeInForce::GTC,
            quantity: dec!(1.0),
            price: dec!(50000.0),
            execution_type: ExecutionType::New,
            order_status: OrderStatus::New,
            reject_reason: "NONE".into(),
            order_id: 12345,
            last_executed_qty: dec!(0),
            cumulative_filled_qty: dec!(0),
            last_executed_price: dec!(0),
            commission: dec!(0),
            commission_asset: "BNB".into(),
            transaction_time_ms: 998,
            trade_id: -1,
            is_maker: false,
        }
    }

    #[test]
    fn test_is_terminal() {
        let mut report = make_report();
        assert!(!report.is_terminal());

        report.order_status = OrderStatus::Filled;
        assert!(report.is_terminal());

        report.order_status = OrderStatus::Canceled;
        assert!(report.is_terminal());
    }

    #[test]
    fn test_fill_classification() {
        let mut report = make_report();
        assert!(!report.is_full_fill());

        report.execution_type = ExecutionType::Trade;
        report.order_status = OrderStatus::PartiallyFilled;
        report.last_executed_qty = dec!(0.4);
        report.cumulative_filled_qty = dec!(0.4);
        assert!(report.is_partial_fill());
        assert!(!report.is_full_fill());
        assert_eq!(report.remaining_qty(), dec!(0.6));

        report.order_status = OrderStatus::Filled;
        report.cumulative_filled_qty = dec!(1.0);
        assert!(report.is_full_fill());
        assert!(!report.is_partial_fill());
    }

    #[test]
    fn test_delay_is_receipt_minus_transaction_time() {
        let report = make_report();
        assert_eq!(report.delay_ms(1010), 12);
    }
}

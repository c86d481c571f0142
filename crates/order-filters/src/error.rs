use execution_core::OrderType;
use rust_decimal::Decimal;
use thiserror::Error;

/// Why an order intent cannot become a valid order request.
///
/// These abort only the order at hand; nothing is submitted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransformError {
    #[error("Symbol {0} not found in exchange info")]
    UnknownSymbol(String),

    #[error("LIMIT order needs a price or a price modifier")]
    MissingPrice,

    #[error("Price {price} outside {filter} bounds [{min}, {max}]")]
    PriceOutOfBounds {
        price: Decimal,
        min: Decimal,
        max: Decimal,
        filter: &'static str,
    },

    #[error("Invalid quantity {0}")]
    InvalidQuantity(Decimal),

    #[error("Order type {0} is not supported")]
    UnsupportedOrderType(OrderType),
}

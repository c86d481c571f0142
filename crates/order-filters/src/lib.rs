//! Exchange symbol filters and the order parameter transformer.
//!
//! `FilterSet` holds the per-symbol numeric rules from `exchangeInfo`.
//! [`transform`] rewrites an `OrderIntent` into an `OrderRequest` that
//! satisfies those rules, or explains why it cannot. No I/O happens here:
//! the filters and the current price are supplied by the caller.

mod error;
mod filters;
mod transform;

pub use error::TransformError;
pub use filters::{
    ExchangeInfo, FilterSet, PercentPrice, PriceFilter, SymbolFilter, SymbolFilters, SymbolInfo,
};
pub use transform::{round_to_tick, transform};

//! Symbol filter model.

use execution_core::OrderSide;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Response body of `GET /api/v3/exchangeInfo` (the parts this client uses).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExchangeInfo {
    #[serde(default)]
    pub timezone: String,
    #[serde(default)]
    pub server_time: i64,
    pub symbols: Vec<SymbolInfo>,
}

/// One trading pair in `exchangeInfo`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolInfo {
    pub symbol: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub base_asset: String,
    #[serde(default)]
    pub quote_asset: String,
    #[serde(default)]
    pub filters: Vec<SymbolFilter>,
}

/// A single entry of a symbol's `filters` array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "filterType", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SymbolFilter {
    #[serde(rename_all = "camelCase")]
    PriceFilter {
        min_price: Decimal,
        max_price: Decimal,
        tick_size: Decimal,
    },
    #[serde(rename_all = "camelCase")]
    PercentPrice {
        multiplier_up: Decimal,
        multiplier_down: Decimal,
        #[serde(default)]
        avg_price_mins: u32,
    },
    #[serde(rename_all = "camelCase")]
    PercentPriceBySide {
        bid_multiplier_up: Decimal,
        bid_multiplier_down: Decimal,
        ask_multiplier_up: Decimal,
        ask_multiplier_down: Decimal,
        #[serde(default)]
        avg_price_mins: u32,
    },
    #[serde(rename_all = "camelCase")]
    LotSize {
        min_qty: Decimal,
        max_qty: Decimal,
        step_size: Decimal,
    },
    /// Filters this client does not evaluate.
    #[serde(other)]
    Other,
}

/// `PRICE_FILTER` values. A zero bound or tick disables that check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriceFilter {
    pub min_price: Decimal,
    pub max_price: Decimal,
    pub tick_size: Decimal,
}

/// Percent-of-price bounds around the current price.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PercentPrice {
    /// `PERCENT_PRICE`: same multipliers for both sides.
    Symmetric { up: Decimal, down: Decimal },
    /// `PERCENT_PRICE_BY_SIDE`: bid multipliers apply to BUY, ask to SELL.
    BySide {
        bid_up: Decimal,
        bid_down: Decimal,
        ask_up: Decimal,
        ask_down: Decimal,
    },
}

impl PercentPrice {
    /// `(multiplier_down, multiplier_up)` for an order on `side`.
    pub fn multipliers(&self, side: OrderSide) -> (Decimal, Decimal) {
        match (*self, side) {
            (Self::Symmetric { up, down }, _) => (down, up),
            (
                Self::BySide {
                    bid_up, bid_down, ..
                },
                OrderSide::Buy,
            ) => (bid_down, bid_up),
            (
                Self::BySide {
                    ask_up, ask_down, ..
                },
                OrderSide::Sell,
            ) => (ask_down, ask_up),
        }
    }
}

/// The price rules for one symbol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolFilters {
    pub symbol: String,
    pub price: Option<PriceFilter>,
    pub percent: Option<PercentPrice>,
}

impl SymbolFilters {
    /// Collect the evaluated rules from a symbol's raw filter list.
    ///
    /// `PERCENT_PRICE` wins over `PERCENT_PRICE_BY_SIDE` when both are present.
    pub fn from_symbol_info(info: &SymbolInfo) -> Self {
        let mut price = None;
        let mut symmetric = None;
        let mut by_side = None;

        for filter in &info.filters {
            match *filter {
                SymbolFilter::PriceFilter {
                    min_price,
                    max_price,
                    tick_size,
                } => {
                    price = Some(PriceFilter {
                        min_price,
                        max_price,
                        tick_size,
                    })
                }
                SymbolFilter::PercentPrice {
                    multiplier_up,
                    multiplier_down,
                    ..
                } => {
                    symmetric = Some(PercentPrice::Symmetric {
                        up: multiplier_up,
                        down: multiplier_down,
                    })
                }
                SymbolFilter::PercentPriceBySide {
                    bid_multiplier_up,
                    bid_multiplier_down,
                    ask_multiplier_up,
                    ask_multiplier_down,
                    ..
                } => {
                    by_side = Some(PercentPrice::BySide {
                        bid_up: bid_multiplier_up,
                        bid_down: bid_multiplier_down,
                        ask_up: ask_multiplier_up,
                        ask_down: ask_multiplier_down,
                    })
                }
                SymbolFilter::LotSize { .. } | SymbolFilter::Other => {}
            }
        }

        Self {
            symbol: info.symbol.clone(),
            price,
            percent: symmetric.or(by_side),
        }
    }
}

/// Filter rules for every known symbol, immutable once built.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterSet {
    symbols: HashMap<String, SymbolFilters>,
}

impl FilterSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_exchange_info(info: &ExchangeInfo) -> Self {
        let symbols = info
            .symbols
            .iter()
            .map(|s| (s.symbol.clone(), SymbolFilters::from_symbol_info(s)))
            .collect();
        Self { symbols }
    }

    pub fn with_symbol(mut self, filters: SymbolFilters) -> Self {
        self.symbols.insert(filters.symbol.clone(), filters);
        self
    }

    pub fn get(&self, symbol: &str) -> Option<&SymbolFilters> {
        self.symbols.get(symbol)
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.symbols.contains_key(symbol)
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}

impl From<&ExchangeInfo> for FilterSet {
    fn from(info: &ExchangeInfo) -> Self {
        Self::from_exchange_info(info)
    }
}

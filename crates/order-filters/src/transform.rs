//! Order parameter transformer.

use crate::error::TransformError;
use crate::filters::{FilterSet, PriceFilter, SymbolFilters};
use execution_core::{OrderIntent, OrderRequest, OrderType, TimeInForce};
use rust_decimal::{Decimal, RoundingStrategy};

/// Turn an order intent into exchange-valid order parameters.
///
/// MARKET intents pass through without price or time in force. LIMIT intents
/// get their price resolved (`current_price * price_modifier`, or the absolute
/// price), bounds-checked against `PRICE_FILTER`, rounded to the tick size,
/// checked against the percent-price band and marked GTC.
///
/// The returned request carries no client order id, timestamp or signature.
pub fn transform(
    intent: &OrderIntent,
    filters: &FilterSet,
    current_price: Decimal,
) -> Result<OrderRequest, TransformError> {
    let symbol_filters = filters
        .get(&intent.symbol)
        .ok_or_else(|| TransformError::UnknownSymbol(intent.symbol.clone()))?;

    if intent.quantity <= Decimal::ZERO {
        return Err(TransformError::InvalidQuantity(intent.quantity));
    }

    let mut request = OrderRequest {
        symbol: intent.symbol.clone(),
        side: intent.side,
        order_type: intent.order_type,
        quantity: intent.quantity,
        price: None,
        time_in_force: None,
        recv_window: intent.recv_window,
        new_client_order_id: None,
    };

    match intent.order_type {
        OrderType::Market => Ok(request),
        OrderType::Limit => {
            let price = limit_price(intent, symbol_filters, current_price)?;
            tracing::debug!(
                symbol = %intent.symbol,
                current_price = %current_price,
                price = %price,
                "Resolved limit price"
            );
            request.price = Some(price);
            request.time_in_force = Some(TimeInForce::GTC);
            Ok(request)
        }
        other => Err(TransformError::UnsupportedOrderType(other)),
    }
}

fn limit_price(
    intent: &OrderIntent,
    filters: &SymbolFilters,
    current_price: Decimal,
) -> Result<Decimal, TransformError> {
    let raw = match (intent.price_modifier, intent.price) {
        (Some(modifier), _) => current_price
            .checked_mul(modifier)
            .ok_or_else(|| overflowed(filters))?,
        (None, Some(price)) => price,
        (None, None) => return Err(TransformError::MissingPrice),
    };

    let Some(price_filter) = filters.price else {
        check_positive(raw, None)?;
        return check_percent(raw, filters, intent, current_price);
    };

    check_price_filter(raw, &price_filter)?;
    let price =
        round_to_tick(raw, price_filter.tick_size).ok_or_else(|| overflowed(filters))?;
    // Rounding may cross a bound that the raw price respected.
    check_price_filter(price, &price_filter)?;

    check_percent(price, filters, intent, current_price)
}

// The resolved price does not fit a decimal at all, so it is out of every bound.
fn overflowed(filters: &SymbolFilters) -> TransformError {
    TransformError::PriceOutOfBounds {
        price: Decimal::MAX,
        min: filters.price.map(|f| f.min_price).unwrap_or(Decimal::ZERO),
        max: filters.price.map(|f| f.max_price).unwrap_or(Decimal::ZERO),
        filter: "PRICE_FILTER",
    }
}

fn check_positive(price: Decimal, filter: Option<&PriceFilter>) -> Result<(), TransformError> {
    if price > Decimal::ZERO {
        return Ok(());
    }
    Err(TransformError::PriceOutOfBounds {
        price,
        min: filter.map(|f| f.min_price).unwrap_or(Decimal::ZERO),
        max: filter.map(|f| f.max_price).unwrap_or(Decimal::ZERO),
        filter: "PRICE_FILTER",
    })
}

fn check_price_filter(price: Decimal, filter: &PriceFilter) -> Result<(), TransformError> {
    check_positive(price, Some(filter))?;

    let too_low = !filter.min_price.is_zero() && price < filter.min_price;
    let too_high = !filter.max_price.is_zero() && price > filter.max_price;
    if too_low || too_high {
        return Err(TransformError::PriceOutOfBounds {
            price,
            min: filter.min_price,
            max: filter.max_price,
            filter: "PRICE_FILTER",
        });
    }
    Ok(())
}

fn check_percent(
    price: Decimal,
    filters: &SymbolFilters,
    intent: &OrderIntent,
    current_price: Decimal,
) -> Result<Decimal, TransformError> {
    let Some(percent) = filters.percent else {
        return Ok(price);
    };
    if current_price <= Decimal::ZERO {
        return Ok(price);
    }

    let (down, up) = percent.multipliers(intent.side);
    let min = current_price.saturating_mul(down);
    let max = current_price.saturating_mul(up);
    if price < min || price > max {
        return Err(TransformError::PriceOutOfBounds {
            price,
            min,
            max,
            filter: "PERCENT_PRICE",
        });
    }
    Ok(price)
}

/// Round `price` to the nearest multiple of `tick_size`.
///
/// Ties round away from zero. The result carries as many decimal places as
/// the significant part of the tick (`0.01000000` gives 2). A zero tick
/// leaves the price untouched. `None` when the number of ticks does not fit
/// a decimal.
pub fn round_to_tick(price: Decimal, tick_size: Decimal) -> Option<Decimal> {
    if tick_size <= Decimal::ZERO {
        return Some(price);
    }

    let tick = tick_size.normalize();
    let steps = price
        .checked_div(tick)?
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
    let mut rounded = steps.checked_mul(tick)?;
    rounded.rescale(tick.scale());
    Some(rounded)
}

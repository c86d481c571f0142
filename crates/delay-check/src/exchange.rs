//! Exchange capabilities the application needs.

use crate::error::DelayCheckError;
use async_trait::async_trait;
use binance_rest::{
    AccountInfo, BinanceRestClient, BinanceRestError, CanceledOrder, NewOrderResponse, OpenOrder,
};
use execution_core::OrderRequest;
use order_filters::{ExchangeInfo, FilterSet};
use rust_decimal::Decimal;

/// REST calls used by the delay check and the auxiliary commands.
#[async_trait]
pub trait ExchangeApi: Send + Sync {
    async fn exchange_info(&self) -> Result<ExchangeInfo, BinanceRestError>;
    async fn symbol_price(&self, symbol: &str) -> Result<Decimal, BinanceRestError>;
    async fn account(&self) -> Result<AccountInfo, BinanceRestError>;
    async fn place_order(&self, order: &OrderRequest)
        -> Result<NewOrderResponse, BinanceRestError>;
    async fn open_orders(&self, symbol: Option<&str>) -> Result<Vec<OpenOrder>, BinanceRestError>;
    async fn cancel_open_orders(&self, symbol: &str)
        -> Result<Vec<CanceledOrder>, BinanceRestError>;
}

#[async_trait]
impl ExchangeApi for BinanceRestClient {
    async fn exchange_info(&self) -> Result<ExchangeInfo, BinanceRestError> {
        BinanceRestClient::exchange_info(self).await
    }

    async fn symbol_price(&self, symbol: &str) -> Result<Decimal, BinanceRestError> {
        Ok(BinanceRestClient::symbol_price(self, symbol).await?.price)
    }

    async fn account(&self) -> Result<AccountInfo, BinanceRestError> {
        BinanceRestClient::account(self).await
    }

    async fn place_order(
        &self,
        order: &OrderRequest,
    ) -> Result<NewOrderResponse, BinanceRestError> {
        BinanceRestClient::place_order(self, order).await
    }

    async fn open_orders(&self, symbol: Option<&str>) -> Result<Vec<OpenOrder>, BinanceRestError> {
        BinanceRestClient::open_orders(self, symbol).await
    }

    async fn cancel_open_orders(
        &self,
        symbol: &str,
    ) -> Result<Vec<CanceledOrder>, BinanceRestError> {
        BinanceRestClient::cancel_open_orders(self, symbol).await
    }
}

/// Source of the current symbol filter set.
///
/// Implementations may serve a cached copy; callers only need the rules for
/// `symbol` to be present in the returned set.
#[async_trait]
pub trait FilterSource: Send + Sync {
    async fn filter_set(&self, symbol: &str) -> Result<FilterSet, DelayCheckError>;
}

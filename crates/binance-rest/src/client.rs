//! Binance REST API client.

use crate::error::BinanceRestError;
use crate::responses::{
    AccountInfo, CanceledOrder, ListenKeyResponse, NewOrderResponse, OpenOrder, SymbolPrice,
};
use auth::{ApiCredentials, QueryParams, RequestSigner};
use common::{now_ms, BinanceEnvironment};
use execution_core::OrderRequest;
use order_filters::ExchangeInfo;
use rest_client::{Method, RestClient, RestError};
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Request timeout for Binance API calls.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Versioned path prefix of every endpoint.
const API_PREFIX: &str = "/api/v3";

/// Header carrying the API key.
const API_KEY_HEADER: &str = "X-MBX-APIKEY";

/// Authentication a call needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Security {
    /// Public endpoint.
    None,
    /// API key header only (user data stream management).
    ApiKey,
    /// API key header plus `timestamp` and `signature` parameters.
    Signed,
}

impl Security {
    fn requires_api_key(&self) -> bool {
        !matches!(self, Self::None)
    }
}

/// Binance REST API client with authentication support.
///
/// Stateless apart from the credentials: no retries, no server time sync.
/// Signed calls carry the local clock as `timestamp`.
pub struct BinanceRestClient {
    client: RestClient,
    credentials: ApiCredentials,
}

impl BinanceRestClient {
    /// Create a new Binance REST client for a specific environment.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn with_environment(
        credentials: ApiCredentials,
        environment: BinanceEnvironment,
    ) -> Result<Self, BinanceRestError> {
        Self::with_base_url(credentials, environment.rest_base_url(), REQUEST_TIMEOUT)
    }

    /// Create a client against an arbitrary base URL.
    pub fn with_base_url(
        credentials: ApiCredentials,
        base_url: &str,
        timeout: Duration,
    ) -> Result<Self, BinanceRestError> {
        let client = RestClient::new(base_url, timeout)?;
        Ok(Self {
            client,
            credentials,
        })
    }

    pub fn base_url(&self) -> &str {
        self.client.base_url()
    }

    /// Get the API key (for logging/debugging).
    pub fn api_key(&self) -> &str {
        self.credentials.api_key()
    }

    // ========================================================================
    // Signed Request Layer
    // ========================================================================

    /// Issue one call against `/api/v3/{endpoint}` and return the 2xx body.
    ///
    /// Parameters go into the query string in insertion order. Signed calls
    /// get a fresh `timestamp` and a `signature` over the exact query string.
    ///
    /// # Errors
    /// - `MissingEndpoint` for an empty endpoint
    /// - `Auth` if signing fails
    /// - `Exchange`/`Http` for non-2xx responses
    /// - `Rest` for transport failures and rate limiting
    pub async fn call(
        &self,
        endpoint: &str,
        method: Method,
        params: QueryParams,
        security: Security,
    ) -> Result<String, BinanceRestError> {
        let endpoint = endpoint.trim_matches('/');
        if endpoint.is_empty() {
            return Err(BinanceRestError::MissingEndpoint);
        }
        let path = format!("{}/{}", API_PREFIX, endpoint);

        let query = match security {
            Security::Signed => {
                RequestSigner::new(&self.credentials).signed_query(params, now_ms())?
            }
            Security::None | Security::ApiKey => params.to_query_string(),
        };

        let api_key_header = [(API_KEY_HEADER, self.credentials.api_key())];
        let headers: &[(&str, &str)] = if security.requires_api_key() {
            &api_key_header
        } else {
            &[]
        };

        match self
            .client
            .request(method.clone(), &path, Some(&query), headers)
            .await
        {
            Ok(body) => Ok(body),
            Err(RestError::HttpError { status, message }) => {
                let err = BinanceRestError::from_api_response(status, &message);
                tracing::warn!(method = %method, path = %path, error = %err, "Request rejected");
                Err(err)
            }
            Err(e) => {
                tracing::warn!(method = %method, path = %path, error = %e, "Request failed");
                Err(e.into())
            }
        }
    }

    async fn call_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        method: Method,
        params: QueryParams,
        security: Security,
    ) -> Result<T, BinanceRestError> {
        let body = self.call(endpoint, method, params, security).await?;
        serde_json::from_str(&body).map_err(|e| {
            tracing::warn!(endpoint = %endpoint, error = %e, "Failed to parse response");
            BinanceRestError::Parse(e.to_string())
        })
    }

    // ========================================================================
    // Market Data
    // ========================================================================

    /// Exchange metadata including every symbol's filters.
    ///
    /// GET /api/v3/exchangeInfo
    pub async fn exchange_info(&self) -> Result<ExchangeInfo, BinanceRestError> {
        let info: ExchangeInfo = self
            .call_json("exchangeInfo", Method::GET, QueryParams::new(), Security::None)
            .await?;
        tracing::debug!(symbols = info.symbols.len(), "Exchange info received");
        Ok(info)
    }

    /// Latest price for a symbol.
    ///
    /// GET /api/v3/ticker/price
    pub async fn symbol_price(&self, symbol: &str) -> Result<SymbolPrice, BinanceRestError> {
        let params = QueryParams::new().with("symbol", symbol);
        self.call_json("ticker/price", Method::GET, params, Security::None)
            .await
    }

    // ========================================================================
    // Account
    // ========================================================================

    /// Account information with balances.
    ///
    /// GET /api/v3/account
    pub async fn account(&self) -> Result<AccountInfo, BinanceRestError> {
        self.call_json("account", Method::GET, QueryParams::new(), Security::Signed)
            .await
    }

    // ========================================================================
    // Listen Key Management
    // ========================================================================

    /// Create a new listen key for user data stream.
    ///
    /// POST /api/v3/userDataStream
    ///
    /// The listen key is valid for 60 minutes and must be refreshed periodically.
    pub async fn create_listen_key(&self) -> Result<String, BinanceRestError> {
        let response: ListenKeyResponse = self
            .call_json(
                "userDataStream",
                Method::POST,
                QueryParams::new(),
                Security::ApiKey,
            )
            .await?;

        tracing::info!("Created listen key");
        Ok(response.listen_key)
    }

    /// Refresh (keep-alive) an existing listen key.
    ///
    /// PUT /api/v3/userDataStream
    pub async fn keepalive_listen_key(&self, listen_key: &str) -> Result<(), BinanceRestError> {
        let params = QueryParams::new().with("listenKey", listen_key);
        self.call("userDataStream", Method::PUT, params, Security::ApiKey)
            .await?;

        tracing::debug!("Listen key refreshed");
        Ok(())
    }

    /// Close a listen key.
    ///
    /// DELETE /api/v3/userDataStream
    pub async fn close_listen_key(&self, listen_key: &str) -> Result<(), BinanceRestError> {
        let params = QueryParams::new().with("listenKey", listen_key);
        self.call("userDataStream", Method::DELETE, params, Security::ApiKey)
            .await?;

        tracing::info!("Listen key closed");
        Ok(())
    }

    // ========================================================================
    // Order Management
    // ========================================================================

    /// Place a new order.
    ///
    /// POST /api/v3/order
    pub async fn place_order(
        &self,
        order: &OrderRequest,
    ) -> Result<NewOrderResponse, BinanceRestError> {
        tracing::info!(
            symbol = %order.symbol,
            side = %order.side,
            order_type = %order.order_type,
            quantity = %order.quantity,
            price = ?order.price,
            client_order_id = ?order.new_client_order_id,
            "Placing order"
        );

        let response: NewOrderResponse = self
            .call_json("order", Method::POST, order_params(order), Security::Signed)
            .await?;

        tracing::info!(
            order_id = response.order_id,
            client_order_id = %response.client_order_id,
            status = ?response.status,
            "Order placed"
        );

        Ok(response)
    }

    /// Open orders for one symbol, or for every symbol when `None`.
    ///
    /// GET /api/v3/openOrders
    pub async fn open_orders(
        &self,
        symbol: Option<&str>,
    ) -> Result<Vec<OpenOrder>, BinanceRestError> {
        let mut params = QueryParams::new();
        if let Some(symbol) = symbol {
            params.set("symbol", symbol);
        }
        self.call_json("openOrders", Method::GET, params, Security::Signed)
            .await
    }

    /// Cancel every open order on a symbol.
    ///
    /// DELETE /api/v3/openOrders
    pub async fn cancel_open_orders(
        &self,
        symbol: &str,
    ) -> Result<Vec<CanceledOrder>, BinanceRestError> {
        let params = QueryParams::new().with("symbol", symbol);
        let canceled: Vec<CanceledOrder> = self
            .call_json("openOrders", Method::DELETE, params, Security::Signed)
            .await?;

        tracing::info!(symbol = %symbol, count = canceled.len(), "Open orders canceled");
        Ok(canceled)
    }
}

/// Query parameters for a new order, in wire order.
pub fn order_params(order: &OrderRequest) -> QueryParams {
    let mut params = QueryParams::new()
        .with("symbol", &order.symbol)
        .with("side", order.side)
        .with("type", order.order_type)
        .with("quantity", order.quantity);

    if let Some(price) = order.price {
        params.set("price", price);
    }
    if let Some(tif) = order.time_in_force {
        params.set("timeInForce", tif);
    }
    params.set("recvWindow", order.recv_window);
    if let Some(id) = &order.new_client_order_id {
        params.set("newClientOrderId", id);
    }
    params
}

impl std::fmt::Debug for BinanceRestClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BinanceRestClient")
            .field("base_url", &self.client.base_url())
            .field("credentials", &self.credentials)
            .finish()
    }
}

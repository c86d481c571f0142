//! Performs the side effects the orchestrator asks for.
//!
//! REST calls and timers run on their own tasks so the event loop never waits
//! on the network. Every completion comes back as an [`AppEvent`] on the same
//! bus as stream frames and commands, which keeps all state changes ordered.

use crate::error::DelayCheckError;
use crate::event::AppEvent;
use crate::exchange::{ExchangeApi, FilterSource};
use crate::notice::{Notice, NoticeSender};
use crate::orchestrator::{Action, PlacedOrder, RunInput};
use binance_rest::CanceledOrder;
use connector_core::EventSender;
use execution_core::{OrderIntent, OrderRequest};
use order_filters::transform;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

pub struct Executor {
    exchange: Arc<dyn ExchangeApi>,
    filters: Arc<dyn FilterSource>,
    events: EventSender<AppEvent>,
    notices: NoticeSender,
    /// REST work that should finish before the process exits.
    tasks: JoinSet<()>,
}

impl Executor {
    pub fn new(
        exchange: Arc<dyn ExchangeApi>,
        filters: Arc<dyn FilterSource>,
        events: EventSender<AppEvent>,
        notices: NoticeSender,
    ) -> Self {
        Self {
            exchange,
            filters,
            events,
            notices,
            tasks: JoinSet::new(),
        }
    }

    pub fn execute(&mut self, action: Action) {
        self.reap();

        match action {
            Action::ScheduleStreamRetry { run_id, after } => {
                self.schedule(after, RunInput::StreamRetry { run_id }.into());
            }
            Action::ScheduleFillTimeout { run_id, after } => {
                self.schedule(after, RunInput::FillTimeout { run_id }.into());
            }
            Action::SubmitLimit {
                run_id,
                intent,
                client_order_id,
            } => {
                let exchange = self.exchange.clone();
                let filters = self.filters.clone();
                let events = self.events.clone();
                self.tasks.spawn(async move {
                    let result =
                        place_limit(exchange.as_ref(), filters.as_ref(), &intent, client_order_id)
                            .await;
                    let _ = events.send(RunInput::LimitPlaced { run_id, result }.into());
                });
            }
            Action::SubmitMarket { run_id, request } => {
                let exchange = self.exchange.clone();
                let events = self.events.clone();
                self.tasks.spawn(async move {
                    let result = place(exchange.as_ref(), &request).await;
                    let _ = events.send(RunInput::MarketPlaced { run_id, result }.into());
                });
            }
            Action::ScheduleSafetyCancel { symbol, after } => {
                let exchange = self.exchange.clone();
                self.tasks.spawn(async move {
                    tokio::time::sleep(after).await;
                    match cancel_if_open(exchange.as_ref(), &symbol).await {
                        Ok(canceled) if !canceled.is_empty() => {
                            info!(symbol = %symbol, count = canceled.len(), "Safety cancel cleared resting orders");
                        }
                        Ok(_) => debug!(symbol = %symbol, "Safety cancel found nothing to cancel"),
                        Err(e) => warn!(symbol = %symbol, error = %e, "Safety cancel failed"),
                    }
                });
            }
            Action::CancelOpenOrders { symbol } => {
                let exchange = self.exchange.clone();
                self.tasks.spawn(async move {
                    if let Err(e) = cancel_if_open(exchange.as_ref(), &symbol).await {
                        warn!(symbol = %symbol, error = %e, "Failed to cancel open orders");
                    }
                });
            }
            Action::Emit(report) => {
                if report.is_success() {
                    info!(run_id = report.run_id, symbol = %report.symbol, "Delay check completed");
                } else {
                    warn!(run_id = report.run_id, outcome = %report.outcome, "Delay check did not complete");
                }
                self.notify(Notice::Report(report));
            }
            Action::Reject(err) => {
                if err.is_exchange_rejection() {
                    warn!(error = %err, "Exchange rejected the request");
                }
                self.notify(Notice::Error(err.to_string()));
            }
        }
    }

    /// Deliver `event` to the bus after `after`.
    ///
    /// Timers are detached: an event for a finished run is simply ignored.
    pub fn schedule(&self, after: Duration, event: AppEvent) {
        let events = self.events.clone();
        tokio::spawn(async move {
            tokio::time::sleep(after).await;
            let _ = events.send(event);
        });
    }

    pub fn notify(&self, notice: Notice) {
        if self.notices.send(notice).is_err() {
            debug!("Notice receiver dropped");
        }
    }

    pub fn balances(&mut self) {
        let exchange = self.exchange.clone();
        let notices = self.notices.clone();
        self.tasks.spawn(async move {
            let notice = match exchange.account().await {
                Ok(account) => Notice::Balances(account.non_zero_balances().cloned().collect()),
                Err(e) => Notice::Error(format!("balances: {e}")),
            };
            let _ = notices.send(notice);
        });
    }

    pub fn open_orders(&mut self, symbol: Option<String>) {
        let exchange = self.exchange.clone();
        let notices = self.notices.clone();
        self.tasks.spawn(async move {
            let notice = match exchange.open_orders(symbol.as_deref()).await {
                Ok(orders) => Notice::OpenOrders { symbol, orders },
                Err(e) => Notice::Error(format!("open orders: {e}")),
            };
            let _ = notices.send(notice);
        });
    }

    /// Cancel everything resting on `symbol`, or say there is nothing.
    pub fn cancel_orders(&mut self, symbol: String) {
        let exchange = self.exchange.clone();
        let notices = self.notices.clone();
        self.tasks.spawn(async move {
            let notice = match cancel_if_open(exchange.as_ref(), &symbol).await {
                Ok(orders) => Notice::Canceled { symbol, orders },
                Err(e) => Notice::Error(format!("cancel orders on {symbol}: {e}")),
            };
            let _ = notices.send(notice);
        });
    }

    /// Wait for in-flight REST work, at most `timeout`.
    pub async fn drain(&mut self, timeout: Duration) {
        let pending = self.tasks.len();
        if pending == 0 {
            return;
        }
        debug!(pending, "Waiting for in-flight requests");

        let wait_all = async { while self.tasks.join_next().await.is_some() {} };
        if tokio::time::timeout(timeout, wait_all).await.is_err() {
            warn!(
                remaining = self.tasks.len(),
                "In-flight requests did not finish in time"
            );
            self.tasks.abort_all();
        }
    }

    fn reap(&mut self) {
        while let Some(joined) = self.tasks.try_join_next() {
            if let Err(e) = joined {
                error!(error = %e, "Request task failed");
            }
        }
    }
}

async fn place(
    exchange: &dyn ExchangeApi,
    request: &OrderRequest,
) -> Result<PlacedOrder, DelayCheckError> {
    info!(
        symbol = %request.symbol,
        side = %request.side,
        order_type = %request.order_type,
        quantity = %request.quantity,
        price = ?request.price,
        client_order_id = ?request.new_client_order_id,
        "Placing order"
    );
    let response = exchange.place_order(request).await?;
    Ok(PlacedOrder {
        client_order_id: response.client_order_id,
        order_id: response.order_id,
    })
}

/// Filters and live price first, then the transformed LIMIT order.
async fn place_limit(
    exchange: &dyn ExchangeApi,
    filters: &dyn FilterSource,
    intent: &OrderIntent,
    client_order_id: String,
) -> Result<PlacedOrder, DelayCheckError> {
    let filter_set = filters.filter_set(&intent.symbol).await?;
    let current_price = exchange.symbol_price(&intent.symbol).await?;
    let request =
        transform(intent, &filter_set, current_price)?.with_client_order_id(client_order_id);
    place(exchange, &request).await
}

/// Cancel only when something rests on the symbol; the exchange rejects a
/// cancel-all on an empty book.
async fn cancel_if_open(
    exchange: &dyn ExchangeApi,
    symbol: &str,
) -> Result<Vec<CanceledOrder>, DelayCheckError> {
    let open = exchange.open_orders(Some(symbol)).await?;
    if open.is_empty() {
        return Ok(Vec::new());
    }
    let canceled = exchange.cancel_open_orders(symbol).await?;
    info!(symbol = %symbol, count = canceled.len(), "Canceled open orders");
    Ok(canceled)
}

//! Runs the application loop against a fake exchange and a local stream server.

use async_trait::async_trait;
use binance_rest::{
    AccountInfo, Balance, BinanceRestError, CanceledOrder, NewOrderResponse, OpenOrder,
};
use common::now_ms;
use connector_binance::ListenKeyApi;
use connector_core::SessionConfig;
use delay_check::{
    create_notice_channel, App, AppConfig, AppEvent, Command, DelayCheckConfig, DelayCheckError,
    ExchangeApi, FilterSource, Notice, NoticeReceiver, RunOutcome, RunReport,
};
use execution_core::{OrderRequest, OrderSide, OrderType};
use futures_util::{SinkExt, StreamExt};
use metrics::create_metrics;
use order_filters::{ExchangeInfo, FilterSet, PercentPrice, PriceFilter, SymbolFilters};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

const WAIT: Duration = Duration::from_secs(5);

struct FakeExchange {
    placed: Mutex<Vec<OrderRequest>>,
    placed_tx: mpsc::UnboundedSender<OrderRequest>,
    next_order_id: AtomicU64,
    cancel_calls: AtomicU64,
}

impl FakeExchange {
    fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<OrderRequest>) {
        let (placed_tx, placed_rx) = mpsc::unbounded_channel();
        let exchange = Arc::new(Self {
            placed: Mutex::new(Vec::new()),
            placed_tx,
            next_order_id: AtomicU64::new(100),
            cancel_calls: AtomicU64::new(0),
        });
        (exchange, placed_rx)
    }

    fn placed(&self) -> Vec<OrderRequest> {
        self.placed.lock().unwrap().clone()
    }
}

#[async_trait]
impl ExchangeApi for FakeExchange {
    async fn exchange_info(&self) -> Result<ExchangeInfo, BinanceRestError> {
        Err(BinanceRestError::MissingEndpoint)
    }

    async fn symbol_price(&self, _symbol: &str) -> Result<Decimal, BinanceRestError> {
        Ok(dec!(300))
    }

    async fn account(&self) -> Result<AccountInfo, BinanceRestError> {
        Ok(AccountInfo {
            can_trade: true,
            update_time: 0,
            account_type: "SPOT".into(),
            balances: vec![
                Balance {
                    asset: "BNB".into(),
                    free: dec!(1000),
                    locked: dec!(0),
                },
                Balance {
                    asset: "BTC".into(),
                    free: dec!(0),
                    locked: dec!(0),
                },
            ],
        })
    }

    async fn place_order(
        &self,
        order: &OrderRequest,
    ) -> Result<NewOrderResponse, BinanceRestError> {
        let order_id = self.next_order_id.fetch_add(1, Ordering::SeqCst);
        self.placed.lock().unwrap().push(order.clone());
        let _ = self.placed_tx.send(order.clone());

        let body = format!(
            r#"{{"symbol":"{}","orderId":{},"orderListId":-1,"clientOrderId":"{}","transactTime":{}}}"#,
            order.symbol,
            order_id,
            order.new_client_order_id.as_deref().unwrap_or_default(),
            now_ms()
        );
        serde_json::from_str(&body).map_err(|e| BinanceRestError::Parse(e.to_string()))
    }

    async fn open_orders(&self, _symbol: Option<&str>) -> Result<Vec<OpenOrder>, BinanceRestError> {
        Ok(Vec::new())
    }

    async fn cancel_open_orders(
        &self,
        _symbol: &str,
    ) -> Result<Vec<CanceledOrder>, BinanceRestError> {
        self.cancel_calls.fetch_add(1, Ordering::SeqCst);
        Ok(Vec::new())
    }
}

struct StaticFilters(FilterSet);

#[async_trait]
impl FilterSource for StaticFilters {
    async fn filter_set(&self, _symbol: &str) -> Result<FilterSet, DelayCheckError> {
        Ok(self.0.clone())
    }
}

fn bnb_filters() -> Arc<StaticFilters> {
    Arc::new(StaticFilters(FilterSet::new().with_symbol(SymbolFilters {
        symbol: "BNBUSDT".into(),
        price: Some(PriceFilter {
            min_price: dec!(0.01),
            max_price: dec!(10000),
            tick_size: dec!(0.01),
        }),
        percent: Some(PercentPrice::Symmetric {
            up: dec!(5),
            down: dec!(0.2),
        }),
    })))
}

struct FakeListenKeys {
    fail_create: bool,
}

#[async_trait]
impl ListenKeyApi for FakeListenKeys {
    async fn create_listen_key(&self) -> Result<String, BinanceRestError> {
        if self.fail_create {
            return Err(BinanceRestError::Http {
                status: 503,
                body: "unavailable".into(),
            });
        }
        Ok("app-key".into())
    }

    async fn keepalive_listen_key(&self, _listen_key: &str) -> Result<(), BinanceRestError> {
        Ok(())
    }

    async fn close_listen_key(&self, _listen_key: &str) -> Result<(), BinanceRestError> {
        Ok(())
    }
}

fn app_config(stream_base_url: &str) -> AppConfig {
    AppConfig {
        session: SessionConfig {
            stream_base_url: stream_base_url.to_string(),
            connect_timeout: WAIT,
            ..SessionConfig::default()
        },
        delay_check: DelayCheckConfig {
            safety_cancel_delay: Duration::from_millis(50),
            ..DelayCheckConfig::default()
        },
        restart_base: Duration::from_millis(10),
        restart_max: Duration::from_millis(50),
        drain_timeout: Duration::from_secs(2),
        ..AppConfig::default()
    }
}

fn execution_frame(order: &OrderRequest, execution_type: &str, status: &str) -> String {
    let client_order_id = order.new_client_order_id.as_deref().unwrap_or_default();
    let filled = if status == "FILLED" {
        order.quantity
    } else {
        Decimal::ZERO
    };
    format!(
        r#"{{"stream":"app-key","data":{{"e":"executionReport","E":{t},"s":"{symbol}","c":"{client_order_id}","S":"{side}","o":"{order_type}","f":"GTC","q":"{qty}","p":"0","x":"{execution_type}","X":"{status}","r":"NONE","i":1,"l":"{filled}","z":"{filled}","L":"0","n":"0","N":null,"T":{t},"t":-1,"m":false}}}}"#,
        t = now_ms() - 3,
        symbol = order.symbol,
        side = order.side,
        order_type = order.order_type,
        qty = order.quantity,
    )
}

/// Accept one client and answer every placed order with stream reports:
/// NEW then FILLED for LIMIT orders, FILLED for MARKET orders.
fn serve_fills(
    listener: TcpListener,
    mut placed_rx: mpsc::UnboundedReceiver<OrderRequest>,
) -> tokio::task::JoinHandle<bool> {
    tokio::spawn(async move {
        let (tcp, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(tcp).await.unwrap();
        let mut saw_close = false;

        loop {
            tokio::select! {
                Some(order) = placed_rx.recv() => {
                    if order.order_type == OrderType::Limit {
                        ws.send(Message::Text(execution_frame(&order, "NEW", "NEW"))).await.unwrap();
                    }
                    ws.send(Message::Text(execution_frame(&order, "TRADE", "FILLED"))).await.unwrap();
                }
                msg = ws.next() => match msg {
                    Some(Ok(Message::Close(_))) => saw_close = true,
                    Some(Ok(_)) => {}
                    _ => break,
                }
            }
        }
        saw_close
    })
}

async fn next_notice(rx: &mut NoticeReceiver) -> Notice {
    tokio::time::timeout(WAIT, rx.recv())
        .await
        .expect("timed out waiting for a notice")
        .expect("notice channel closed")
}

async fn next_report(rx: &mut NoticeReceiver, others: &mut Vec<Notice>) -> RunReport {
    loop {
        match next_notice(rx).await {
            Notice::Report(report) => return report,
            other => others.push(other),
        }
    }
}

#[tokio::test]
async fn delay_check_round_trip_offsets_and_reports() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base_url = format!("ws://{}", listener.local_addr().unwrap());
    let (exchange, placed_rx) = FakeExchange::new();
    let server = serve_fills(listener, placed_rx);

    let (notices_tx, mut notices) = create_notice_channel();
    let app = App::new(
        app_config(&base_url),
        exchange.clone(),
        bnb_filters(),
        Arc::new(FakeListenKeys { fail_create: false }),
        create_metrics(),
        notices_tx,
    );
    let commands = app.event_sender();
    let app_task = tokio::spawn(app.run());

    let first: Command = "delayCheck BNBUSDT BUY 1 0.95 5000".parse().unwrap();
    let second: Command = "delayCheck BNBUSDT SELL 1 1.05".parse().unwrap();
    commands.send(AppEvent::Command(first)).unwrap();
    commands.send(AppEvent::Command(second)).unwrap();

    let mut others = Vec::new();
    let report = next_report(&mut notices, &mut others).await;

    assert_eq!(report.outcome, RunOutcome::Completed);
    assert_eq!(report.symbol, "BNBUSDT");
    assert_eq!(report.threshold_ms, 5000);
    assert_eq!(report.samples.len(), 3);
    assert!(report.samples.iter().all(|s| s.delay_ms >= 0));
    let stats = report.stats.unwrap();
    assert!(stats.min_ms as f64 <= stats.avg_ms && stats.avg_ms <= stats.max_ms as f64);

    assert!(
        others
            .iter()
            .any(|n| matches!(n, Notice::Error(msg) if msg.contains("already running"))),
        "second delay check was not rejected: {others:?}"
    );

    let placed = exchange.placed();
    assert_eq!(placed.len(), 2);
    let (limit, market) = (&placed[0], &placed[1]);
    assert_eq!(limit.order_type, OrderType::Limit);
    assert_eq!(limit.side, OrderSide::Buy);
    assert_eq!(limit.price, Some(dec!(285)));
    assert_eq!(market.order_type, OrderType::Market);
    assert_eq!(market.side, OrderSide::Sell);
    assert_eq!(market.quantity, dec!(1));
    assert_eq!(market.price, None);
    assert_eq!(market.time_in_force, None);
    assert_ne!(limit.new_client_order_id, market.new_client_order_id);

    commands.send(AppEvent::Command(Command::Done)).unwrap();
    let result = tokio::time::timeout(WAIT, app_task).await.unwrap().unwrap();
    assert!(result.is_ok());
    assert!(tokio::time::timeout(WAIT, server).await.unwrap().unwrap());
}

#[tokio::test]
async fn done_while_waiting_for_stream_aborts_the_run() {
    let (exchange, _placed_rx) = FakeExchange::new();
    let (notices_tx, mut notices) = create_notice_channel();
    let app = App::new(
        app_config("ws://127.0.0.1:9"),
        exchange.clone(),
        bnb_filters(),
        Arc::new(FakeListenKeys { fail_create: true }),
        create_metrics(),
        notices_tx,
    );
    let commands = app.event_sender();
    let app_task = tokio::spawn(app.run());

    let command: Command = "delayCheck BNBUSDT BUY 1 0.95".parse().unwrap();
    commands.send(AppEvent::Command(command)).unwrap();
    commands.send(AppEvent::Command(Command::Done)).unwrap();

    let report = next_report(&mut notices, &mut Vec::new()).await;
    assert_eq!(report.outcome, RunOutcome::Aborted("shutdown".into()));
    assert!(report.samples.is_empty());
    assert_eq!(report.threshold_ms, 10_000);

    let result = tokio::time::timeout(WAIT, app_task).await.unwrap().unwrap();
    assert!(result.is_ok());
    assert!(exchange.placed().is_empty());
}

#[tokio::test]
async fn auxiliary_commands_answer_through_notices() {
    let (exchange, _placed_rx) = FakeExchange::new();
    let (notices_tx, mut notices) = create_notice_channel();
    let config = AppConfig {
        restart_base: Duration::from_secs(1),
        restart_max: Duration::from_secs(1),
        ..app_config("ws://127.0.0.1:9")
    };
    let app = App::new(
        config,
        exchange.clone(),
        bnb_filters(),
        Arc::new(FakeListenKeys { fail_create: true }),
        create_metrics(),
        notices_tx,
    );
    let commands = app.event_sender();
    let app_task = tokio::spawn(app.run());

    for command in [
        Command::Balances,
        Command::GetOpenOrders(None),
        Command::CancelOrder("BNBUSDT".into()),
    ] {
        commands.send(AppEvent::Command(command)).unwrap();
    }

    let mut balances = None;
    let mut open_orders = None;
    let mut canceled = None;
    while balances.is_none() || open_orders.is_none() || canceled.is_none() {
        match next_notice(&mut notices).await {
            Notice::Balances(b) => balances = Some(b),
            Notice::OpenOrders { symbol, orders } => open_orders = Some((symbol, orders)),
            Notice::Canceled { symbol, orders } => canceled = Some((symbol, orders)),
            other => panic!("unexpected notice {other:?}"),
        }
    }

    let balances = balances.unwrap();
    assert_eq!(balances.len(), 1);
    assert_eq!(balances[0].asset, "BNB");
    let (scope, orders) = open_orders.unwrap();
    assert_eq!(scope, None);
    assert!(orders.is_empty());
    let (symbol, orders) = canceled.unwrap();
    assert_eq!(symbol, "BNBUSDT");
    assert!(orders.is_empty());
    // Nothing rested on the book, so no cancel call went out.
    assert_eq!(exchange.cancel_calls.load(Ordering::SeqCst), 0);

    commands.send(AppEvent::Command(Command::Done)).unwrap();
    let result = tokio::time::timeout(WAIT, app_task).await.unwrap().unwrap();
    assert!(result.is_ok());
}

#[tokio::test]
async fn gives_up_when_the_stream_never_opens() {
    let (exchange, _placed_rx) = FakeExchange::new();
    let (notices_tx, mut notices) = create_notice_channel();
    let config = AppConfig {
        max_session_restarts: 1,
        ..app_config("ws://127.0.0.1:9")
    };
    let app = App::new(
        config,
        exchange,
        bnb_filters(),
        Arc::new(FakeListenKeys { fail_create: true }),
        create_metrics(),
        notices_tx,
    );

    let result = tokio::time::timeout(WAIT, app.run()).await.unwrap();
    assert!(matches!(result, Err(DelayCheckError::SessionUnavailable(_))));
    assert!(matches!(next_notice(&mut notices).await, Notice::Error(_)));
}

//! Signed request layer against a local HTTP responder.

use auth::{ApiCredentials, HmacSigner, PayloadSigner, QueryParams};
use binance_rest::{BinanceRestClient, BinanceRestError, Method, Security};
use execution_core::{OrderRequest, OrderSide, OrderType, TimeInForce};
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

const SECRET: &str = "NhqPtmdSJYdKjVHjA7PZj4Mge3R5YNiP1e3UZjInClVN65XAbvqqM6A7H5fATj0j";

/// Answer each incoming connection with the next canned `(status, body)` and
/// return the received request heads.
async fn serve(
    responses: Vec<(&'static str, &'static str)>,
) -> (String, JoinHandle<Vec<String>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base_url = format!("http://{}", listener.local_addr().unwrap());

    let handle = tokio::spawn(async move {
        let mut heads = Vec::new();
        for (status, body) in responses {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 8192];
            let mut received = Vec::new();
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                received.extend_from_slice(&buf[..n]);
                if n == 0 || received.windows(4).any(|w| w == b"\r\n\r\n") {
                    break;
                }
            }
            heads.push(String::from_utf8_lossy(&received).into_owned());

            let response = format!(
                "HTTP/1.1 {}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
        }
        heads
    });

    (base_url, handle)
}

fn client(base_url: &str) -> BinanceRestClient {
    let credentials = ApiCredentials::new("test-api-key", Arc::new(HmacSigner::new(SECRET)));
    BinanceRestClient::with_base_url(credentials, base_url, Duration::from_secs(5)).unwrap()
}

fn request_target(head: &str) -> &str {
    head.lines()
        .next()
        .and_then(|line| line.split(' ').nth(1))
        .unwrap()
}

#[tokio::test]
async fn signed_order_carries_timestamp_and_verifiable_signature() {
    let (base_url, server) = serve(vec![(
        "200 OK",
        r#"{"symbol":"BNBUSDT","orderId":7,"orderListId":-1,"clientOrderId":"dc_1","transactTime":1700000000000,"status":"NEW","type":"LIMIT","side":"BUY"}"#,
    )])
    .await;

    let order = OrderRequest {
        symbol: "BNBUSDT".into(),
        side: OrderSide::Buy,
        order_type: OrderType::Limit,
        quantity: dec!(1),
        price: Some(dec!(286.17)),
        time_in_force: Some(TimeInForce::GTC),
        recv_window: 5000,
        new_client_order_id: Some("dc_1".into()),
    };

    let response = client(&base_url).place_order(&order).await.unwrap();
    assert_eq!(response.order_id, 7);

    let heads = server.await.unwrap();
    let head = &heads[0];
    assert!(head.starts_with("POST /api/v3/order?"));
    assert!(head.to_ascii_lowercase().contains("x-mbx-apikey: test-api-key"));

    let target = request_target(head);
    let query = target.split_once('?').unwrap().1;
    let (payload, signature) = query.split_once("&signature=").unwrap();

    assert!(payload.starts_with(
        "symbol=BNBUSDT&side=BUY&type=LIMIT&quantity=1&price=286.17&timeInForce=GTC&recvWindow=5000&newClientOrderId=dc_1&timestamp="
    ));
    let expected = HmacSigner::new(SECRET).sign(payload.as_bytes()).unwrap();
    assert_eq!(signature, expected);
}

#[tokio::test]
async fn public_call_sends_no_key_and_no_signature() {
    let (base_url, server) = serve(vec![(
        "200 OK",
        r#"{"symbol":"BNBUSDT","price":"301.23000000"}"#,
    )])
    .await;

    let price = client(&base_url).symbol_price("BNBUSDT").await.unwrap();
    assert_eq!(price.price, dec!(301.23));

    let heads = server.await.unwrap();
    assert_eq!(request_target(&heads[0]), "/api/v3/ticker/price?symbol=BNBUSDT");
    assert!(!heads[0].to_ascii_lowercase().contains("x-mbx-apikey"));
}

#[tokio::test]
async fn api_key_call_has_header_but_no_signature() {
    let (base_url, server) = serve(vec![("200 OK", "{}")]).await;

    client(&base_url)
        .keepalive_listen_key("abc123")
        .await
        .unwrap();

    let heads = server.await.unwrap();
    assert!(heads[0].starts_with("PUT /api/v3/userDataStream?listenKey=abc123 HTTP/1.1"));
    assert!(heads[0].to_ascii_lowercase().contains("x-mbx-apikey: test-api-key"));
    assert!(!heads[0].contains("signature="));
}

#[tokio::test]
async fn exchange_rejection_is_structured() {
    let (base_url, server) = serve(vec![(
        "400 Bad Request",
        r#"{"code":-2010,"msg":"Account has insufficient balance for requested action."}"#,
    )])
    .await;

    let err = client(&base_url)
        .call(
            "order",
            Method::POST,
            QueryParams::new().with("symbol", "BNBUSDT"),
            Security::Signed,
        )
        .await
        .unwrap_err();
    server.await.unwrap();

    assert_eq!(err.code(), Some(-2010));
    assert!(!err.is_transport());
    assert!(matches!(err, BinanceRestError::Exchange { status: 400, .. }));
}

#[tokio::test]
async fn unreachable_host_is_transport_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = client(&format!("http://{addr}"))
        .open_orders(None)
        .await
        .unwrap_err();
    assert!(err.is_transport(), "expected transport error, got {err:?}");
}

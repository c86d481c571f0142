//! RestClient against a one-shot local HTTP responder.

use rest_client::{Method, RestClient, RestError};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// Accept one connection, answer it with `status` and `body`, and return the
/// raw request head that was received.
async fn serve_once(
    status: &'static str,
    extra_headers: &'static str,
    body: &'static str,
) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base_url = format!("http://{}", listener.local_addr().unwrap());

    let handle = tokio::spawn(async move {
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

        let response = format!(
            "HTTP/1.1 {}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n{}\r\n{}",
            status,
            body.len(),
            extra_headers,
            body
        );
        socket.write_all(response.as_bytes()).await.unwrap();
        socket.shutdown().await.ok();

        String::from_utf8_lossy(&received).into_owned()
    });

    (base_url, handle)
}

#[tokio::test]
async fn success_returns_body_and_sends_headers() {
    let (base_url, server) = serve_once("200 OK", "", r#"{"serverTime":1}"#).await;
    let client = RestClient::new(&base_url, Duration::from_secs(5)).unwrap();

    let body = client
        .request(
            Method::POST,
            "/api/v3/order",
            Some("symbol=BTCUSDT&side=BUY"),
            &[("X-MBX-APIKEY", "my-key")],
        )
        .await
        .unwrap();
    assert_eq!(body, r#"{"serverTime":1}"#);

    let request = server.await.unwrap();
    assert!(request.starts_with("POST /api/v3/order?symbol=BTCUSDT&side=BUY HTTP/1.1"));
    assert!(request.to_ascii_lowercase().contains("x-mbx-apikey: my-key"));
}

#[tokio::test]
async fn non_success_keeps_raw_body() {
    let (base_url, server) = serve_once(
        "400 Bad Request",
        "",
        r#"{"code":-1013,"msg":"Filter failure: PRICE_FILTER"}"#,
    )
    .await;
    let client = RestClient::new(&base_url, Duration::from_secs(5)).unwrap();

    let err = client
        .request(Method::GET, "/api/v3/openOrders", None, &[])
        .await
        .unwrap_err();
    server.await.unwrap();

    match err {
        RestError::HttpError { status, message } => {
            assert_eq!(status, 400);
            assert!(message.contains("-1013"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn rate_limit_reads_retry_after() {
    let (base_url, server) = serve_once("429 Too Many Requests", "retry-after: 7\r\n", "{}").await;
    let client = RestClient::new(&base_url, Duration::from_secs(5)).unwrap();

    let err = client
        .request(Method::GET, "/api/v3/ticker/price", None, &[])
        .await
        .unwrap_err();
    server.await.unwrap();

    assert!(matches!(err, RestError::RateLimited { retry_after_ms: 7000 }));
    assert!(!err.is_transport());
}

#[tokio::test]
async fn refused_connection_is_transport_error() {
    // Bind then drop to get a port nobody listens on.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = RestClient::new(&format!("http://{addr}"), Duration::from_secs(5)).unwrap();
    let err = client
        .request(Method::GET, "/api/v3/time", None, &[])
        .await
        .unwrap_err();

    assert!(err.is_transport(), "expected transport error, got {err:?}");
}

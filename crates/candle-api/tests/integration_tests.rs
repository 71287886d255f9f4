//! Integration tests for the candle API client.
//!
//! Responses come from a one-shot HTTP server on localhost, so no network
//! access is needed.

use candle_api::{CandleClient, CandleQuery, Config, Error};
use replay_core::Timeframe;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// Serve a single canned response and return the base URL plus a handle
/// yielding the raw request line.
async fn serve_once(
    status: &str,
    extra_headers: &[(&str, &str)],
    body: &str,
) -> (String, tokio::task::JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let mut response = format!(
        "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n",
        body.len()
    );
    for (name, value) in extra_headers {
        response.push_str(&format!("{name}: {value}\r\n"));
    }
    response.push_str("\r\n");
    response.push_str(body);

    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];
        loop {
            let n = socket.read(&mut chunk).await.unwrap();
            buf.extend_from_slice(&chunk[..n]);
            if n == 0 || buf.windows(4).any(|w| w == b"\r\n\r\n") {
                break;
            }
        }
        socket.write_all(response.as_bytes()).await.unwrap();
        socket.shutdown().await.unwrap();

        let request = String::from_utf8_lossy(&buf).to_string();
        request.lines().next().unwrap_or_default().to_string()
    });

    (format!("http://{addr}"), handle)
}

/// Test creating a client.
#[test]
fn test_create_client() {
    let client = CandleClient::with_base_url("http://localhost:3000");
    assert!(client.is_ok());
}

/// Test configuration builder.
#[test]
fn test_config_builder() {
    let config = Config::new("https://journal.example.com")
        .with_timeout(Duration::from_secs(5))
        .with_candles_path("/v2/candles")
        .with_user_agent("replay-tests");

    assert_eq!(config.base_url, "https://journal.example.com");
    assert_eq!(config.timeout, Duration::from_secs(5));
    assert_eq!(config.candles_path, "/v2/candles");
    assert_eq!(config.user_agent, "replay-tests");

    let default = Config::default();
    assert_eq!(default.candles_path, "/api/candles");
}

#[tokio::test]
async fn test_fetch_candles() {
    let body = r#"[{"time":60,"open":1.0,"high":2.0,"low":0.5,"close":1.5},
                   {"time":120,"open":1.5,"high":2.5,"low":1.0,"close":2.0,"volume":12.5}]"#;
    let (base, request) = serve_once("200 OK", &[], body).await;

    let client = CandleClient::with_base_url(base).unwrap();
    let query = CandleQuery::new("EURUSD", 0, 180, Timeframe::Min1).cache_only();
    let bars = client.fetch_candles(&query).await.unwrap();

    assert_eq!(bars.len(), 2);
    assert_eq!(bars[0].time, 60);
    assert_eq!(bars[1].volume, Some(12.5));

    let request_line = request.await.unwrap();
    assert!(request_line.starts_with("GET /api/candles?instrument=EURUSD"));
    assert!(request_line.contains("timeframe=1m"));
    assert!(request_line.contains("cacheOnly=true"));
}

#[tokio::test]
async fn test_db_error_header_fails_success_response() {
    let (base, _request) =
        serve_once("200 OK", &[("X-DB-Error", "insert failed")], "[]").await;

    let client = CandleClient::with_base_url(base).unwrap();
    let query = CandleQuery::new("EURUSD", 0, 60, Timeframe::Min1).force();
    let err = client.fetch_candles(&query).await.unwrap_err();

    match err {
        Error::Storage(msg) => assert_eq!(msg, "insert failed"),
        other => panic!("expected storage error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_api_error_uses_details() {
    let (base, _request) = serve_once(
        "500 Internal Server Error",
        &[],
        r#"{"details":"upstream provider unavailable"}"#,
    )
    .await;

    let client = CandleClient::with_base_url(base).unwrap();
    let query = CandleQuery::new("XAUUSD", 0, 60, Timeframe::Min1);
    let err = client.fetch_candles(&query).await.unwrap_err();

    match err {
        Error::Api { status, ref body } => {
            assert_eq!(status, 500);
            assert_eq!(body, "upstream provider unavailable");
        }
        ref other => panic!("expected API error, got {other:?}"),
    }
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_malformed_body_is_json_error() {
    let (base, _request) = serve_once("200 OK", &[], r#"{"not":"an array"}"#).await;

    let client = CandleClient::with_base_url(base).unwrap();
    let query = CandleQuery::new("XAUUSD", 0, 60, Timeframe::Min1);
    let err = client.fetch_candles(&query).await.unwrap_err();
    assert!(matches!(err, Error::Json(_)));
}

//! Unit tests for the HTTP client against a local one-shot server

use reqwest::Client;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use yt_harvester::fetcher::youtube_http::YoutubeHttpClient;
use yt_harvester::fetcher::{Endpoint, EndpointInvoker, ErrorKind, FetcherError, RequestParams};

/// Serve one canned response; yields the request line that was received.
async fn serve_once(status: &'static str, body: &'static str) -> (String, oneshot::Receiver<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base_url = format!("http://{}/youtube/v3", listener.local_addr().unwrap());
    let (tx, rx) = oneshot::channel();

    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut head = Vec::new();
        let mut buf = [0u8; 1024];
        while !head.windows(4).any(|w| w == b"\r\n\r\n") {
            let n = socket.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            head.extend_from_slice(&buf[..n]);
        }
        let request_line = String::from_utf8_lossy(&head)
            .lines()
            .next()
            .unwrap_or_default()
            .to_string();
        let response = format!(
            "HTTP/1.1 {status}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
            body.len()
        );
        socket.write_all(response.as_bytes()).await.unwrap();
        socket.shutdown().await.unwrap();
        let _ = tx.send(request_line);
    });

    (base_url, rx)
}

fn client(base_url: &str) -> YoutubeHttpClient {
    YoutubeHttpClient::with_client(Arc::new(Client::new()), base_url, "test-key")
}

#[tokio::test]
async fn test_success_returns_decoded_body() {
    let (base_url, request) = serve_once("200 OK", r#"{"items":[{"id":"v1"}]}"#).await;
    let params = RequestParams::new().with("part", "snippet").with("id", "v1");

    let body = client(&base_url)
        .invoke(Endpoint::Videos, &params)
        .await
        .unwrap();

    assert_eq!(body["items"][0]["id"], "v1");
    let request_line = request.await.unwrap();
    assert!(request_line.starts_with("GET /youtube/v3/videos?"));
    assert!(request_line.contains("part=snippet"));
    assert!(request_line.contains("id=v1"));
    assert!(request_line.contains("key=test-key"));
}

#[tokio::test]
async fn test_quota_error_is_fatal() {
    let (base_url, _request) = serve_once(
        "403 Forbidden",
        r#"{"error":{"code":403,"message":"quota gone","errors":[{"reason":"quotaExceeded"}]}}"#,
    )
    .await;

    let err = client(&base_url)
        .invoke(Endpoint::Search, &RequestParams::new())
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Fatal);
    assert!(matches!(err, FetcherError::QuotaExhausted { .. }));
}

#[tokio::test]
async fn test_disabled_comments_are_transient() {
    let (base_url, _request) = serve_once(
        "403 Forbidden",
        r#"{"error":{"code":403,"message":"disabled","errors":[{"reason":"commentsDisabled"}]}}"#,
    )
    .await;

    let err = client(&base_url)
        .invoke(Endpoint::CommentThreads, &RequestParams::new())
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Transient);
    assert_eq!(err.status(), Some(403));
    assert_eq!(err.reason(), Some("commentsDisabled"));
}

#[tokio::test]
async fn test_invalid_json_is_parse_error() {
    let (base_url, _request) = serve_once("200 OK", "not json").await;

    let err = client(&base_url)
        .invoke(Endpoint::Channels, &RequestParams::new())
        .await
        .unwrap_err();

    assert!(matches!(err, FetcherError::Parse(_)));
    assert_eq!(err.kind(), ErrorKind::Transient);
}

#[tokio::test]
async fn test_unreachable_host_is_network_error() {
    // Bind then drop to get a port nothing listens on
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = client(&format!("http://{addr}"))
        .invoke(Endpoint::Search, &RequestParams::new())
        .await
        .unwrap_err();

    assert!(matches!(err, FetcherError::Network(_)));
}

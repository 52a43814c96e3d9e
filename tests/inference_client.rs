//! Integration tests for the HTTP inference client.
//!
//! Each test stands up a one-shot HTTP responder on 127.0.0.1 so the real
//! reqwest path (headers, status mapping, body extraction) is exercised
//! without touching the hosted service.

use image::{DynamicImage, Rgb, RgbImage};
use skysniffer_lib::llm::{build_request, AnalysisProfile, HttpInferenceClient, InferenceClient};
use skysniffer_lib::ScanError;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::oneshot;

/// Serve exactly one response; hand the raw request back to the test.
async fn serve_once(status_line: &'static str, body: String) -> (String, oneshot::Receiver<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = oneshot::channel();

    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let request = read_request(&mut socket).await;
        let response = format!(
            "HTTP/1.1 {}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
            status_line,
            body.len(),
            body
        );
        socket.write_all(response.as_bytes()).await.unwrap();
        socket.shutdown().await.ok();
        let _ = tx.send(request);
    });

    (format!("http://{}", addr), rx)
}

/// Read headers plus a content-length body.
async fn read_request(socket: &mut tokio::net::TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 8192];
    loop {
        let n = socket.read(&mut chunk).await.unwrap();
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
        let text = String::from_utf8_lossy(&buf);
        if let Some(header_end) = text.find("\r\n\r\n") {
            let content_length = text[..header_end]
                .lines()
                .find_map(|l| {
                    let lower = l.to_ascii_lowercase();
                    lower
                        .strip_prefix("content-length:")
                        .map(|v| v.trim().parse::<usize>().unwrap_or(0))
                })
                .unwrap_or(0);
            if buf.len() >= header_end + 4 + content_length {
                break;
            }
        }
    }
    String::from_utf8_lossy(&buf).into_owned()
}

fn request() -> skysniffer_lib::llm::AnalysisRequest {
    let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(16, 16, Rgb([100, 150, 220])));
    build_request(&image, AnalysisProfile::Contrail, "gpt-4o").unwrap()
}

fn completion(content: serde_json::Value) -> String {
    serde_json::json!({
        "id": "chatcmpl-test",
        "choices": [{ "index": 0, "message": { "role": "assistant", "content": content } }],
        "usage": { "prompt_tokens": 812, "completion_tokens": 96 }
    })
    .to_string()
}

#[tokio::test]
async fn returns_first_choice_content() {
    let (url, seen) = serve_once("200 OK", completion("{\"is_valid_image\": true}".into())).await;
    let client = HttpInferenceClient::new(&url, Some("sk-test".to_string()), Duration::from_secs(20))
        .unwrap();

    let content = client.complete(&request()).await.unwrap();
    assert_eq!(content, "{\"is_valid_image\": true}");

    let raw = seen.await.unwrap();
    assert!(raw.starts_with("POST /v1/chat/completions"));
    assert!(raw.to_ascii_lowercase().contains("authorization: bearer sk-test"));
    assert!(raw.contains("\"json_object\""));
    assert!(raw.contains("data:image/jpeg;base64,"));
}

#[tokio::test]
async fn partial_key_uses_proxy_header() {
    let (url, seen) = serve_once("200 OK", completion("{}".into())).await;
    let client = HttpInferenceClient::new(&url, Some("v2|abc|def".to_string()), Duration::from_secs(20))
        .unwrap();

    client.complete(&request()).await.unwrap();
    let raw = seen.await.unwrap().to_ascii_lowercase();
    assert!(raw.contains("aiproxy-partial-key: v2|abc|def"));
    assert!(!raw.contains("authorization:"));
}

#[tokio::test]
async fn null_content_is_no_response() {
    let (url, _seen) = serve_once("200 OK", completion(serde_json::Value::Null)).await;
    let client = HttpInferenceClient::new(&url, None, Duration::from_secs(20)).unwrap();
    assert_eq!(
        client.complete(&request()).await,
        Err(ScanError::NoResponseContent)
    );
}

#[tokio::test]
async fn status_codes_are_classified() {
    for (status, expected) in [
        ("429 Too Many Requests", ScanError::RateLimited),
        ("401 Unauthorized", ScanError::ApiKeyInvalid),
        ("503 Service Unavailable", ScanError::TransportError("HTTP 503".to_string())),
    ] {
        let (url, _seen) = serve_once(status, "{\"error\": \"nope\"}".to_string()).await;
        let client = HttpInferenceClient::new(&url, None, Duration::from_secs(20)).unwrap();
        assert_eq!(client.complete(&request()).await, Err(expected), "status {}", status);
    }
}

#[tokio::test]
async fn refused_connection_is_network_unreachable() {
    // Bind then drop to get a port nobody listens on.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client =
        HttpInferenceClient::new(&format!("http://{}", addr), None, Duration::from_secs(20)).unwrap();
    assert_eq!(
        client.complete(&request()).await,
        Err(ScanError::NetworkUnreachable)
    );
}

#[tokio::test]
async fn silent_server_is_timeout() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        // Accept and read, then never answer.
        let (mut socket, _) = listener.accept().await.unwrap();
        let _ = read_request(&mut socket).await;
        tokio::time::sleep(Duration::from_secs(30)).await;
        drop(socket);
    });

    let client =
        HttpInferenceClient::new(&format!("http://{}", addr), None, Duration::from_millis(300))
            .unwrap();
    assert_eq!(client.complete(&request()).await, Err(ScanError::Timeout));
}

// # HTTP Lookup Transport
//
// This crate provides the reqwest-based lookup transport for the hostsync
// resolver.
//
// ## Purpose
//
// Executes the outbound request of one lookup: DNS-over-HTTPS JSON
// endpoints or the scraped lookup page. It is intentionally dumb:
// - No retry (the resolver owns the retry policy)
// - No status judgement (non-2xx responses are returned as-is)
// - No body parsing (the resolver parses per provider format)
//
// ## Error Mapping
//
// - Connect, TLS, timeout, redirect failures → `Error::Transport` (retried)
// - Body read failures → `Error::Http` (retried)

use async_trait::async_trait;
use hostsync_core::traits::{LookupRequest, LookupResponse, LookupTransport};
use hostsync_core::{Error, Result};
use std::time::Duration;
use tracing::debug;

/// Default timeout for one lookup request (10 seconds)
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// reqwest-backed lookup transport
#[derive(Debug, Clone)]
pub struct HttpTransport {
    /// HTTP client
    client: reqwest::Client,
}

impl HttpTransport {
    /// Create a transport with the default timeout
    pub fn new() -> Self {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    /// Create a transport with a custom request timeout
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_default(),
        }
    }

    /// Create a transport over an existing client
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LookupTransport for HttpTransport {
    async fn fetch(&self, request: &LookupRequest) -> Result<LookupResponse> {
        let mut builder = self.client.get(&request.url);
        for (name, value) in &request.headers {
            builder = builder.header(*name, *value);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| Error::transport(format!("Request to {} failed: {}", request.url, e)))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| Error::http(format!("Failed to read response from {}: {}", request.url, e)))?;

        debug!("GET {} -> {} ({} bytes)", request.url, status, body.len());
        Ok(LookupResponse::new(status, body))
    }

    fn transport_name(&self) -> &'static str {
        "http"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    /// Serve one canned response, returning the raw request text
    async fn serve_once(status_line: &'static str, body: &'static str) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }

            let response = format!(
                "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status_line,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
            String::from_utf8_lossy(&request).to_string()
        });

        (format!("http://{}", addr), handle)
    }

    fn transport() -> HttpTransport {
        let client = reqwest::Client::builder()
            .no_proxy()
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap();
        HttpTransport::with_client(client)
    }

    #[tokio::test]
    async fn test_fetch_returns_body_and_sends_headers() {
        let body = r#"{"Answer":[{"type":1,"data":"140.82.114.25"}]}"#;
        let (base, server) = serve_once("200 OK", body).await;

        let request = LookupRequest::new(format!("{}/dns-query?name=github.com&type=A", base))
            .with_header("Accept", "application/dns-json");
        let response = transport().fetch(&request).await.unwrap();

        assert_eq!(response.status, 200);
        let json: serde_json::Value = serde_json::from_str(&response.body).unwrap();
        assert_eq!(json["Answer"][0]["data"], "140.82.114.25");

        let raw = server.await.unwrap().to_ascii_lowercase();
        assert!(raw.starts_with("get /dns-query?name=github.com&type=a"));
        assert!(raw.contains("accept: application/dns-json"));
    }

    #[tokio::test]
    async fn test_error_status_is_not_an_error() {
        let (base, server) = serve_once("503 Service Unavailable", "").await;

        let response = transport()
            .fetch(&LookupRequest::new(format!("{}/resolve", base)))
            .await
            .unwrap();

        assert_eq!(response.status, 503);
        assert!(!response.is_success());
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_connection_refused_is_transport_error() {
        // Bind then drop to get a port nobody listens on
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = transport()
            .fetch(&LookupRequest::new(format!("http://{}/", addr)))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Transport(_)));
    }

    #[test]
    fn test_transport_name() {
        assert_eq!(HttpTransport::new().transport_name(), "http");
    }
}

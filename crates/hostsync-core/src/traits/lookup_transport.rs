// # Lookup Transport Trait
//
// Defines the interface for issuing a single outbound lookup request to an
// external provider (DNS-over-HTTPS endpoint or scraped web page).
//
// ## Implementations
//
// - reqwest-based: `hostsync-lookup-http` crate
// - Scripted doubles in the integration tests
//
// ## Usage
//
// ```rust,ignore
// use hostsync_core::resolver::Provider;
// use hostsync_core::LookupTransport;
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let transport = /* LookupTransport implementation */;
//
//     let request = Provider::Cloudflare.request("github.com");
//     let response = transport.fetch(&request).await?;
//     println!("{} {}", response.status, response.body);
//
//     Ok(())
// }
// ```

use async_trait::async_trait;

/// An outbound lookup request, fully rendered from a provider template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupRequest {
    /// Target URL with the domain already substituted
    pub url: String,
    /// Fixed header set of the provider
    pub headers: Vec<(&'static str, &'static str)>,
}

impl LookupRequest {
    /// Create a request without headers
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headers: Vec::new(),
        }
    }

    /// Add a header
    pub fn with_header(mut self, name: &'static str, value: &'static str) -> Self {
        self.headers.push((name, value));
        self
    }
}

/// Raw response of a lookup request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupResponse {
    /// HTTP status code
    pub status: u16,
    /// Response body as text
    pub body: String,
}

impl LookupResponse {
    /// Create a new response
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Whether the status is in the 2xx range
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Trait for lookup transport implementations
///
/// A transport executes exactly one request per call. It does not retry,
/// does not interpret the body and does not judge the status code: the
/// resolver owns retry policy and parsing.
///
/// # Error Contract
///
/// - `Ok(LookupResponse)`: a response was received, whatever its status
/// - `Err(Error)`: the request did not complete (connect, TLS, timeout,
///   body read). The resolver treats this as transient and retries it.
#[async_trait]
pub trait LookupTransport: Send + Sync {
    /// Perform one lookup request
    async fn fetch(&self, request: &LookupRequest) -> Result<LookupResponse, crate::Error>;

    /// Get the transport name (for logging/debugging)
    fn transport_name(&self) -> &'static str;
}

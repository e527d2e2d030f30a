//! IP resolver
//!
//! Resolves one domain to its current IPv4 address by asking an external
//! lookup provider. The resolver owns provider selection, retry policy and
//! response parsing; the [`LookupTransport`] only moves bytes.
//!
//! ## Failure Model
//!
//! `resolve` never returns an error. Every outcome is a value:
//!
//! | Situation                              | Outcome                               |
//! |----------------------------------------|---------------------------------------|
//! | transport error on every attempt       | `Failed(Transport { attempts, .. })`  |
//! | non-2xx status                         | `Failed(HttpStatus(code))`            |
//! | missing / empty answer list            | `Failed(MissingAnswer)`               |
//! | no A record / no address in the page   | `Failed(NoAddressRecord)`             |
//! | address fails dotted-quad validation   | `Failed(InvalidAddress(..))`          |
//! | undecodable body                       | `Failed(Malformed(..))`               |

pub mod parse;
pub mod provider;
pub mod retry;

pub use provider::{Provider, ResponseFormat};
pub use retry::RetryPolicy;

use std::fmt;
use std::net::Ipv4Addr;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::SyncConfig;
use crate::traits::LookupTransport;

/// Why a lookup produced no address
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveFailure {
    /// The request never completed, retry budget exhausted
    #[error("transport failed after {attempts} attempt(s): {message}")]
    Transport {
        /// Attempts made
        attempts: usize,
        /// Last transport error
        message: String,
    },

    /// Provider answered with a non-2xx status
    #[error("provider returned HTTP {0}")]
    HttpStatus(u16),

    /// Response had no answer list, or an empty one
    #[error("response has no answer section")]
    MissingAnswer,

    /// Response had answers but no address record
    #[error("no A record in response")]
    NoAddressRecord,

    /// Address record failed dotted-quad validation
    #[error("invalid IPv4 address: {0:?}")]
    InvalidAddress(String),

    /// Response body could not be decoded
    #[error("malformed response: {0}")]
    Malformed(String),
}

/// Result of resolving one domain
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveOutcome {
    /// The domain resolved to this address
    Resolved(Ipv4Addr),
    /// No address could be obtained
    Failed(ResolveFailure),
}

impl ResolveOutcome {
    /// The resolved address, if any
    pub fn ip(&self) -> Option<Ipv4Addr> {
        match self {
            ResolveOutcome::Resolved(ip) => Some(*ip),
            ResolveOutcome::Failed(_) => None,
        }
    }

    /// Whether an address was obtained
    pub fn is_resolved(&self) -> bool {
        matches!(self, ResolveOutcome::Resolved(_))
    }
}

impl fmt::Display for ResolveOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolveOutcome::Resolved(ip) => write!(f, "{}", ip),
            ResolveOutcome::Failed(reason) => write!(f, "unresolved ({})", reason),
        }
    }
}

impl From<Result<Ipv4Addr, ResolveFailure>> for ResolveOutcome {
    fn from(result: Result<Ipv4Addr, ResolveFailure>) -> Self {
        match result {
            Ok(ip) => ResolveOutcome::Resolved(ip),
            Err(reason) => ResolveOutcome::Failed(reason),
        }
    }
}

/// Resolves domains through the configured providers
pub struct IpResolver {
    transport: Arc<dyn LookupTransport>,
    providers: Vec<Provider>,
    retry: RetryPolicy,
    fallback: bool,
}

impl IpResolver {
    /// Create a resolver
    ///
    /// An empty provider list falls back to [`Provider::ALL`].
    pub fn new(
        transport: Arc<dyn LookupTransport>,
        providers: Vec<Provider>,
        retry: RetryPolicy,
    ) -> Self {
        let providers = if providers.is_empty() {
            Provider::ALL.to_vec()
        } else {
            providers
        };

        Self {
            transport,
            providers,
            retry,
            fallback: false,
        }
    }

    /// Create a resolver from configuration
    pub fn from_config(transport: Arc<dyn LookupTransport>, config: &SyncConfig) -> Self {
        Self::new(
            transport,
            config.providers.clone(),
            RetryPolicy::from(&config.retry),
        )
        .with_fallback(config.provider_fallback)
    }

    /// Try the remaining providers in order when the default one fails
    pub fn with_fallback(mut self, fallback: bool) -> Self {
        self.fallback = fallback;
        self
    }

    /// Configured providers, default first
    pub fn providers(&self) -> &[Provider] {
        &self.providers
    }

    /// Pick the provider for a request
    ///
    /// The requested provider is used when it is configured; otherwise the
    /// first configured provider.
    pub fn select_provider(&self, requested: Option<Provider>) -> Provider {
        match requested {
            Some(provider) if self.providers.contains(&provider) => provider,
            Some(provider) => {
                debug!(
                    "Provider {} not configured, using {}",
                    provider, self.providers[0]
                );
                self.providers[0]
            }
            None => self.providers[0],
        }
    }

    /// Resolve one domain
    ///
    /// With an explicit provider, only that provider is asked. Without one,
    /// the default provider is asked, followed by the others in configured
    /// order when fallback is enabled.
    pub async fn resolve(&self, domain: &str, provider: Option<Provider>) -> ResolveOutcome {
        if provider.is_some() || !self.fallback {
            let provider = self.select_provider(provider);
            return self.resolve_with(domain, provider).await;
        }

        let mut last = ResolveOutcome::Failed(ResolveFailure::NoAddressRecord);
        for provider in &self.providers {
            last = self.resolve_with(domain, *provider).await;
            if last.is_resolved() {
                break;
            }
            debug!("Provider {} failed for {}, trying next", provider, domain);
        }
        last
    }

    /// Resolve through one specific provider
    async fn resolve_with(&self, domain: &str, provider: Provider) -> ResolveOutcome {
        let request = provider.request(domain);

        let response = match self
            .retry
            .run(domain, || self.transport.fetch(&request))
            .await
        {
            Ok(response) => response,
            Err((e, attempts)) => {
                warn!(
                    "Lookup of {} via {} failed after {} attempt(s): {}",
                    domain, provider, attempts, e
                );
                return ResolveOutcome::Failed(ResolveFailure::Transport {
                    attempts,
                    message: e.to_string(),
                });
            }
        };

        if !response.is_success() {
            warn!(
                "Lookup of {} via {} returned HTTP {}",
                domain, provider, response.status
            );
            return ResolveOutcome::Failed(ResolveFailure::HttpStatus(response.status));
        }

        let outcome = ResolveOutcome::from(parse::parse_response(provider.format(), &response.body));
        if let ResolveOutcome::Failed(reason) = &outcome {
            debug!("Lookup of {} via {}: {}", domain, provider, reason);
        }
        outcome
    }
}

//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the harvester, including:
//! - Building HTTP clients with a bounded total timeout
//! - Rotating a random User-Agent on every attempt
//! - Exponential backoff on HTTP 429
//! - Flat cooldown on network errors
//! - Error classification and failure ledger entries

use crate::config::FetcherConfig;
use crate::crawler::headers::UserAgentPool;
use crate::crawler::retry::RetryPolicy;
use crate::ledger::Ledgers;
use reqwest::header::RETRY_AFTER;
use reqwest::{Client, Response, StatusCode};
use std::sync::Arc;
use std::time::Duration;

/// Result of a fetch attempt or of a whole fetch
///
/// A single attempt yields `Success`, `RateLimited`, `Failed` or
/// `NetworkError`. [`Fetcher::fetch`] resolves to `Success`, `Failed` or
/// `GaveUp`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Page body fetched with status 200
    Success {
        /// Response body decoded as text
        body: String,
        /// HTTP status code
        status: u16,
    },

    /// HTTP 429; retried with exponential backoff
    RateLimited {
        /// Value of the Retry-After header, if it carried seconds
        retry_after_hint: Option<Duration>,
    },

    /// Any other non-200 status; never retried
    Failed {
        /// HTTP status code
        status: u16,
        /// Reason phrase
        message: String,
    },

    /// Timeout, connection refused, body read failure
    NetworkError {
        /// Error description
        message: String,
    },

    /// Attempt ceiling exhausted on retryable outcomes
    GaveUp {
        /// Number of attempts made
        attempts: u32,
        /// Reason of the last attempt
        last_reason: String,
    },
}

impl FetchOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Returns the body of a successful fetch
    pub fn into_body(self) -> Option<String> {
        match self {
            Self::Success { body, .. } => Some(body),
            _ => None,
        }
    }

    /// Short human-readable reason for ledgers and logs
    pub fn reason(&self) -> String {
        match self {
            Self::Success { status, .. } => format!("HTTP {}", status),
            Self::RateLimited { .. } => "HTTP 429 rate limited".to_string(),
            Self::Failed { status, message } => format!("HTTP {} {}", status, message),
            Self::NetworkError { message } => format!("network error: {}", message),
            Self::GaveUp {
                attempts,
                last_reason,
            } => format!("gave up after {} attempts ({})", attempts, last_reason),
        }
    }
}

/// Builds an HTTP client with the configured total timeout
///
/// # Example
///
/// ```no_run
/// use scent_harvest::config::FetcherConfig;
/// use scent_harvest::crawler::build_http_client;
///
/// let config = FetcherConfig {
///     base_url: "https://www.example.com".to_string(),
///     request_timeout_ms: 15_000,
///     max_attempts: 10,
///     backoff_base_ms: 20_000,
///     backoff_cap_ms: 120_000,
///     network_cooldown_ms: 60_000,
///     user_agents: vec![],
/// };
///
/// let client = build_http_client(&config).unwrap();
/// ```
pub fn build_http_client(config: &FetcherConfig) -> Result<Client, reqwest::Error> {
    let timeout = config.request_timeout();

    Client::builder()
        .timeout(timeout)
        .connect_timeout(timeout.min(Duration::from_secs(10)))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Rate-limit aware HTTP fetcher
///
/// Cheap to clone; clones share the client, the agent pool and the ledgers.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    agents: Arc<UserAgentPool>,
    policy: RetryPolicy,
    ledgers: Arc<Ledgers>,
    bearer_token: Option<String>,
}

impl Fetcher {
    /// Creates a fetcher from configuration
    pub fn new(config: &FetcherConfig, ledgers: Arc<Ledgers>) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: build_http_client(config)?,
            agents: Arc::new(UserAgentPool::new(&config.user_agents)),
            policy: RetryPolicy::from_config(config),
            ledgers,
            bearer_token: None,
        })
    }

    /// Attaches a bearer token to every subsequent request
    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Fetches a URL, retrying rate limits and network errors
    ///
    /// # Retry Logic
    ///
    /// | Condition | Action |
    /// |-----------|--------|
    /// | HTTP 200 | Return `Success` |
    /// | HTTP 429 | Wait `min(base * 2^attempt, cap)`, retry |
    /// | Other HTTP status | Return `Failed` immediately |
    /// | Timeout / connection error | Wait flat cooldown, retry |
    /// | Attempt ceiling reached | Return `GaveUp` |
    ///
    /// Every non-success attempt is appended to the failure ledger; `GaveUp`
    /// is additionally appended to the gave-up ledger.
    pub async fn fetch(&self, url: &str) -> FetchOutcome {
        let max_attempts = self.policy.max_attempts;
        let mut last_reason = String::new();

        for attempt in 0..max_attempts {
            let outcome = self.attempt(url).await;
            let is_last = attempt + 1 == max_attempts;

            match outcome {
                FetchOutcome::Success { .. } => {
                    if attempt > 0 {
                        tracing::debug!("Fetched {} after {} attempts", url, attempt + 1);
                    }
                    return outcome;
                }

                FetchOutcome::Failed { status, .. } => {
                    self.ledgers.record_failure(url, &outcome.reason());
                    tracing::warn!("HTTP {} for {}, skipping", status, url);
                    return outcome;
                }

                FetchOutcome::RateLimited { retry_after_hint } => {
                    self.ledgers.record_failure(url, &outcome.reason());
                    last_reason = outcome.reason();

                    if !is_last {
                        let wait = self.policy.rate_limit_backoff(attempt);
                        tracing::warn!(
                            "Rate limited on {} (attempt {}/{}, retry-after hint {:?}), waiting {:?}",
                            url,
                            attempt + 1,
                            max_attempts,
                            retry_after_hint,
                            wait
                        );
                        tokio::time::sleep(wait).await;
                    }
                }

                FetchOutcome::NetworkError { ref message } => {
                    self.ledgers.record_failure(url, &outcome.reason());
                    last_reason = outcome.reason();

                    if !is_last {
                        let wait = self.policy.network_cooldown();
                        tracing::warn!(
                            "Network error on {} (attempt {}/{}): {}. Retrying in {:?}",
                            url,
                            attempt + 1,
                            max_attempts,
                            message,
                            wait
                        );
                        tokio::time::sleep(wait).await;
                    }
                }

                FetchOutcome::GaveUp { .. } => return outcome,
            }
        }

        self.ledgers.record_gave_up(url, max_attempts, &last_reason);
        tracing::error!(
            "Max attempts ({}) reached for {}, skipping",
            max_attempts,
            url
        );

        FetchOutcome::GaveUp {
            attempts: max_attempts,
            last_reason,
        }
    }

    /// Performs a single request with a freshly drawn User-Agent
    pub async fn attempt(&self, url: &str) -> FetchOutcome {
        let mut request = self.client.get(url).headers(self.agents.headers());
        if let Some(token) = &self.bearer_token {
            request = request.bearer_auth(token);
        }

        match request.send().await {
            Ok(response) => classify_response(response).await,
            Err(e) => FetchOutcome::NetworkError {
                message: describe_error(&e),
            },
        }
    }
}

/// Maps a response onto an attempt outcome
async fn classify_response(response: Response) -> FetchOutcome {
    let status = response.status();

    if status == StatusCode::TOO_MANY_REQUESTS {
        return FetchOutcome::RateLimited {
            retry_after_hint: parse_retry_after(&response),
        };
    }

    if status != StatusCode::OK {
        return FetchOutcome::Failed {
            status: status.as_u16(),
            message: status.canonical_reason().unwrap_or("Unknown").to_string(),
        };
    }

    match response.text().await {
        Ok(body) => FetchOutcome::Success {
            body,
            status: status.as_u16(),
        },
        Err(e) => FetchOutcome::NetworkError {
            message: describe_error(&e),
        },
    }
}

/// Reads a Retry-After header expressed in seconds
fn parse_retry_after(response: &Response) -> Option<Duration> {
    response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

fn describe_error(e: &reqwest::Error) -> String {
    if e.is_timeout() {
        "Request timeout".to_string()
    } else if e.is_connect() {
        format!("Connection failed: {}", e)
    } else {
        e.to_string()
    }
}

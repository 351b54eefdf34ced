use serde::Deserialize;
use std::time::Duration;

/// Main configuration structure for Scent-Harvest
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub job: JobConfig,
    pub fetcher: FetcherConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub ledgers: LedgerConfig,
    #[serde(default)]
    pub discussion: Option<DiscussionConfig>,
}

/// Which kind of entity a job harvests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JobKind {
    /// Perfume detail pages grouped by designer
    Perfume,
    /// Discussion posts grouped by subreddit
    Discussion,
}

/// Where checkpoints are persisted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CheckpointBackend {
    #[default]
    Json,
    Sqlite,
}

/// Job-level configuration: what to harvest and where state lives
#[derive(Debug, Clone, Deserialize)]
pub struct JobConfig {
    pub kind: JobKind,

    /// Path to the seed file (JSON array of groups)
    #[serde(rename = "seed-path")]
    pub seed_path: String,

    /// Path to the checkpoint file or database
    #[serde(rename = "checkpoint-path")]
    pub checkpoint_path: String,

    /// Path to the output artifact (JSON)
    #[serde(rename = "output-path")]
    pub output_path: String,

    #[serde(rename = "checkpoint-backend", default)]
    pub checkpoint_backend: CheckpointBackend,
}

/// HTTP fetch behavior
#[derive(Debug, Clone, Deserialize)]
pub struct FetcherConfig {
    /// Origin used to resolve relative links (e.g. "https://www.example.com")
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Total timeout for a single request (milliseconds)
    #[serde(rename = "request-timeout-ms", default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Attempt ceiling shared by rate-limit and network retries
    #[serde(rename = "max-attempts", default = "default_max_attempts")]
    pub max_attempts: u32,

    /// First rate-limit backoff step (milliseconds)
    #[serde(rename = "backoff-base-ms", default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,

    /// Upper bound for any rate-limit backoff (milliseconds)
    #[serde(rename = "backoff-cap-ms", default = "default_backoff_cap_ms")]
    pub backoff_cap_ms: u64,

    /// Flat wait after a network error (milliseconds)
    #[serde(rename = "network-cooldown-ms", default = "default_network_cooldown_ms")]
    pub network_cooldown_ms: u64,

    /// User-Agent pool; an empty list selects the built-in browser pool
    #[serde(rename = "user-agents", default)]
    pub user_agents: Vec<String>,
}

impl FetcherConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Batch scheduling and pacing
#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerConfig {
    #[serde(rename = "batch-size", default = "default_batch_size")]
    pub batch_size: usize,

    /// Maximum in-flight fetch+extract tasks (1 = sequential)
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    #[serde(rename = "launch-delay-min-ms", default = "default_launch_delay_min_ms")]
    pub launch_delay_min_ms: u64,

    #[serde(rename = "launch-delay-max-ms", default = "default_launch_delay_max_ms")]
    pub launch_delay_max_ms: u64,

    #[serde(
        rename = "discovery-delay-min-ms",
        default = "default_discovery_delay_min_ms"
    )]
    pub discovery_delay_min_ms: u64,

    #[serde(
        rename = "discovery-delay-max-ms",
        default = "default_discovery_delay_max_ms"
    )]
    pub discovery_delay_max_ms: u64,

    /// How many listing pages discovery may follow for one group
    #[serde(rename = "max-listing-pages", default = "default_max_listing_pages")]
    pub max_listing_pages: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            concurrency: default_concurrency(),
            launch_delay_min_ms: default_launch_delay_min_ms(),
            launch_delay_max_ms: default_launch_delay_max_ms(),
            discovery_delay_min_ms: default_discovery_delay_min_ms(),
            discovery_delay_max_ms: default_discovery_delay_max_ms(),
            max_listing_pages: default_max_listing_pages(),
        }
    }
}

/// Append-only diagnostic logs; an absent path disables that ledger
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LedgerConfig {
    #[serde(rename = "failure-log")]
    pub failure_log: Option<String>,

    #[serde(rename = "gave-up-log")]
    pub gave_up_log: Option<String>,

    #[serde(rename = "missing-fields-log")]
    pub missing_fields_log: Option<String>,
}

/// Discussion API settings
#[derive(Debug, Clone, Deserialize)]
pub struct DiscussionConfig {
    /// API origin used for listings and threads
    #[serde(rename = "api-base-url", default = "default_api_base_url")]
    pub api_base_url: String,

    /// Token endpoint for application-only OAuth
    #[serde(rename = "auth-url", default = "default_auth_url")]
    pub auth_url: String,

    #[serde(rename = "client-id")]
    pub client_id: Option<String>,

    #[serde(rename = "client-secret")]
    pub client_secret: Option<String>,

    /// User agent sent with the token request
    #[serde(rename = "user-agent")]
    pub user_agent: Option<String>,

    /// Search query terms, joined with OR
    #[serde(rename = "search-terms", default)]
    pub search_terms: Vec<String>,

    /// Listing page size
    #[serde(rename = "page-limit", default = "default_page_limit")]
    pub page_limit: u32,
}

impl DiscussionConfig {
    /// Returns the credential pair when both halves are configured
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (&self.client_id, &self.client_secret) {
            (Some(id), Some(secret)) if !id.is_empty() && !secret.is_empty() => {
                Some((id.as_str(), secret.as_str()))
            }
            _ => None,
        }
    }
}

fn default_request_timeout_ms() -> u64 {
    15_000
}

fn default_max_attempts() -> u32 {
    10
}

fn default_backoff_base_ms() -> u64 {
    20_000
}

fn default_backoff_cap_ms() -> u64 {
    120_000
}

fn default_network_cooldown_ms() -> u64 {
    60_000
}

fn default_batch_size() -> usize {
    50
}

fn default_concurrency() -> usize {
    5
}

fn default_launch_delay_min_ms() -> u64 {
    100
}

fn default_launch_delay_max_ms() -> u64 {
    1_000
}

fn default_discovery_delay_min_ms() -> u64 {
    2_000
}

fn default_discovery_delay_max_ms() -> u64 {
    7_000
}

fn default_max_listing_pages() -> u32 {
    10
}

fn default_api_base_url() -> String {
    "https://www.reddit.com".to_string()
}

fn default_auth_url() -> String {
    "https://www.reddit.com/api/v1/access_token".to_string()
}

fn default_page_limit() -> u32 {
    100
}

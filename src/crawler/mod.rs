//! Crawler module for page fetching and pipeline orchestration
//!
//! This module contains the core harvesting logic, including:
//! - HTTP fetching with User-Agent rotation, backoff and retry ceilings
//! - Link discovery for perfume designers and subreddits
//! - Bounded-concurrency batch scheduling
//! - Overall run coordination with checkpointing

mod auth;
mod coordinator;
mod discovery;
mod fetcher;
mod headers;
mod retry;
mod scheduler;

pub use auth::fetch_app_token;
pub use coordinator::{CancelFlag, Coordinator, RunSummary};
pub use discovery::{
    discover_designer_groups, discover_group, DiscoveryError, DiscoveryPacing,
    DiscussionLinkDiscoverer, LinkDiscoverer, PerfumeLinkDiscoverer, SeedLink,
};
pub use fetcher::{build_http_client, FetchOutcome, Fetcher};
pub use headers::{UserAgentPool, DEFAULT_USER_AGENTS};
pub use retry::{random_delay, RetryPolicy};
pub use scheduler::{partition, BatchReport, BatchScheduler};

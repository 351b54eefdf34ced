//! Scent-Harvest: a resumable perfume and discussion harvester
//!
//! This crate fetches grouped entity pages (perfumes by designer, posts by
//! subreddit) from rate-limited sources, extracts typed records from them and
//! checkpoints progress after every batch so that long jobs survive interruption.

pub mod config;
pub mod crawler;
pub mod extract;
pub mod ledger;
pub mod output;
pub mod seeds;
pub mod state;
pub mod storage;

use thiserror::Error;

/// Main error type for Scent-Harvest operations
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Output error: {0}")]
    Output(#[from] output::OutputError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Invalid state transition: {from:?} -> {to:?}")]
    InvalidTransition {
        from: state::GroupState,
        to: state::GroupState,
    },

    #[error("Task fault in group {group}: {message}")]
    TaskFault { group: String, message: String },
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Seed file errors
#[derive(Debug, Error)]
pub enum SeedError {
    #[error("Failed to read seed file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse seed file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid seed entry: {0}")]
    Invalid(String),
}

// Re-export commonly used types
pub use config::Config;
pub use crawler::{Coordinator, FetchOutcome, Fetcher, RunSummary};
pub use extract::{DiscussionPost, Extractor, PerfumeRecord};
pub use state::GroupState;

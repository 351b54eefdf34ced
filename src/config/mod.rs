//! Configuration module for Scent-Harvest
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//! A configuration is immutable for the duration of a run.
//!
//! # Example
//!
//! ```no_run
//! use scent_harvest::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("harvest.toml")).unwrap();
//! println!("Batch size: {}", config.scheduler.batch_size);
//! ```

mod parser;
mod types;
mod validation;

pub use types::{
    CheckpointBackend, Config, DiscussionConfig, FetcherConfig, JobConfig, JobKind,
    LedgerConfig, SchedulerConfig,
};

pub use parser::{compute_config_hash, config_hash, load_config, load_config_with_hash, parse_config};
pub use validation::validate;

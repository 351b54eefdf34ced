//! Output sink trait and error types
//!
//! This module defines the trait interface for output artifacts and
//! associated error types.

use crate::storage::GroupRecord;
use serde::Serialize;
use thiserror::Error;

/// Errors that can occur during output operations
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Failed to format output: {0}")]
    Format(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// Destination of the accumulated records
///
/// Every `write` replaces the previous artifact with the full accumulated
/// data; sinks never append.
pub trait OutputSink<R: Serialize> {
    fn write(&mut self, groups: &[GroupRecord<R>]) -> OutputResult<()>;

    /// Human-readable location for log messages
    fn describe(&self) -> String;
}

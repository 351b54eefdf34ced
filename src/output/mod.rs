//! Output module for the harvested artifact and run summaries
//!
//! This module handles:
//! - Writing the accumulated records as a JSON artifact
//! - Computing and printing statistics from a checkpoint

mod artifact;
pub mod stats;
mod traits;

pub use artifact::JsonArtifact;
pub use stats::{compute_statistics, print_statistics, RunStatistics};
pub use traits::{OutputError, OutputResult, OutputSink};

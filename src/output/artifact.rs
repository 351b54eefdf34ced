//! JSON output artifact
//!
//! The artifact is a JSON array of `{group, records}` objects in processing
//! order, rewritten wholesale through a temp file and a rename.

use crate::output::traits::{OutputResult, OutputSink};
use crate::storage::{write_atomic, GroupRecord};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Output artifact written as a pretty-printed JSON file
#[derive(Debug, Clone)]
pub struct JsonArtifact {
    path: PathBuf,
}

impl JsonArtifact {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl<R: Serialize> OutputSink<R> for JsonArtifact {
    fn write(&mut self, groups: &[GroupRecord<R>]) -> OutputResult<()> {
        let mut body = serde_json::to_vec_pretty(groups)?;
        body.push(b'\n');
        write_atomic(&self.path, &body)?;

        tracing::debug!("Wrote {} groups to {}", groups.len(), self.path.display());
        Ok(())
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

//! Append-only diagnostic ledgers
//!
//! Three text logs sit next to a run for operator diagnosis:
//! - the failure ledger: every non-success fetch attempt
//! - the gave-up ledger: URLs whose attempt ceiling was exhausted
//! - the missing-fields ledger: records emitted with unresolved fields
//!
//! Ledgers are write-only. The pipeline never reads them back, and a failed
//! append is logged and otherwise ignored.

use crate::config::LedgerConfig;
use chrono::{SecondsFormat, Utc};
use std::collections::BTreeSet;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// A single append-only text file
#[derive(Debug)]
pub struct Ledger {
    sink: Option<(PathBuf, Mutex<File>)>,
}

impl Ledger {
    /// Opens (creating if needed) a ledger file in append mode
    pub fn open(path: &Path) -> std::io::Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            sink: Some((path.to_path_buf(), Mutex::new(file))),
        })
    }

    /// A ledger that discards every line
    pub fn disabled() -> Self {
        Self { sink: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.sink.is_some()
    }

    /// Appends one timestamped line
    pub fn append(&self, line: &str) {
        let Some((path, file)) = &self.sink else {
            return;
        };

        let stamped = format!(
            "{} {}\n",
            Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            line
        );

        let mut file = match file.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        if let Err(e) = file.write_all(stamped.as_bytes()) {
            tracing::warn!("Failed to append to ledger {}: {}", path.display(), e);
        }
    }
}

/// The three ledgers of a run
#[derive(Debug)]
pub struct Ledgers {
    pub failures: Ledger,
    pub gave_up: Ledger,
    pub missing_fields: Ledger,
}

impl Ledgers {
    /// Opens every ledger that has a configured path
    pub fn from_config(config: &LedgerConfig) -> std::io::Result<Self> {
        let open = |path: &Option<String>| match path {
            Some(p) => Ledger::open(Path::new(p)),
            None => Ok(Ledger::disabled()),
        };

        Ok(Self {
            failures: open(&config.failure_log)?,
            gave_up: open(&config.gave_up_log)?,
            missing_fields: open(&config.missing_fields_log)?,
        })
    }

    pub fn disabled() -> Self {
        Self {
            failures: Ledger::disabled(),
            gave_up: Ledger::disabled(),
            missing_fields: Ledger::disabled(),
        }
    }

    /// Records a non-success fetch attempt
    pub fn record_failure(&self, url: &str, reason: &str) {
        self.failures
            .append(&format!("URL: {} - {}", url, reason));
    }

    /// Records a URL whose retries were exhausted
    pub fn record_gave_up(&self, url: &str, attempts: u32, last_reason: &str) {
        self.gave_up.append(&format!(
            "URL: {} - gave up after {} attempts ({})",
            url, attempts, last_reason
        ));
    }

    /// Records the fields a record was emitted without
    pub fn record_missing_fields(&self, url: &str, fields: &BTreeSet<String>) {
        if fields.is_empty() {
            return;
        }

        let joined = fields.iter().map(String::as_str).collect::<Vec<_>>().join(", ");
        self.missing_fields
            .append(&format!("URL: {} - Missing: {}", url, joined));
    }
}

//! Checkpoint state for resumable runs
//!
//! The state is serialized as JSON and handed to a [`CheckpointStore`] as a
//! whole. Field aliases accept checkpoints written by the older designer
//! scraper (`current_designer_index`, `processed_perfumes`, ...).

use crate::storage::traits::{CheckpointStore, StorageResult};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Records extracted for one group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupRecord<R> {
    #[serde(alias = "brand", alias = "subreddit")]
    pub group: String,

    #[serde(default = "Vec::new", alias = "perfumes", alias = "posts")]
    pub records: Vec<R>,
}

/// Resumable progress of a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(serialize = "R: Serialize", deserialize = "R: DeserializeOwned"))]
pub struct CheckpointState<R> {
    /// Index of the next group to process
    #[serde(default, alias = "current_designer_index")]
    pub current_group_index: usize,

    /// Key of the group at `current_group_index` when the state was saved
    #[serde(default, alias = "current_designer_url")]
    pub current_group_key: Option<String>,

    /// Every leaf URL attempted so far, successful or not
    #[serde(default, alias = "processed_perfumes")]
    pub processed: BTreeSet<String>,

    /// Records accumulated so far, grouped in processing order
    #[serde(default = "Vec::new", alias = "all_brands_data")]
    pub accumulated: Vec<GroupRecord<R>>,

    /// Hash of the configuration that produced this state
    #[serde(default)]
    pub config_hash: Option<String>,

    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,

    /// Set once every group has been processed
    #[serde(default)]
    pub completed: bool,
}

impl<R> Default for CheckpointState<R> {
    fn default() -> Self {
        Self {
            current_group_index: 0,
            current_group_key: None,
            processed: BTreeSet::new(),
            accumulated: Vec::new(),
            config_hash: None,
            updated_at: None,
            completed: false,
        }
    }
}

impl<R> CheckpointState<R> {
    /// Empty state bound to a configuration hash
    pub fn new(config_hash: impl Into<String>) -> Self {
        Self {
            config_hash: Some(config_hash.into()),
            ..Self::default()
        }
    }

    /// Appends records to the entry of `group`, creating it if needed
    pub fn push_records(&mut self, group: &str, records: Vec<R>) {
        match self.accumulated.iter_mut().find(|entry| entry.group == group) {
            Some(entry) => entry.records.extend(records),
            None => self.accumulated.push(GroupRecord {
                group: group.to_string(),
                records,
            }),
        }
    }

    /// Marks every URL of `urls` as processed
    pub fn mark_processed<I, S>(&mut self, urls: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.processed.extend(urls.into_iter().map(Into::into));
    }

    /// Total number of accumulated records
    pub fn record_count(&self) -> usize {
        self.accumulated.iter().map(|entry| entry.records.len()).sum()
    }

    pub fn touch(&mut self) {
        self.updated_at = Some(Utc::now());
    }
}

/// Loads and decodes the stored state, if any
pub fn load_state<R: DeserializeOwned>(
    store: &dyn CheckpointStore,
) -> StorageResult<Option<CheckpointState<R>>> {
    match store.load()? {
        Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
        None => Ok(None),
    }
}

/// Encodes and stores `state`, replacing the previous one
pub fn save_state<R: Serialize>(
    store: &mut dyn CheckpointStore,
    state: &CheckpointState<R>,
) -> StorageResult<()> {
    let raw = serde_json::to_string_pretty(state)?;
    store.save(&raw)
}

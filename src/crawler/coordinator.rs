//! Pipeline coordinator - main harvest orchestration logic
//!
//! This module contains the outer loop that coordinates the whole run:
//! - Loading the checkpoint and resuming at the saved group index
//! - Discovering each group's child links
//! - Running batches through the scheduler
//! - Checkpointing and rewriting the artifact after every batch
//! - Stopping cleanly at a batch boundary when cancelled
//!
//! The coordinator is the only writer of the checkpoint and the artifact.

use crate::config::SchedulerConfig;
use crate::crawler::discovery::{discover_group, DiscoveryError, DiscoveryPacing, LinkDiscoverer};
use crate::crawler::fetcher::Fetcher;
use crate::crawler::scheduler::{partition, BatchScheduler};
use crate::extract::{Extractor, Record};
use crate::ledger::Ledgers;
use crate::output::OutputSink;
use crate::seeds::GroupSeed;
use crate::state::{GroupState, GroupTracker};
use crate::storage::{load_state, save_state, CheckpointState, CheckpointStore};
use crate::HarvestError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Run-level cancellation signal
///
/// Checked before every batch; a batch already running completes first.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Counters for one invocation of [`Coordinator::run`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub groups_completed: usize,
    pub groups_failed: usize,
    pub batches: usize,
    pub urls_attempted: usize,
    pub records_emitted: usize,
    pub fetch_failures: usize,
    /// True when the run stopped early on cancellation
    pub interrupted: bool,
}

/// Drives groups through discovery, batching and checkpointing
pub struct Coordinator<D: LinkDiscoverer, E: Extractor> {
    discoverer: D,
    scheduler: BatchScheduler<E>,
    pacing: DiscoveryPacing,
    store: Box<dyn CheckpointStore + Send>,
    sink: Box<dyn OutputSink<E::Record> + Send>,
    ledgers: Arc<Ledgers>,
    config_hash: String,
    cancel: CancelFlag,
}

impl<D: LinkDiscoverer, E: Extractor> Coordinator<D, E> {
    /// Creates a coordinator
    ///
    /// # Arguments
    ///
    /// * `fetcher` - Shared fetcher for listing pages and leaf pages
    /// * `discoverer` - Where groups list their children
    /// * `extractor` - Maps leaf pages to records
    /// * `config` - Batch size, concurrency and pacing
    /// * `store` - Checkpoint backend
    /// * `sink` - Output artifact
    /// * `ledgers` - Ledgers for missing-field lines
    pub fn new(
        fetcher: Fetcher,
        discoverer: D,
        extractor: E,
        config: &SchedulerConfig,
        store: Box<dyn CheckpointStore + Send>,
        sink: Box<dyn OutputSink<E::Record> + Send>,
        ledgers: Arc<Ledgers>,
    ) -> Self {
        Self {
            discoverer,
            scheduler: BatchScheduler::new(fetcher, Arc::new(extractor), config),
            pacing: DiscoveryPacing::from_config(config),
            store,
            sink,
            ledgers,
            config_hash: String::new(),
            cancel: CancelFlag::new(),
        }
    }

    /// Hash of the configuration, stored in every checkpoint
    pub fn with_config_hash(mut self, hash: impl Into<String>) -> Self {
        self.config_hash = hash.into();
        self
    }

    pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// Processes every group, resuming from the stored checkpoint
    ///
    /// Returns `Err` only for unhandled faults and storage failures; the
    /// checkpoint is saved before the error is returned. Fetch failures and
    /// undiscoverable groups are logged and skipped.
    pub async fn run(&mut self, groups: &[GroupSeed]) -> Result<RunSummary, HarvestError> {
        let start_time = Instant::now();
        let mut state = self.load_or_start(groups)?;
        let mut summary = RunSummary::default();

        let start_index = state.current_group_index;
        if start_index >= groups.len() {
            tracing::info!(
                "All {} groups already processed, nothing to fetch",
                groups.len()
            );
        } else if start_index > 0 {
            tracing::info!(
                "Resuming at group {}/{} ({})",
                start_index + 1,
                groups.len(),
                groups[start_index].group
            );
        }

        for (index, group) in groups.iter().enumerate().skip(start_index) {
            if self.cancel.is_cancelled() {
                summary.interrupted = true;
                break;
            }

            tracing::info!(
                "Processing group {}/{}: {}",
                index + 1,
                groups.len(),
                group.group
            );

            state.current_group_index = index;
            state.current_group_key = Some(group.group.clone());
            state.completed = false;

            let done = self
                .process_group(group, &mut state, &mut summary)
                .await?;
            if !done {
                summary.interrupted = true;
                break;
            }

            state.current_group_index = index + 1;
            state.current_group_key = groups.get(index + 1).map(|g| g.group.clone());
            self.persist(&mut state)?;
        }

        if summary.interrupted {
            tracing::warn!(
                "Interrupted. Progress saved to {}; rerun to resume from group index {} ({})",
                self.store.describe(),
                state.current_group_index,
                state.current_group_key.as_deref().unwrap_or("-")
            );
            return Ok(summary);
        }

        state.completed = true;
        state.current_group_index = groups.len();
        state.current_group_key = None;
        self.persist(&mut state)?;

        tracing::info!(
            "Harvest complete: {} groups done, {} failed, {} records this run ({} total) in {:?}",
            summary.groups_completed,
            summary.groups_failed,
            summary.records_emitted,
            state.record_count(),
            start_time.elapsed()
        );

        Ok(summary)
    }

    /// Runs one group to completion
    ///
    /// Returns `Ok(false)` when cancellation stopped the group between batches.
    async fn process_group(
        &mut self,
        group: &GroupSeed,
        state: &mut CheckpointState<E::Record>,
        summary: &mut RunSummary,
    ) -> Result<bool, HarvestError> {
        let mut tracker = GroupTracker::new(&group.group);
        tracker.transition(GroupState::Discovering)?;

        let links = match discover_group(
            self.scheduler.fetcher(),
            &self.discoverer,
            group,
            &self.pacing,
        )
        .await
        {
            Ok(links) => links,
            Err(DiscoveryError::ListingUnavailable { url, reason }) => {
                tracker.transition(GroupState::Failed)?;
                tracing::error!(
                    "Could not discover group {} from {}: {}. Skipping group",
                    group.group,
                    url,
                    reason
                );
                summary.groups_failed += 1;
                return Ok(true);
            }
        };

        tracker.transition(GroupState::BatchingPending)?;

        let batches = partition(&links, &state.processed, self.scheduler.batch_size());
        let pending: usize = batches.iter().map(Vec::len).sum();
        if pending < links.len() {
            tracing::info!(
                "Skipping {} already processed links of {}",
                links.len() - pending,
                group.group
            );
        }

        for (batch_index, batch) in batches.iter().enumerate() {
            if self.cancel.is_cancelled() {
                tracing::info!(
                    "Cancellation requested, stopping before batch {}/{} of {}",
                    batch_index + 1,
                    batches.len(),
                    group.group
                );
                return Ok(false);
            }

            tracker.transition(GroupState::BatchRunning)?;
            tracing::info!(
                "Group {}: batch {}/{} ({} links)",
                group.group,
                batch_index + 1,
                batches.len(),
                batch.len()
            );

            let report = match self.scheduler.run_batch(&group.group, batch).await {
                Ok(report) => report,
                Err(e) => {
                    tracing::error!("Unhandled fault in {}: {}. Saving checkpoint", group.group, e);
                    self.persist(state)?;
                    if let Err(transition) = tracker.transition(GroupState::Failed) {
                        tracing::warn!("Group {}: {}", group.group, transition);
                    }
                    return Err(e);
                }
            };

            summary.batches += 1;
            summary.urls_attempted += report.attempted.len();
            summary.fetch_failures += report.failures.len();
            summary.records_emitted += report.records.len();

            for record in &report.records {
                self.ledgers
                    .record_missing_fields(record.url(), record.missing_fields());
                if !record.identity_resolved() {
                    tracing::debug!("Identity fields unresolved for {}", record.url());
                }
            }

            state.mark_processed(report.attempted);
            state.push_records(&group.group, report.records);
            self.persist(state)?;

            tracing::info!(
                "Checkpoint saved: group {} batch {}/{}, {} URLs processed, {} records. Resume point: group index {}",
                group.group,
                batch_index + 1,
                batches.len(),
                state.processed.len(),
                state.record_count(),
                state.current_group_index
            );
        }

        // Groups with no records still appear in the artifact
        state.push_records(&group.group, Vec::new());
        tracker.transition(GroupState::GroupDone)?;
        summary.groups_completed += 1;

        Ok(true)
    }

    fn load_or_start(
        &mut self,
        groups: &[GroupSeed],
    ) -> Result<CheckpointState<E::Record>, HarvestError> {
        let Some(state) = load_state::<E::Record>(&*self.store)? else {
            tracing::info!("No checkpoint at {}, starting fresh", self.store.describe());
            return Ok(CheckpointState::new(self.config_hash.clone()));
        };

        match state.config_hash.as_deref() {
            Some(hash) if hash != self.config_hash => tracing::warn!(
                "Checkpoint was written with a different configuration ({} != {}); resuming anyway",
                hash,
                self.config_hash
            ),
            None => tracing::warn!("Checkpoint has no configuration hash; resuming anyway"),
            _ => {}
        }

        if let Some(key) = &state.current_group_key {
            let expected = groups.get(state.current_group_index).map(|g| g.group.as_str());
            if expected != Some(key.as_str()) {
                tracing::warn!(
                    "Checkpoint expected group {} at index {}, seed file has {}",
                    key,
                    state.current_group_index,
                    expected.unwrap_or("nothing")
                );
            }
        }

        tracing::info!(
            "Loaded checkpoint from {}: group index {}, {} URLs processed, {} records",
            self.store.describe(),
            state.current_group_index,
            state.processed.len(),
            state.record_count()
        );

        let mut state = state;
        state.config_hash = Some(self.config_hash.clone());
        Ok(state)
    }

    /// Saves the checkpoint, then rewrites the artifact from it
    fn persist(&mut self, state: &mut CheckpointState<E::Record>) -> Result<(), HarvestError> {
        state.touch();
        save_state(&mut *self.store, state)?;
        self.sink.write(&state.accumulated)?;
        Ok(())
    }
}

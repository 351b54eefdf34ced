//! Batch scheduler
//!
//! This module handles:
//! - Filtering already processed links and splitting the rest into batches
//! - Bounding in-flight fetches with a semaphore
//! - Staggering task launches with a random delay
//! - Collecting per-link outcomes in input order
//!
//! A failed link never aborts its batch. Only a task that dies (panics) is
//! escalated, as [`HarvestError::TaskFault`].

use crate::config::SchedulerConfig;
use crate::crawler::discovery::SeedLink;
use crate::crawler::fetcher::{FetchOutcome, Fetcher};
use crate::crawler::retry::random_delay;
use crate::extract::Extractor;
use crate::HarvestError;
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Outcome of one batch
#[derive(Debug, Clone)]
pub struct BatchReport<R> {
    /// Every URL of the batch, successful or not, in input order
    pub attempted: Vec<String>,

    /// Extracted records of successful fetches, in input order
    pub records: Vec<R>,

    /// `(url, reason)` of links whose fetch did not succeed
    pub failures: Vec<(String, String)>,
}

impl<R> BatchReport<R> {
    fn empty() -> Self {
        Self {
            attempted: Vec::new(),
            records: Vec::new(),
            failures: Vec::new(),
        }
    }
}

/// Per-link result sent back from a task
enum LinkResult<R> {
    Extracted(R),
    Failed(String),
}

/// Splits `links` into batches of at most `batch_size`, skipping processed URLs
///
/// Order is preserved; duplicates within `links` are kept only once.
pub fn partition(
    links: &[SeedLink],
    processed: &BTreeSet<String>,
    batch_size: usize,
) -> Vec<Vec<SeedLink>> {
    let mut seen = HashSet::new();
    let pending: Vec<SeedLink> = links
        .iter()
        .filter(|link| !processed.contains(&link.url))
        .filter(|link| seen.insert(link.url.as_str()))
        .cloned()
        .collect();

    pending
        .chunks(batch_size.max(1))
        .map(|chunk| chunk.to_vec())
        .collect()
}

/// Runs batches of fetch-and-extract tasks under a concurrency bound
pub struct BatchScheduler<E: Extractor> {
    fetcher: Fetcher,
    extractor: Arc<E>,
    semaphore: Arc<Semaphore>,
    launch_delay_min: Duration,
    launch_delay_max: Duration,
    batch_size: usize,
}

impl<E: Extractor> BatchScheduler<E> {
    /// Creates a scheduler from configuration
    pub fn new(fetcher: Fetcher, extractor: Arc<E>, config: &SchedulerConfig) -> Self {
        let concurrency = config.concurrency.max(1);
        tracing::debug!(
            "Batch scheduler: batch size {}, concurrency {}",
            config.batch_size,
            concurrency
        );

        Self {
            fetcher,
            extractor,
            semaphore: Arc::new(Semaphore::new(concurrency)),
            launch_delay_min: Duration::from_millis(config.launch_delay_min_ms),
            launch_delay_max: Duration::from_millis(config.launch_delay_max_ms),
            batch_size: config.batch_size.max(1),
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn fetcher(&self) -> &Fetcher {
        &self.fetcher
    }

    /// Fetches and extracts every link of one batch
    ///
    /// Returns once every task has finished. At most `concurrency` fetches
    /// are in flight at any moment.
    pub async fn run_batch(
        &self,
        group_key: &str,
        batch: &[SeedLink],
    ) -> Result<BatchReport<E::Record>, HarvestError> {
        if batch.is_empty() {
            return Ok(BatchReport::empty());
        }

        let mut tasks = JoinSet::new();

        for (index, link) in batch.iter().enumerate() {
            let permit = match Arc::clone(&self.semaphore).acquire_owned().await {
                Ok(permit) => permit,
                Err(e) => {
                    return Err(HarvestError::TaskFault {
                        group: group_key.to_string(),
                        message: format!("scheduler closed: {}", e),
                    })
                }
            };

            tokio::time::sleep(random_delay(self.launch_delay_min, self.launch_delay_max)).await;

            let fetcher = self.fetcher.clone();
            let extractor = Arc::clone(&self.extractor);
            let url = link.url.clone();

            tasks.spawn(async move {
                let _permit = permit;
                let result = match fetcher.fetch(&url).await {
                    FetchOutcome::Success { body, .. } => {
                        LinkResult::Extracted(extractor.extract(&body, &url))
                    }
                    other => LinkResult::Failed(other.reason()),
                };
                (index, result)
            });
        }

        let mut slots: Vec<Option<LinkResult<E::Record>>> =
            std::iter::repeat_with(|| None).take(batch.len()).collect();

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, result)) => slots[index] = Some(result),
                Err(e) => {
                    tasks.abort_all();
                    return Err(HarvestError::TaskFault {
                        group: group_key.to_string(),
                        message: e.to_string(),
                    });
                }
            }
        }

        let mut report = BatchReport::empty();
        for (link, slot) in batch.iter().zip(slots) {
            report.attempted.push(link.url.clone());
            match slot {
                Some(LinkResult::Extracted(record)) => report.records.push(record),
                Some(LinkResult::Failed(reason)) => report.failures.push((link.url.clone(), reason)),
                None => report
                    .failures
                    .push((link.url.clone(), "task produced no result".to_string())),
            }
        }

        tracing::debug!(
            "Batch for {}: {} attempted, {} extracted, {} failed",
            group_key,
            report.attempted.len(),
            report.records.len(),
            report.failures.len()
        );

        Ok(report)
    }
}

//! Statistics generated from a checkpoint
//!
//! This module summarizes a stored checkpoint for the `--stats` mode
//! without fetching anything.

use crate::extract::Record;
use crate::storage::CheckpointState;
use std::collections::BTreeMap;

/// Run statistics summary
#[derive(Debug, Clone, Default)]
pub struct RunStatistics {
    /// Index of the next group to process
    pub current_group_index: usize,

    /// Key of the group at that index, if recorded
    pub current_group_key: Option<String>,

    /// Whether every group has been processed
    pub completed: bool,

    /// Number of leaf URLs attempted
    pub processed_urls: usize,

    /// Number of records emitted
    pub records: usize,

    /// Records whose identity fields could not be resolved
    pub unresolved_identity: usize,

    /// Record count per group, in processing order
    pub records_by_group: Vec<(String, usize)>,

    /// How often each field was missing across all records
    pub missing_field_counts: BTreeMap<String, usize>,

    pub config_hash: Option<String>,

    pub updated_at: Option<String>,
}

/// Computes statistics from a checkpoint state
pub fn compute_statistics<R: Record>(state: &CheckpointState<R>) -> RunStatistics {
    let mut stats = RunStatistics {
        current_group_index: state.current_group_index,
        current_group_key: state.current_group_key.clone(),
        completed: state.completed,
        processed_urls: state.processed.len(),
        config_hash: state.config_hash.clone(),
        updated_at: state.updated_at.map(|t| t.to_rfc3339()),
        ..RunStatistics::default()
    };

    for entry in &state.accumulated {
        stats
            .records_by_group
            .push((entry.group.clone(), entry.records.len()));

        for record in &entry.records {
            stats.records += 1;
            if !record.identity_resolved() {
                stats.unresolved_identity += 1;
            }
            for field in record.missing_fields() {
                *stats.missing_field_counts.entry(field.clone()).or_insert(0) += 1;
            }
        }
    }

    stats
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &RunStatistics) {
    println!("=== Harvest Statistics ===\n");

    println!("Progress:");
    println!(
        "  Status: {}",
        if stats.completed { "completed" } else { "in progress" }
    );
    println!("  Next group index: {}", stats.current_group_index);
    if let Some(key) = &stats.current_group_key {
        println!("  Current group: {}", key);
    }
    if let Some(updated) = &stats.updated_at {
        println!("  Last checkpoint: {}", updated);
    }
    println!();

    println!("Totals:");
    println!("  URLs attempted: {}", stats.processed_urls);
    println!("  Records emitted: {}", stats.records);
    println!("  Records with unresolved identity: {}", stats.unresolved_identity);
    println!();

    if !stats.records_by_group.is_empty() {
        println!("Records by Group ({}):", stats.records_by_group.len());
        for (group, count) in &stats.records_by_group {
            println!("  {}: {}", group, count);
        }
        println!();
    }

    if !stats.missing_field_counts.is_empty() {
        println!("Missing Fields:");
        let mut counts: Vec<_> = stats.missing_field_counts.iter().collect();
        counts.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));

        for (field, count) in counts {
            let percentage = if stats.records > 0 {
                (*count as f64 / stats.records as f64) * 100.0
            } else {
                0.0
            };
            println!("  {}: {} ({:.1}%)", field, count, percentage);
        }
        println!();
    }

    let success_rate = if stats.processed_urls > 0 {
        (stats.records as f64 / stats.processed_urls as f64) * 100.0
    } else {
        0.0
    };

    println!(
        "Success Rate: {:.1}% ({} / {} URLs produced a record)",
        success_rate, stats.records, stats.processed_urls
    );
}

use anyhow::Result;
use devpulse_common::types::{CollaborationMetrics, RecordBatch, ScanWindow};
use std::collections::HashSet;

/// Derive contribution-spread metrics over the scan window.
pub fn compute(batch: &RecordBatch, window: &ScanWindow) -> Result<CollaborationMetrics> {
    let committers: HashSet<&str> = batch.commits.iter().map(|c| c.author.as_str()).collect();

    // Weeks round up so a 30-day window counts as 5 weeks, not 4.28.
    let weeks = (window.days() + 6) / 7;
    let commits_per_week = if weeks > 0 {
        Some(batch.commits.len() as f64 / weeks as f64)
    } else {
        None
    };

    Ok(CollaborationMetrics {
        distinct_committers: committers.len() as u32,
        commits_per_week,
        ownership_file: batch
            .repo_settings
            .as_ref()
            .map(|s| s.ownership_file_present),
    })
}

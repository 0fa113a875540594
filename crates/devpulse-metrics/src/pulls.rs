use anyhow::{bail, Result};
use chrono::Duration;
use devpulse_common::types::{PullMetrics, PullRequestState, RecordBatch, ScanWindow};

/// Days without an update after which an open PR counts as stale.
const STALE_AFTER_DAYS: i64 = 7;

/// Derive pull-request flow metrics from the window's PRs.
pub fn compute(batch: &RecordBatch, window: &ScanWindow) -> Result<PullMetrics> {
    let prs = &batch.pull_requests;

    let mut open_count = 0u32;
    let mut merged_count = 0u32;
    let mut closed_count = 0u32;
    let mut merge_hours_sum = 0.0f64;
    let mut stale_open = 0u32;

    let stale_cutoff = window.end - Duration::days(STALE_AFTER_DAYS);

    for pr in prs {
        match pr.state {
            PullRequestState::Open => {
                open_count += 1;
                if pr.updated_at < stale_cutoff {
                    stale_open += 1;
                }
            }
            PullRequestState::Merged => {
                merged_count += 1;
                let Some(merged_at) = pr.merged_at else {
                    bail!("merged PR #{} has no merged_at timestamp", pr.number);
                };
                merge_hours_sum += (merged_at - pr.created_at).num_seconds() as f64 / 3600.0;
            }
            PullRequestState::Closed => closed_count += 1,
        }
    }

    let total = prs.len();
    let reviewed = prs.iter().filter(|pr| pr.review_count > 0).count();

    // No PRs means nothing went in unreviewed.
    let review_coverage_percent = if total == 0 {
        100.0
    } else {
        reviewed as f64 / total as f64 * 100.0
    };

    let avg_merge_hours = if merged_count > 0 {
        Some(merge_hours_sum / f64::from(merged_count))
    } else {
        None
    };

    let stale_ratio = if open_count > 0 {
        Some(f64::from(stale_open) / f64::from(open_count))
    } else {
        None
    };

    let avg_size_lines = if total > 0 {
        let lines: u64 = prs.iter().map(|pr| pr.additions + pr.deletions).sum();
        Some(lines as f64 / total as f64)
    } else {
        None
    };

    Ok(PullMetrics {
        open_count,
        merged_count,
        closed_count,
        avg_merge_hours,
        review_coverage_percent,
        stale_ratio,
        avg_size_lines,
    })
}

use anyhow::{bail, Result};
use devpulse_common::types::{RecordBatch, SprintIssueStatus, SprintMetrics};

/// Derive sprint delivery metrics from the sprint's issue list.
///
/// Completion is measured in story points when any issue carries an
/// estimate, falling back to issue counts for unestimated sprints. An
/// empty sprint reports 100% completion (nothing is left undone).
pub fn compute(batch: &RecordBatch) -> Result<SprintMetrics> {
    let issues = &batch.sprint_issues;
    let total_issues = issues.len() as u32;

    let completed: Vec<_> = issues
        .iter()
        .filter(|i| i.status == SprintIssueStatus::Done)
        .collect();
    let completed_issues = completed.len() as u32;

    let estimated_total: f64 = issues.iter().filter_map(|i| i.story_points).sum();
    let completion_percent = if total_issues == 0 {
        100.0
    } else if estimated_total > 0.0 {
        let estimated_done: f64 = completed.iter().filter_map(|i| i.story_points).sum();
        estimated_done / estimated_total * 100.0
    } else {
        f64::from(completed_issues) / f64::from(total_issues) * 100.0
    };

    let scope_added_percent = if total_issues == 0 {
        0.0
    } else {
        let added = issues.iter().filter(|i| i.added_after_start).count();
        added as f64 / f64::from(total_issues) * 100.0
    };

    let mut cycle_days_sum = 0.0f64;
    let mut cycle_samples = 0u32;
    for issue in &completed {
        let (Some(started_at), Some(completed_at)) = (issue.started_at, issue.completed_at) else {
            continue;
        };
        if completed_at < started_at {
            bail!("issue {} completed before it started", issue.key);
        }
        cycle_days_sum += (completed_at - started_at).num_seconds() as f64 / 86400.0;
        cycle_samples += 1;
    }
    let avg_cycle_time_days = if cycle_samples > 0 {
        Some(cycle_days_sum / f64::from(cycle_samples))
    } else {
        None
    };

    Ok(SprintMetrics {
        total_issues,
        completed_issues,
        completion_percent,
        scope_added_percent,
        avg_cycle_time_days,
    })
}

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use devpulse_common::types::{HealthMetrics, RecordBatch};

/// Horizon for the direct-push count; fixed by the metric definition,
/// independent of the scan window.
const DIRECT_PUSH_DAYS: i64 = 30;

/// Derive branch policy and dependency drift metrics.
pub fn compute(batch: &RecordBatch, now: DateTime<Utc>) -> Result<HealthMetrics> {
    let push_cutoff = now - Duration::days(DIRECT_PUSH_DAYS);
    let direct_default_pushes_30d = batch
        .commits
        .iter()
        .filter(|c| c.to_default_branch && !c.via_pull_request && c.committed_at >= push_cutoff)
        .count() as u32;

    let mut major_drift_count = 0u32;
    let mut outdated_count = 0u32;
    for dep in &batch.dependencies {
        if dep.majors_behind > 1 {
            major_drift_count += 1;
        } else if dep.outdated {
            outdated_count += 1;
        }
    }

    Ok(HealthMetrics {
        branch_protection: batch
            .repo_settings
            .as_ref()
            .map(|s| s.branch_protection_enabled),
        direct_default_pushes_30d,
        major_drift_count,
        outdated_count,
    })
}

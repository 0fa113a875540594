use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use devpulse_common::types::{RecordBatch, ScanStatus, SecurityMetrics, VulnerabilitySeverity};

/// Derive vulnerability exposure and scan recency.
pub fn compute(batch: &RecordBatch, now: DateTime<Utc>) -> Result<SecurityMetrics> {
    let mut open_critical_high = 0u32;
    let mut open_medium = 0u32;
    let mut open_low = 0u32;

    for vuln in batch.vulnerabilities.iter().filter(|v| v.open) {
        match vuln.severity {
            VulnerabilitySeverity::Critical | VulnerabilitySeverity::High => {
                open_critical_high += 1
            }
            VulnerabilitySeverity::Medium => open_medium += 1,
            VulnerabilitySeverity::Low => open_low += 1,
        }
    }

    let mut latest_completed: Option<DateTime<Utc>> = None;
    for scan in &batch.security_scans {
        if scan.status != ScanStatus::Completed {
            continue;
        }
        let Some(completed_at) = scan.completed_at else {
            bail!("completed scan {} has no completion timestamp", scan.id);
        };
        if latest_completed.map_or(true, |latest| completed_at > latest) {
            latest_completed = Some(completed_at);
        }
    }

    Ok(SecurityMetrics {
        open_critical_high,
        open_medium,
        open_low,
        days_since_last_scan: latest_completed.map(|ts| (now - ts).num_days()),
    })
}

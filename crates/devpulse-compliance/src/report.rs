use crate::evaluator::evaluate;
use chrono::{DateTime, Utc};
use devpulse_common::types::{
    Benchmark, ComplianceReport, ComplianceResult, ComplianceStatus, MetricsSnapshot,
};
use std::collections::HashMap;

/// Build the compliance report for one snapshot against the active
/// benchmark set.
///
/// Every metric the snapshot exposes is evaluated; metrics without a
/// covering benchmark fail. The report carries the rounded mean of all
/// per-metric scores and the worst status present.
pub fn build_report(
    snapshot: &MetricsSnapshot,
    benchmarks: &[Benchmark],
    now: DateTime<Utc>,
) -> ComplianceReport {
    let by_metric: HashMap<&str, &Benchmark> =
        benchmarks.iter().map(|b| (b.metric.as_str(), b)).collect();

    let mut results = Vec::new();
    let mut recommendations = Vec::new();

    for (metric, value) in snapshot.metrics.metric_values() {
        let benchmark = by_metric.get(metric).copied();
        let verdict = evaluate(value, benchmark);

        if verdict.status != ComplianceStatus::Pass {
            recommendations.push(recommendation_for(metric, benchmark));
        }

        results.push(ComplianceResult {
            metric: metric.to_string(),
            status: verdict.status,
            score: verdict.score,
            observed: value.map(|v| v.as_f64()),
            benchmark_id: benchmark.map(|b| b.id.clone()),
        });
    }

    let overall_score = if results.is_empty() {
        0
    } else {
        let sum: f64 = results.iter().map(|r| f64::from(r.score)).sum();
        (sum / results.len() as f64).round() as u8
    };
    let overall_status = results
        .iter()
        .map(|r| r.status)
        .max()
        .unwrap_or(ComplianceStatus::Fail);

    ComplianceReport {
        id: devpulse_common::id::next_id(),
        entity_id: snapshot.entity_id.clone(),
        report_date: snapshot.snapshot_date,
        overall_score,
        overall_status,
        results,
        recommendations,
        created_at: now,
        updated_at: now,
    }
}

/// Heuristic advice for one non-passing metric. Free text, not
/// contract-critical.
fn recommendation_for(metric: &str, benchmark: Option<&Benchmark>) -> String {
    let Some(benchmark) = benchmark else {
        return format!("No active benchmark defines targets for {metric}");
    };

    match metric {
        "pulls.avg_merge_hours" => match benchmark.pass_threshold {
            Some(p) => format!("Reduce time to merge below {p:.0} hours"),
            None => "Reduce time to merge".to_string(),
        },
        "pulls.review_coverage_percent" => match benchmark.pass_threshold {
            Some(p) => format!("Increase review coverage to at least {p:.0}%"),
            None => "Increase review coverage".to_string(),
        },
        "pulls.stale_ratio" => "Reduce stale PR ratio below target".to_string(),
        "pulls.avg_size_lines" => "Split large pull requests into smaller changes".to_string(),
        "security.open_critical_high" => "Fix open critical/high vulnerabilities".to_string(),
        "security.open_medium" => "Burn down open medium-severity vulnerabilities".to_string(),
        "security.open_low" => "Schedule cleanup of low-severity findings".to_string(),
        "security.days_since_last_scan" => {
            "Run a security scan; the last completed scan is too old".to_string()
        }
        "repo.branch_protection" => "Enable branch protection on the default branch".to_string(),
        "repo.direct_default_pushes_30d" => {
            "Route changes through pull requests instead of direct pushes".to_string()
        }
        "deps.major_drift_count" => {
            "Upgrade dependencies that are more than one major version behind".to_string()
        }
        "deps.outdated_count" => "Update outdated dependencies".to_string(),
        "collab.distinct_committers" => "Spread work across more contributors".to_string(),
        "collab.commits_per_week" => "Commit cadence is outside the healthy band".to_string(),
        "collab.ownership_file" => "Add a code ownership file to route reviews".to_string(),
        "sprint.completion_percent" => {
            "Sprint completion is below target; reduce committed scope".to_string()
        }
        "sprint.scope_added_percent" => "Limit scope added after sprint start".to_string(),
        "sprint.avg_cycle_time_days" => {
            "Reduce issue cycle time; break work into smaller slices".to_string()
        }
        other => format!("Review metric {other} against its benchmark"),
    }
}

use chrono::Utc;
use devpulse_common::types::{Benchmark, BenchmarkOp};
use devpulse_store::SnapshotStore;

use crate::config::BenchmarksSeedFile;

/// Default benchmark definitions for first-time startup.
struct BenchmarkDef {
    metric: &'static str,
    operator: BenchmarkOp,
    pass: Option<f64>,
    warn: Option<f64>,
    fail: Option<f64>,
    unit: Option<&'static str>,
    category: &'static str,
}

const DEFAULT_BENCHMARKS: &[BenchmarkDef] = &[
    // ---- Pull requests ----
    BenchmarkDef {
        metric: "pulls.avg_merge_hours",
        operator: BenchmarkOp::Lte,
        pass: Some(24.0),
        warn: Some(48.0),
        fail: None,
        unit: Some("hours"),
        category: "pulls",
    },
    BenchmarkDef {
        metric: "pulls.review_coverage_percent",
        operator: BenchmarkOp::Gte,
        pass: Some(90.0),
        warn: Some(75.0),
        fail: None,
        unit: Some("%"),
        category: "pulls",
    },
    BenchmarkDef {
        metric: "pulls.stale_ratio",
        operator: BenchmarkOp::Lte,
        pass: Some(0.1),
        warn: Some(0.25),
        fail: None,
        unit: Some("ratio"),
        category: "pulls",
    },
    BenchmarkDef {
        metric: "pulls.avg_size_lines",
        operator: BenchmarkOp::Lte,
        pass: Some(400.0),
        warn: Some(800.0),
        fail: None,
        unit: Some("lines"),
        category: "pulls",
    },
    // ---- Security ----
    BenchmarkDef {
        metric: "security.open_critical_high",
        operator: BenchmarkOp::Eq,
        pass: Some(0.0),
        warn: None,
        fail: None,
        unit: Some("count"),
        category: "security",
    },
    BenchmarkDef {
        metric: "security.open_medium",
        operator: BenchmarkOp::Lte,
        pass: Some(5.0),
        warn: Some(10.0),
        fail: None,
        unit: Some("count"),
        category: "security",
    },
    BenchmarkDef {
        metric: "security.open_low",
        operator: BenchmarkOp::Lte,
        pass: Some(20.0),
        warn: Some(40.0),
        fail: None,
        unit: Some("count"),
        category: "security",
    },
    BenchmarkDef {
        metric: "security.days_since_last_scan",
        operator: BenchmarkOp::Lte,
        pass: Some(7.0),
        warn: Some(14.0),
        fail: None,
        unit: Some("days"),
        category: "security",
    },
    // ---- Repository health ----
    BenchmarkDef {
        metric: "repo.branch_protection",
        operator: BenchmarkOp::Eq,
        pass: Some(100.0),
        warn: None,
        fail: None,
        unit: None,
        category: "repo",
    },
    BenchmarkDef {
        metric: "repo.direct_default_pushes_30d",
        operator: BenchmarkOp::Lte,
        pass: Some(0.0),
        warn: Some(5.0),
        fail: None,
        unit: Some("count"),
        category: "repo",
    },
    BenchmarkDef {
        metric: "deps.major_drift_count",
        operator: BenchmarkOp::Lte,
        pass: Some(0.0),
        warn: Some(2.0),
        fail: None,
        unit: Some("count"),
        category: "deps",
    },
    BenchmarkDef {
        metric: "deps.outdated_count",
        operator: BenchmarkOp::Lte,
        pass: Some(5.0),
        warn: Some(15.0),
        fail: None,
        unit: Some("count"),
        category: "deps",
    },
    // ---- Collaboration ----
    BenchmarkDef {
        metric: "collab.distinct_committers",
        operator: BenchmarkOp::Gte,
        pass: Some(3.0),
        warn: Some(2.0),
        fail: None,
        unit: Some("count"),
        category: "collab",
    },
    BenchmarkDef {
        metric: "collab.commits_per_week",
        operator: BenchmarkOp::Gte,
        pass: Some(5.0),
        warn: Some(2.0),
        fail: None,
        unit: Some("count"),
        category: "collab",
    },
    BenchmarkDef {
        metric: "collab.ownership_file",
        operator: BenchmarkOp::Eq,
        pass: Some(100.0),
        warn: None,
        fail: None,
        unit: None,
        category: "collab",
    },
    // ---- Sprint ----
    BenchmarkDef {
        metric: "sprint.completion_percent",
        operator: BenchmarkOp::Gte,
        pass: Some(80.0),
        warn: Some(60.0),
        fail: None,
        unit: Some("%"),
        category: "sprint",
    },
    BenchmarkDef {
        metric: "sprint.scope_added_percent",
        operator: BenchmarkOp::Lte,
        pass: Some(10.0),
        warn: Some(25.0),
        fail: None,
        unit: Some("%"),
        category: "sprint",
    },
    BenchmarkDef {
        metric: "sprint.avg_cycle_time_days",
        operator: BenchmarkOp::Lte,
        pass: Some(4.0),
        warn: Some(7.0),
        fail: None,
        unit: Some("days"),
        category: "sprint",
    },
];

/// Initialize default benchmarks if the database has none yet.
///
/// Only seeds when `count_benchmarks() == 0` so operator-tuned thresholds
/// survive restarts.
pub fn init_default_benchmarks(store: &dyn SnapshotStore) -> anyhow::Result<usize> {
    let count = store.count_benchmarks()?;
    if count > 0 {
        tracing::debug!(
            existing = count,
            "Benchmarks already exist, skipping seed initialization"
        );
        return Ok(0);
    }

    let now = Utc::now();
    let mut inserted = 0usize;

    for def in DEFAULT_BENCHMARKS {
        let row = Benchmark {
            id: devpulse_common::id::next_id(),
            metric: def.metric.to_string(),
            operator: def.operator,
            pass_threshold: def.pass,
            warn_threshold: def.warn,
            fail_threshold: def.fail,
            unit: def.unit.map(|u| u.to_string()),
            category: def.category.to_string(),
            created_at: now,
            updated_at: now,
        };
        match store.upsert_benchmark(&row) {
            Ok(()) => {
                inserted += 1;
                tracing::info!(metric = %def.metric, operator = %def.operator, "Seeded benchmark");
            }
            Err(e) => {
                tracing::warn!(metric = %def.metric, error = %e, "Failed to seed benchmark");
            }
        }
    }

    tracing::info!(
        inserted,
        total = DEFAULT_BENCHMARKS.len(),
        "Default benchmarks initialized"
    );
    Ok(inserted)
}

/// Import benchmarks from a JSON seed file, updating rows whose metric key
/// already exists. Rows with an operator this build does not know are
/// skipped.
pub fn init_from_seed_file(store: &dyn SnapshotStore, seed_path: &str) -> anyhow::Result<usize> {
    let content = std::fs::read_to_string(seed_path)
        .map_err(|e| anyhow::anyhow!("Failed to read seed file '{}': {}", seed_path, e))?;
    let seed: BenchmarksSeedFile = serde_json::from_str(&content)
        .map_err(|e| anyhow::anyhow!("Failed to parse seed file '{}': {}", seed_path, e))?;

    let now = Utc::now();
    let mut applied = 0usize;

    for sb in &seed.benchmarks {
        let operator = match sb.operator.parse::<BenchmarkOp>() {
            Ok(op) => op,
            Err(e) => {
                tracing::warn!(metric = %sb.metric, error = %e, "Skipping seed benchmark");
                continue;
            }
        };
        let category = sb.category.clone().unwrap_or_else(|| {
            sb.metric.split('.').next().unwrap_or("general").to_string()
        });
        let row = Benchmark {
            id: devpulse_common::id::next_id(),
            metric: sb.metric.clone(),
            operator,
            pass_threshold: sb.pass_threshold,
            warn_threshold: sb.warn_threshold,
            fail_threshold: sb.fail_threshold,
            unit: sb.unit.clone(),
            category,
            created_at: now,
            updated_at: now,
        };
        match store.upsert_benchmark(&row) {
            Ok(()) => {
                applied += 1;
                tracing::info!(metric = %sb.metric, operator = %row.operator, "Applied seed benchmark");
            }
            Err(e) => {
                tracing::error!(metric = %sb.metric, error = %e, "Failed to apply seed benchmark");
            }
        }
    }

    tracing::info!(
        applied,
        total = seed.benchmarks.len(),
        "init-benchmarks completed"
    );
    Ok(applied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use devpulse_common::types::SnapshotMetrics;
    use std::collections::HashSet;

    #[test]
    fn defaults_cover_every_benchmarkable_metric() {
        let full = SnapshotMetrics {
            pulls: Some(Default::default()),
            security: Some(Default::default()),
            health: Some(Default::default()),
            collaboration: Some(Default::default()),
            sprint: Some(Default::default()),
        };
        let metric_keys: HashSet<&str> =
            full.metric_values().iter().map(|(key, _)| *key).collect();
        let seeded: HashSet<&str> = DEFAULT_BENCHMARKS.iter().map(|d| d.metric).collect();

        assert_eq!(seeded, metric_keys);
        assert_eq!(DEFAULT_BENCHMARKS.len(), metric_keys.len());
    }

    #[test]
    fn defaults_give_eq_benchmarks_no_warn_tier() {
        for def in DEFAULT_BENCHMARKS {
            if def.operator == BenchmarkOp::Eq {
                assert!(def.warn.is_none(), "{} should have no warn tier", def.metric);
                assert!(def.pass.is_some(), "{} needs a pass threshold", def.metric);
            }
        }
    }
}

use chrono::{DateTime, Utc};
use devpulse_common::types::{
    EntityKind, MetricsSnapshot, RecordBatch, ScanWindow, SnapshotMetrics, TrackedEntity,
};

use crate::{collaboration, health, pulls, security, sprint};

/// Assembles the metric groups an entity kind produces into one snapshot.
#[derive(Debug, Default)]
pub struct MetricsCalculator;

impl MetricsCalculator {
    pub fn new() -> Self {
        MetricsCalculator
    }

    /// Compute the dated snapshot for `entity` from one fetched batch.
    ///
    /// Repositories produce the pulls/security/health/collaboration groups,
    /// sprints the sprint group; the other groups stay `None`. A failing
    /// group is logged and replaced with its default so one bad record
    /// list never voids the rest of the snapshot.
    pub fn compute(
        &self,
        entity: &TrackedEntity,
        batch: &RecordBatch,
        window: &ScanWindow,
        now: DateTime<Utc>,
    ) -> MetricsSnapshot {
        let key = entity.natural_key.as_str();
        let metrics = match entity.kind {
            EntityKind::Repository => SnapshotMetrics {
                pulls: Some(or_default(key, "pulls", pulls::compute(batch, window))),
                security: Some(or_default(key, "security", security::compute(batch, now))),
                health: Some(or_default(key, "health", health::compute(batch, now))),
                collaboration: Some(or_default(
                    key,
                    "collaboration",
                    collaboration::compute(batch, window),
                )),
                sprint: None,
            },
            EntityKind::Sprint => SnapshotMetrics {
                sprint: Some(or_default(key, "sprint", sprint::compute(batch))),
                ..Default::default()
            },
        };

        MetricsSnapshot {
            id: devpulse_common::id::next_id(),
            entity_id: entity.id.clone(),
            snapshot_date: now.date_naive(),
            metrics,
            created_at: now,
            updated_at: now,
        }
    }
}

fn or_default<T: Default>(entity: &str, group: &str, result: anyhow::Result<T>) -> T {
    match result {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(
                entity = %entity,
                group,
                error = %e,
                "Metric group computation failed, substituting defaults"
            );
            T::default()
        }
    }
}

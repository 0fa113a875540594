//! Persistence layer for tracked entities, metric snapshots, compliance
//! reports, and benchmarks.
//!
//! The default implementation ([`sqlite::SqliteStore`]) keeps everything in a
//! single WAL-mode SQLite database. Metric and report payloads are stored as
//! JSON columns so the schema stays stable while metric groups evolve.

pub mod sqlite;


use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use devpulse_common::types::{Benchmark, ComplianceReport, MetricsSnapshot, TrackedEntity};

/// Persistence backend for the refresh pipeline.
///
/// Implementations must be safe to share across threads (`Send + Sync`)
/// because the store is accessed from the background refresh loop and from
/// on-demand triggers concurrently.
pub trait SnapshotStore: Send + Sync {
    /// Inserts an entity, or updates its kind and display name when the
    /// natural key is already registered. Returns the stored row, keeping
    /// the original id, archived flag, and scan bookkeeping on conflict.
    fn upsert_entity(&self, entity: &TrackedEntity) -> Result<TrackedEntity>;

    /// Gets a single entity by id.
    fn get_entity(&self, id: &str) -> Result<Option<TrackedEntity>>;

    /// Gets a single entity by its upstream natural key.
    fn get_entity_by_key(&self, natural_key: &str) -> Result<Option<TrackedEntity>>;

    /// Lists entities ordered by natural key. Archived entities are skipped
    /// unless `include_archived` is set.
    fn list_entities(&self, include_archived: bool) -> Result<Vec<TrackedEntity>>;

    /// Marks an entity archived so refresh cycles skip it. Its snapshots and
    /// reports stay queryable. Returns true if the entity existed.
    fn archive_entity(&self, id: &str) -> Result<bool>;

    /// Records the completion time of the last successful refresh.
    fn set_entity_last_scan(&self, id: &str, ts: DateTime<Utc>) -> Result<()>;

    /// Writes a snapshot, replacing any prior snapshot for the same entity
    /// and date.
    fn upsert_snapshot(&self, snapshot: &MetricsSnapshot) -> Result<()>;

    /// Returns the most recent snapshot for an entity, by snapshot date.
    fn latest_snapshot(&self, entity_id: &str) -> Result<Option<MetricsSnapshot>>;

    /// Returns the snapshot for an entity on a specific date.
    fn get_snapshot(&self, entity_id: &str, date: NaiveDate) -> Result<Option<MetricsSnapshot>>;

    /// Writes a report, replacing any prior report for the same entity and
    /// date.
    fn upsert_report(&self, report: &ComplianceReport) -> Result<()>;

    /// Returns the most recent compliance report for an entity.
    fn latest_report(&self, entity_id: &str) -> Result<Option<ComplianceReport>>;

    /// Lists all benchmarks. Rows whose operator is not recognized are
    /// dropped with a warning rather than failing the listing.
    fn list_benchmarks(&self) -> Result<Vec<Benchmark>>;

    /// Inserts a benchmark, or updates thresholds, operator, unit, and
    /// category when the metric key already has one.
    fn upsert_benchmark(&self, benchmark: &Benchmark) -> Result<()>;

    /// Returns the number of benchmark rows.
    fn count_benchmarks(&self) -> Result<u64>;
}

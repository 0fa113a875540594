use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use devpulse_common::types::{
    Benchmark, BenchmarkOp, ComplianceReport, ComplianceStatus, MetricsSnapshot, TrackedEntity,
};
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::SnapshotStore;

const ENTITIES_SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS entities (
    id TEXT PRIMARY KEY,
    natural_key TEXT NOT NULL UNIQUE,
    kind TEXT NOT NULL,
    display_name TEXT NOT NULL,
    archived INTEGER NOT NULL DEFAULT 0,
    last_scan_at INTEGER,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_entities_kind ON entities(kind);
CREATE INDEX IF NOT EXISTS idx_entities_archived ON entities(archived);
";

const SNAPSHOTS_SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS snapshots (
    id TEXT PRIMARY KEY,
    entity_id TEXT NOT NULL,
    snapshot_date TEXT NOT NULL,
    metrics TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL,
    UNIQUE(entity_id, snapshot_date)
);
CREATE INDEX IF NOT EXISTS idx_snapshots_entity_date ON snapshots(entity_id, snapshot_date);
";

const REPORTS_SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS reports (
    id TEXT PRIMARY KEY,
    entity_id TEXT NOT NULL,
    report_date TEXT NOT NULL,
    overall_score INTEGER NOT NULL,
    overall_status TEXT NOT NULL,
    results TEXT NOT NULL,
    recommendations TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL,
    UNIQUE(entity_id, report_date)
);
CREATE INDEX IF NOT EXISTS idx_reports_entity_date ON reports(entity_id, report_date);
";

const BENCHMARKS_SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS benchmarks (
    id TEXT PRIMARY KEY,
    metric TEXT NOT NULL UNIQUE,
    operator TEXT NOT NULL,
    pass_threshold REAL,
    warn_threshold REAL,
    fail_threshold REAL,
    unit TEXT,
    category TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_benchmarks_category ON benchmarks(category);
";

/// SQLite-backed [`SnapshotStore`].
pub struct SqliteStore {
    conn: Mutex<Connection>,
    _db_path: PathBuf,
}

impl SqliteStore {
    pub fn new(data_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(data_dir)?;
        let db_path = data_dir.join("devpulse.db");
        let conn = Connection::open(&db_path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch(ENTITIES_SCHEMA)?;
        conn.execute_batch(SNAPSHOTS_SCHEMA)?;
        conn.execute_batch(REPORTS_SCHEMA)?;
        conn.execute_batch(BENCHMARKS_SCHEMA)?;
        tracing::info!(path = %db_path.display(), "Initialized snapshot store");
        Ok(Self {
            conn: Mutex::new(conn),
            _db_path: db_path,
        })
    }

    // ---- Row mappers ----

    fn row_to_entity(row: &rusqlite::Row) -> Result<TrackedEntity> {
        let kind_raw: String = row.get(2)?;
        let archived_int: i32 = row.get(4)?;
        let last_scan: Option<i64> = row.get(5)?;
        let created: i64 = row.get(6)?;
        let updated: i64 = row.get(7)?;
        Ok(TrackedEntity {
            id: row.get(0)?,
            natural_key: row.get(1)?,
            kind: kind_raw.parse().map_err(|e: String| anyhow::anyhow!(e))?,
            display_name: row.get(3)?,
            archived: archived_int != 0,
            last_scan_at: last_scan.and_then(|ts| DateTime::from_timestamp(ts, 0)),
            created_at: DateTime::from_timestamp(created, 0).unwrap_or_default(),
            updated_at: DateTime::from_timestamp(updated, 0).unwrap_or_default(),
        })
    }

    fn row_to_snapshot(row: &rusqlite::Row) -> Result<MetricsSnapshot> {
        let date_raw: String = row.get(2)?;
        let metrics_raw: String = row.get(3)?;
        let created: i64 = row.get(4)?;
        let updated: i64 = row.get(5)?;
        Ok(MetricsSnapshot {
            id: row.get(0)?,
            entity_id: row.get(1)?,
            snapshot_date: date_raw.parse()?,
            metrics: serde_json::from_str(&metrics_raw)?,
            created_at: DateTime::from_timestamp(created, 0).unwrap_or_default(),
            updated_at: DateTime::from_timestamp(updated, 0).unwrap_or_default(),
        })
    }

    fn row_to_report(row: &rusqlite::Row) -> Result<ComplianceReport> {
        let date_raw: String = row.get(2)?;
        let score: i64 = row.get(3)?;
        let status_raw: String = row.get(4)?;
        let results_raw: String = row.get(5)?;
        let recommendations_raw: String = row.get(6)?;
        let created: i64 = row.get(7)?;
        let updated: i64 = row.get(8)?;
        Ok(ComplianceReport {
            id: row.get(0)?,
            entity_id: row.get(1)?,
            report_date: date_raw.parse()?,
            overall_score: score as u8,
            overall_status: status_raw
                .parse::<ComplianceStatus>()
                .map_err(|e| anyhow::anyhow!(e))?,
            results: serde_json::from_str(&results_raw)?,
            recommendations: serde_json::from_str(&recommendations_raw)?,
            created_at: DateTime::from_timestamp(created, 0).unwrap_or_default(),
            updated_at: DateTime::from_timestamp(updated, 0).unwrap_or_default(),
        })
    }

    fn row_to_benchmark(row: &rusqlite::Row) -> Result<Benchmark> {
        let metric: String = row.get(1)?;
        let operator_raw: String = row.get(2)?;
        let operator = operator_raw
            .parse::<BenchmarkOp>()
            .map_err(|e| anyhow::anyhow!("benchmark {metric}: {e}"))?;
        let created: i64 = row.get(8)?;
        let updated: i64 = row.get(9)?;
        Ok(Benchmark {
            id: row.get(0)?,
            metric,
            operator,
            pass_threshold: row.get(3)?,
            warn_threshold: row.get(4)?,
            fail_threshold: row.get(5)?,
            unit: row.get(6)?,
            category: row.get(7)?,
            created_at: DateTime::from_timestamp(created, 0).unwrap_or_default(),
            updated_at: DateTime::from_timestamp(updated, 0).unwrap_or_default(),
        })
    }
}

impl SnapshotStore for SqliteStore {
    fn upsert_entity(&self, entity: &TrackedEntity) -> Result<TrackedEntity> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO entities (id, natural_key, kind, display_name, archived, last_scan_at, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT(natural_key) DO UPDATE SET
                 kind = excluded.kind,
                 display_name = excluded.display_name,
                 updated_at = excluded.updated_at",
            rusqlite::params![
                entity.id,
                entity.natural_key,
                entity.kind.to_string(),
                entity.display_name,
                entity.archived as i32,
                entity.last_scan_at.map(|t| t.timestamp()),
                entity.created_at.timestamp(),
                entity.updated_at.timestamp(),
            ],
        )?;
        drop(conn);
        self.get_entity_by_key(&entity.natural_key)
            .and_then(|opt| opt.ok_or_else(|| anyhow::anyhow!("Failed to read upserted entity")))
    }

    fn get_entity(&self, id: &str) -> Result<Option<TrackedEntity>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, natural_key, kind, display_name, archived, last_scan_at, created_at, updated_at
             FROM entities WHERE id = ?1",
        )?;
        let mut rows = stmt.query_map(rusqlite::params![id], |row| {
            Ok(Self::row_to_entity(row))
        })?;
        match rows.next() {
            Some(Ok(Ok(e))) => Ok(Some(e)),
            Some(Ok(Err(e))) => Err(e),
            Some(Err(e)) => Err(e.into()),
            None => Ok(None),
        }
    }

    fn get_entity_by_key(&self, natural_key: &str) -> Result<Option<TrackedEntity>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, natural_key, kind, display_name, archived, last_scan_at, created_at, updated_at
             FROM entities WHERE natural_key = ?1",
        )?;
        let mut rows = stmt.query_map(rusqlite::params![natural_key], |row| {
            Ok(Self::row_to_entity(row))
        })?;
        match rows.next() {
            Some(Ok(Ok(e))) => Ok(Some(e)),
            Some(Ok(Err(e))) => Err(e),
            Some(Err(e)) => Err(e.into()),
            None => Ok(None),
        }
    }

    fn list_entities(&self, include_archived: bool) -> Result<Vec<TrackedEntity>> {
        let conn = self.conn.lock().unwrap();
        let mut sql = String::from(
            "SELECT id, natural_key, kind, display_name, archived, last_scan_at, created_at, updated_at
             FROM entities",
        );
        if !include_archived {
            sql.push_str(" WHERE archived = 0");
        }
        sql.push_str(" ORDER BY natural_key");

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([], |row| Ok(Self::row_to_entity(row)))?;
        let mut entities = Vec::new();
        for row in rows {
            entities.push(row??);
        }
        Ok(entities)
    }

    fn archive_entity(&self, id: &str) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let updated = conn.execute(
            "UPDATE entities SET archived = 1, updated_at = ?1 WHERE id = ?2",
            rusqlite::params![Utc::now().timestamp(), id],
        )?;
        Ok(updated > 0)
    }

    fn set_entity_last_scan(&self, id: &str, ts: DateTime<Utc>) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE entities SET last_scan_at = ?1, updated_at = ?1 WHERE id = ?2",
            rusqlite::params![ts.timestamp(), id],
        )?;
        Ok(())
    }

    fn upsert_snapshot(&self, snapshot: &MetricsSnapshot) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let metrics_json = serde_json::to_string(&snapshot.metrics)?;
        conn.execute(
            "INSERT INTO snapshots (id, entity_id, snapshot_date, metrics, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(entity_id, snapshot_date) DO UPDATE SET
                 metrics = excluded.metrics,
                 updated_at = excluded.updated_at",
            rusqlite::params![
                snapshot.id,
                snapshot.entity_id,
                snapshot.snapshot_date.to_string(),
                metrics_json,
                snapshot.created_at.timestamp(),
                snapshot.updated_at.timestamp(),
            ],
        )?;
        Ok(())
    }

    fn latest_snapshot(&self, entity_id: &str) -> Result<Option<MetricsSnapshot>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, entity_id, snapshot_date, metrics, created_at, updated_at
             FROM snapshots WHERE entity_id = ?1
             ORDER BY snapshot_date DESC LIMIT 1",
        )?;
        let mut rows = stmt.query_map(rusqlite::params![entity_id], |row| {
            Ok(Self::row_to_snapshot(row))
        })?;
        match rows.next() {
            Some(Ok(Ok(s))) => Ok(Some(s)),
            Some(Ok(Err(e))) => Err(e),
            Some(Err(e)) => Err(e.into()),
            None => Ok(None),
        }
    }

    fn get_snapshot(&self, entity_id: &str, date: NaiveDate) -> Result<Option<MetricsSnapshot>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, entity_id, snapshot_date, metrics, created_at, updated_at
             FROM snapshots WHERE entity_id = ?1 AND snapshot_date = ?2",
        )?;
        let mut rows = stmt.query_map(rusqlite::params![entity_id, date.to_string()], |row| {
            Ok(Self::row_to_snapshot(row))
        })?;
        match rows.next() {
            Some(Ok(Ok(s))) => Ok(Some(s)),
            Some(Ok(Err(e))) => Err(e),
            Some(Err(e)) => Err(e.into()),
            None => Ok(None),
        }
    }

    fn upsert_report(&self, report: &ComplianceReport) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let results_json = serde_json::to_string(&report.results)?;
        let recommendations_json = serde_json::to_string(&report.recommendations)?;
        conn.execute(
            "INSERT INTO reports (id, entity_id, report_date, overall_score, overall_status, results, recommendations, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             ON CONFLICT(entity_id, report_date) DO UPDATE SET
                 overall_score = excluded.overall_score,
                 overall_status = excluded.overall_status,
                 results = excluded.results,
                 recommendations = excluded.recommendations,
                 updated_at = excluded.updated_at",
            rusqlite::params![
                report.id,
                report.entity_id,
                report.report_date.to_string(),
                report.overall_score as i64,
                report.overall_status.to_string(),
                results_json,
                recommendations_json,
                report.created_at.timestamp(),
                report.updated_at.timestamp(),
            ],
        )?;
        Ok(())
    }

    fn latest_report(&self, entity_id: &str) -> Result<Option<ComplianceReport>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, entity_id, report_date, overall_score, overall_status, results, recommendations, created_at, updated_at
             FROM reports WHERE entity_id = ?1
             ORDER BY report_date DESC LIMIT 1",
        )?;
        let mut rows = stmt.query_map(rusqlite::params![entity_id], |row| {
            Ok(Self::row_to_report(row))
        })?;
        match rows.next() {
            Some(Ok(Ok(r))) => Ok(Some(r)),
            Some(Ok(Err(e))) => Err(e),
            Some(Err(e)) => Err(e.into()),
            None => Ok(None),
        }
    }

    fn list_benchmarks(&self) -> Result<Vec<Benchmark>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, metric, operator, pass_threshold, warn_threshold, fail_threshold, unit, category, created_at, updated_at
             FROM benchmarks ORDER BY metric",
        )?;
        let rows = stmt.query_map([], |row| Ok(Self::row_to_benchmark(row)))?;
        let mut benchmarks = Vec::new();
        for row in rows {
            match row? {
                Ok(b) => benchmarks.push(b),
                // A row the evaluator cannot interpret is worse than a
                // missing one, so it is skipped instead of aborting the load.
                Err(e) => tracing::warn!(error = %e, "Dropping unreadable benchmark row"),
            }
        }
        Ok(benchmarks)
    }

    fn upsert_benchmark(&self, benchmark: &Benchmark) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO benchmarks (id, metric, operator, pass_threshold, warn_threshold, fail_threshold, unit, category, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
             ON CONFLICT(metric) DO UPDATE SET
                 operator = excluded.operator,
                 pass_threshold = excluded.pass_threshold,
                 warn_threshold = excluded.warn_threshold,
                 fail_threshold = excluded.fail_threshold,
                 unit = excluded.unit,
                 category = excluded.category,
                 updated_at = excluded.updated_at",
            rusqlite::params![
                benchmark.id,
                benchmark.metric,
                benchmark.operator.to_string(),
                benchmark.pass_threshold,
                benchmark.warn_threshold,
                benchmark.fail_threshold,
                benchmark.unit,
                benchmark.category,
                benchmark.created_at.timestamp(),
                benchmark.updated_at.timestamp(),
            ],
        )?;
        Ok(())
    }

    fn count_benchmarks(&self) -> Result<u64> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM benchmarks", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}

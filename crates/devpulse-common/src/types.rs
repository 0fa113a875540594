use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Kind of entity the engine tracks.
///
/// # Examples
///
/// ```
/// use devpulse_common::types::EntityKind;
///
/// let kind: EntityKind = "repository".parse().unwrap();
/// assert_eq!(kind, EntityKind::Repository);
/// assert_eq!(kind.to_string(), "repository");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Repository,
    Sprint,
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntityKind::Repository => write!(f, "repository"),
            EntityKind::Sprint => write!(f, "sprint"),
        }
    }
}

impl std::str::FromStr for EntityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "repository" => Ok(EntityKind::Repository),
            "sprint" => Ok(EntityKind::Sprint),
            _ => Err(format!("unknown entity kind: {s}")),
        }
    }
}

/// A repository or sprint the engine keeps metrics for.
///
/// Created on first ingestion, updated on every refresh, never hard-deleted
/// (archived entities are skipped by refresh cycles but keep their history).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackedEntity {
    pub id: String,
    /// Stable upstream key: `owner/name` for repositories, board id for sprints.
    pub natural_key: String,
    pub kind: EntityKind,
    pub display_name: String,
    pub archived: bool,
    /// Completion time of the last successful refresh for this entity.
    /// `None` until the first refresh finishes.
    pub last_scan_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Trailing time window raw records are fetched and aggregated over.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScanWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl ScanWindow {
    /// Trailing window of `days` whole days ending at `end`.
    pub fn trailing_days(end: DateTime<Utc>, days: i64) -> Self {
        ScanWindow {
            start: end - chrono::Duration::days(days),
            end,
        }
    }

    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days()
    }

    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        self.start <= ts && ts <= self.end
    }
}

// ---- Raw ingested records ----

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PullRequestState {
    Open,
    Merged,
    Closed,
}

/// One pull request as reported by the source tracker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PullRequest {
    pub number: u64,
    pub title: String,
    pub state: PullRequestState,
    pub author: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub merged_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
    pub additions: u64,
    pub deletions: u64,
    /// Number of completed reviews; zero means the change went in unreviewed.
    pub review_count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VulnerabilitySeverity {
    Critical,
    High,
    Medium,
    Low,
}

/// One vulnerability finding from the security tracker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vulnerability {
    pub id: String,
    pub package: String,
    pub severity: VulnerabilitySeverity,
    /// False once the finding has been fixed or dismissed.
    pub open: bool,
    pub detected_at: DateTime<Utc>,
}

/// One commit on any branch of a repository.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Commit {
    pub sha: String,
    pub author: String,
    pub committed_at: DateTime<Utc>,
    pub to_default_branch: bool,
    /// True when the commit landed through a merged pull request.
    pub via_pull_request: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SprintIssueStatus {
    Todo,
    InProgress,
    Done,
}

/// One issue assigned to a sprint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SprintIssue {
    pub key: String,
    pub status: SprintIssueStatus,
    /// Estimate in story points; `None` for unestimated issues.
    pub story_points: Option<f64>,
    /// True when the issue joined the sprint after it started (scope creep).
    pub added_after_start: bool,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanStatus {
    Completed,
    Failed,
    Running,
}

/// One security scan run recorded by the scanner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityScan {
    pub id: String,
    pub status: ScanStatus,
    /// Set only for completed scans.
    pub completed_at: Option<DateTime<Utc>>,
}

/// Version status of one tracked dependency.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependencyStatus {
    pub name: String,
    pub current_version: String,
    pub latest_version: String,
    /// Whole major versions between current and latest.
    pub majors_behind: u32,
    pub outdated: bool,
}

/// Repository-level settings reported by the source tracker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepoSettings {
    pub default_branch: String,
    pub branch_protection_enabled: bool,
    /// True when a reviewer-assignment (code ownership) file exists.
    pub ownership_file_present: bool,
}

/// Everything one ingestion fetch returns for a single entity.
///
/// Record lists are immutable facts; the metrics calculator reads them and
/// never writes back. Which lists are populated depends on the entity kind
/// (repositories never carry sprint issues and vice versa).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordBatch {
    pub fetched_at: DateTime<Utc>,
    pub pull_requests: Vec<PullRequest>,
    pub vulnerabilities: Vec<Vulnerability>,
    pub commits: Vec<Commit>,
    pub sprint_issues: Vec<SprintIssue>,
    pub security_scans: Vec<SecurityScan>,
    pub dependencies: Vec<DependencyStatus>,
    pub repo_settings: Option<RepoSettings>,
}

impl RecordBatch {
    pub fn empty(fetched_at: DateTime<Utc>) -> Self {
        RecordBatch {
            fetched_at,
            pull_requests: Vec::new(),
            vulnerabilities: Vec::new(),
            commits: Vec::new(),
            sprint_issues: Vec::new(),
            security_scans: Vec::new(),
            dependencies: Vec::new(),
            repo_settings: None,
        }
    }
}

// ---- Derived metrics ----

/// Observed value of one metric, before benchmark comparison.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetricValue {
    Number(f64),
    Flag(bool),
}

impl MetricValue {
    /// Numeric view used by the evaluator: booleans coerce to 100.0 / 0.0.
    pub fn as_f64(&self) -> f64 {
        match self {
            MetricValue::Number(v) => *v,
            MetricValue::Flag(true) => 100.0,
            MetricValue::Flag(false) => 0.0,
        }
    }
}

/// Pull-request flow metrics over the scan window.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PullMetrics {
    pub open_count: u32,
    pub merged_count: u32,
    pub closed_count: u32,
    /// Mean created-to-merged duration of merged PRs; `None` when nothing merged.
    pub avg_merge_hours: Option<f64>,
    /// Share of window PRs with at least one review, 0-100.
    pub review_coverage_percent: f64,
    /// Share of open PRs untouched for more than 7 days; `None` when nothing is open.
    pub stale_ratio: Option<f64>,
    /// Mean additions + deletions per PR.
    pub avg_size_lines: Option<f64>,
}

/// Vulnerability exposure and scan recency.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SecurityMetrics {
    pub open_critical_high: u32,
    pub open_medium: u32,
    pub open_low: u32,
    /// Whole days since the latest completed scan; `None` when none completed.
    pub days_since_last_scan: Option<i64>,
}

/// Repository hygiene: branch policy and dependency drift.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HealthMetrics {
    /// `None` when the tracker did not report settings for this repository.
    pub branch_protection: Option<bool>,
    /// Commits pushed straight to the default branch in the last 30 days.
    pub direct_default_pushes_30d: u32,
    /// Dependencies more than one major version behind.
    pub major_drift_count: u32,
    /// Dependencies outdated by at most one major version.
    pub outdated_count: u32,
}

/// Contribution spread over the scan window.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CollaborationMetrics {
    pub distinct_committers: u32,
    /// Commits per week, weeks rounded up; `None` for an empty window.
    pub commits_per_week: Option<f64>,
    /// `None` when the tracker did not report settings for this repository.
    pub ownership_file: Option<bool>,
}

/// Sprint delivery metrics derived from sprint issues.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SprintMetrics {
    pub total_issues: u32,
    pub completed_issues: u32,
    /// Done share by story points, falling back to issue counts when no
    /// issue carries an estimate. 0-100.
    pub completion_percent: f64,
    /// Share of issues added after sprint start, 0-100.
    pub scope_added_percent: f64,
    /// Mean started-to-completed duration of done issues; `None` when no
    /// done issue has both timestamps.
    pub avg_cycle_time_days: Option<f64>,
}

/// Metric groups of one snapshot. Groups the entity kind does not produce
/// stay `None` and are excluded from compliance evaluation; `None` values
/// *inside* a present group mean "could not be computed" and fail their
/// benchmark.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SnapshotMetrics {
    pub pulls: Option<PullMetrics>,
    pub security: Option<SecurityMetrics>,
    pub health: Option<HealthMetrics>,
    pub collaboration: Option<CollaborationMetrics>,
    pub sprint: Option<SprintMetrics>,
}

impl SnapshotMetrics {
    /// Flatten present groups into the benchmarkable metric list.
    ///
    /// Keys are stable and match the `metric` column of benchmark rows.
    /// Absent groups contribute nothing; absent values inside a present
    /// group are kept as `None` so the evaluator can fail them.
    pub fn metric_values(&self) -> Vec<(&'static str, Option<MetricValue>)> {
        let mut out = Vec::new();
        if let Some(p) = &self.pulls {
            out.push(("pulls.avg_merge_hours", p.avg_merge_hours.map(MetricValue::Number)));
            out.push((
                "pulls.review_coverage_percent",
                Some(MetricValue::Number(p.review_coverage_percent)),
            ));
            out.push(("pulls.stale_ratio", p.stale_ratio.map(MetricValue::Number)));
            out.push(("pulls.avg_size_lines", p.avg_size_lines.map(MetricValue::Number)));
        }
        if let Some(s) = &self.security {
            out.push((
                "security.open_critical_high",
                Some(MetricValue::Number(f64::from(s.open_critical_high))),
            ));
            out.push(("security.open_medium", Some(MetricValue::Number(f64::from(s.open_medium)))));
            out.push(("security.open_low", Some(MetricValue::Number(f64::from(s.open_low)))));
            out.push((
                "security.days_since_last_scan",
                s.days_since_last_scan.map(|d| MetricValue::Number(d as f64)),
            ));
        }
        if let Some(h) = &self.health {
            out.push(("repo.branch_protection", h.branch_protection.map(MetricValue::Flag)));
            out.push((
                "repo.direct_default_pushes_30d",
                Some(MetricValue::Number(f64::from(h.direct_default_pushes_30d))),
            ));
            out.push((
                "deps.major_drift_count",
                Some(MetricValue::Number(f64::from(h.major_drift_count))),
            ));
            out.push(("deps.outdated_count", Some(MetricValue::Number(f64::from(h.outdated_count)))));
        }
        if let Some(c) = &self.collaboration {
            out.push((
                "collab.distinct_committers",
                Some(MetricValue::Number(f64::from(c.distinct_committers))),
            ));
            out.push(("collab.commits_per_week", c.commits_per_week.map(MetricValue::Number)));
            out.push(("collab.ownership_file", c.ownership_file.map(MetricValue::Flag)));
        }
        if let Some(s) = &self.sprint {
            out.push((
                "sprint.completion_percent",
                Some(MetricValue::Number(s.completion_percent)),
            ));
            out.push((
                "sprint.scope_added_percent",
                Some(MetricValue::Number(s.scope_added_percent)),
            ));
            out.push((
                "sprint.avg_cycle_time_days",
                s.avg_cycle_time_days.map(MetricValue::Number),
            ));
        }
        out
    }
}

/// Dated metrics snapshot for one entity. One row per (entity, date);
/// recomputation within the same day overwrites.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub id: String,
    pub entity_id: String,
    pub snapshot_date: NaiveDate,
    pub metrics: SnapshotMetrics,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ---- Benchmarks and compliance ----

/// Comparison operator of a benchmark.
///
/// # Examples
///
/// ```
/// use devpulse_common::types::BenchmarkOp;
///
/// let op: BenchmarkOp = "gte".parse().unwrap();
/// assert_eq!(op, BenchmarkOp::Gte);
/// assert_eq!(op.to_string(), "gte");
/// assert!("between".parse::<BenchmarkOp>().is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BenchmarkOp {
    /// Higher is better: pass at or above `pass`, warn at or above `warn`.
    Gte,
    /// Lower is better: pass at or below `pass`, warn at or below `warn`.
    Lte,
    /// Exact match against `pass`; no warn tier.
    Eq,
    /// Band check: pass inside [`pass`, `fail`], warn inside [`warn`, `fail`],
    /// fail outside. `fail` is the shared hard upper bound of both bands.
    Range,
}

impl std::fmt::Display for BenchmarkOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BenchmarkOp::Gte => write!(f, "gte"),
            BenchmarkOp::Lte => write!(f, "lte"),
            BenchmarkOp::Eq => write!(f, "eq"),
            BenchmarkOp::Range => write!(f, "range"),
        }
    }
}

impl std::str::FromStr for BenchmarkOp {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "gte" => Ok(BenchmarkOp::Gte),
            "lte" => Ok(BenchmarkOp::Lte),
            "eq" => Ok(BenchmarkOp::Eq),
            "range" => Ok(BenchmarkOp::Range),
            _ => Err(format!("unknown benchmark operator: {s}")),
        }
    }
}

/// Configurable pass/warn/fail thresholds for one metric.
///
/// `metric` is the natural key; updating a benchmark replaces the previous
/// thresholds for that metric. A `None` threshold disables its tier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Benchmark {
    pub id: String,
    pub metric: String,
    pub operator: BenchmarkOp,
    pub pass_threshold: Option<f64>,
    pub warn_threshold: Option<f64>,
    pub fail_threshold: Option<f64>,
    pub unit: Option<String>,
    pub category: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Compliance verdict tier, ordered from best to worst.
///
/// # Examples
///
/// ```
/// use devpulse_common::types::ComplianceStatus;
///
/// let status: ComplianceStatus = "warn".parse().unwrap();
/// assert_eq!(status, ComplianceStatus::Warn);
/// assert_eq!(status.to_string(), "warn");
/// assert!(ComplianceStatus::Fail > ComplianceStatus::Pass);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComplianceStatus {
    Pass,
    Warn,
    Fail,
}

impl ComplianceStatus {
    /// Fixed score contribution of this tier.
    pub fn score(&self) -> u8 {
        match self {
            ComplianceStatus::Pass => 100,
            ComplianceStatus::Warn => 50,
            ComplianceStatus::Fail => 0,
        }
    }
}

impl std::fmt::Display for ComplianceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ComplianceStatus::Pass => write!(f, "pass"),
            ComplianceStatus::Warn => write!(f, "warn"),
            ComplianceStatus::Fail => write!(f, "fail"),
        }
    }
}

impl std::str::FromStr for ComplianceStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pass" => Ok(ComplianceStatus::Pass),
            "warn" => Ok(ComplianceStatus::Warn),
            "fail" => Ok(ComplianceStatus::Fail),
            _ => Err(format!("unknown compliance status: {s}")),
        }
    }
}

/// Verdict for a single metric inside a report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplianceResult {
    pub metric: String,
    pub status: ComplianceStatus,
    pub score: u8,
    /// Observed value after boolean coercion; `None` when the metric could
    /// not be computed.
    pub observed: Option<f64>,
    /// `None` when no benchmark covered the metric (itself a failure).
    pub benchmark_id: Option<String>,
}

/// Aggregate compliance report for one entity on one date.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComplianceReport {
    pub id: String,
    pub entity_id: String,
    pub report_date: NaiveDate,
    /// Rounded mean of per-metric scores, 0-100.
    pub overall_score: u8,
    /// Worst tier present among the results.
    pub overall_status: ComplianceStatus,
    pub results: Vec<ComplianceResult>,
    pub recommendations: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ---- Refresh bookkeeping ----

/// Point-in-time view of the refresh loop, as exposed to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefreshStatus {
    pub is_refreshing: bool,
    pub last_refresh_time: Option<DateTime<Utc>>,
    pub next_scheduled_refresh: Option<DateTime<Utc>>,
}

/// Staleness of one entity's data, derived from `last_scan_at`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FreshnessRow {
    pub entity_id: String,
    pub natural_key: String,
    pub kind: EntityKind,
    pub last_scan_at: Option<DateTime<Utc>>,
    /// Hours since the last successful scan; infinity when never scanned.
    pub data_age_hours: f64,
    pub stale: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_scan_window_trailing_days() {
        let end = Utc.with_ymd_and_hms(2024, 6, 30, 12, 0, 0).unwrap();
        let w = ScanWindow::trailing_days(end, 30);
        assert_eq!(w.days(), 30);
        assert!(w.contains(end));
        assert!(w.contains(end - chrono::Duration::days(30)));
        assert!(!w.contains(end - chrono::Duration::days(31)));
    }

    #[test]
    fn test_metric_values_skips_absent_groups() {
        let metrics = SnapshotMetrics {
            sprint: Some(SprintMetrics::default()),
            ..Default::default()
        };
        let values = metrics.metric_values();
        assert_eq!(values.len(), 3);
        assert!(values.iter().all(|(key, _)| key.starts_with("sprint.")));
    }

    #[test]
    fn test_metric_values_keeps_missing_values_as_none() {
        let metrics = SnapshotMetrics {
            security: Some(SecurityMetrics {
                open_critical_high: 1,
                open_medium: 0,
                open_low: 2,
                days_since_last_scan: None,
            }),
            ..Default::default()
        };
        let values = metrics.metric_values();
        let scan = values
            .iter()
            .find(|(key, _)| *key == "security.days_since_last_scan")
            .unwrap();
        assert!(scan.1.is_none());
    }

    #[test]
    fn test_metric_value_flag_coercion() {
        assert_eq!(MetricValue::Flag(true).as_f64(), 100.0);
        assert_eq!(MetricValue::Flag(false).as_f64(), 0.0);
        assert_eq!(MetricValue::Number(42.5).as_f64(), 42.5);
    }
}

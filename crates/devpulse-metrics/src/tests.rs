use crate::calculator::MetricsCalculator;
use crate::{collaboration, health, pulls, security, sprint};
use chrono::{DateTime, Duration, TimeZone, Utc};
use devpulse_common::types::{
    Commit, DependencyStatus, EntityKind, PullMetrics, PullRequest, PullRequestState, RecordBatch,
    RepoSettings, ScanStatus, ScanWindow, SecurityScan, SprintIssue, SprintIssueStatus,
    TrackedEntity, Vulnerability, VulnerabilitySeverity,
};

fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 30, 12, 0, 0).unwrap()
}

fn make_window(now: DateTime<Utc>) -> ScanWindow {
    ScanWindow::trailing_days(now, 30)
}

fn make_entity(kind: EntityKind) -> TrackedEntity {
    let now = fixed_now();
    TrackedEntity {
        id: devpulse_common::id::next_id(),
        natural_key: match kind {
            EntityKind::Repository => "acme/api".to_string(),
            EntityKind::Sprint => "board-7/sprint-42".to_string(),
        },
        kind,
        display_name: "Test entity".to_string(),
        archived: false,
        last_scan_at: None,
        created_at: now,
        updated_at: now,
    }
}

fn merged_pr(number: u64, now: DateTime<Utc>, merge_after_hours: i64, reviews: u32) -> PullRequest {
    let created = now - Duration::days(5);
    let merged = created + Duration::hours(merge_after_hours);
    PullRequest {
        number,
        title: format!("change {number}"),
        state: PullRequestState::Merged,
        author: "alice".to_string(),
        created_at: created,
        updated_at: merged,
        merged_at: Some(merged),
        closed_at: Some(merged),
        additions: 100,
        deletions: 50,
        review_count: reviews,
    }
}

fn open_pr(number: u64, now: DateTime<Utc>, updated_days_ago: i64, reviews: u32) -> PullRequest {
    let created = now - Duration::days(20);
    PullRequest {
        number,
        title: format!("change {number}"),
        state: PullRequestState::Open,
        author: "bob".to_string(),
        created_at: created,
        updated_at: now - Duration::days(updated_days_ago),
        merged_at: None,
        closed_at: None,
        additions: 10,
        deletions: 5,
        review_count: reviews,
    }
}

fn make_vuln(severity: VulnerabilitySeverity, open: bool) -> Vulnerability {
    Vulnerability {
        id: devpulse_common::id::next_id(),
        package: "left-pad".to_string(),
        severity,
        open,
        detected_at: fixed_now() - Duration::days(3),
    }
}

fn make_commit(author: &str, days_ago: i64, to_default: bool, via_pr: bool) -> Commit {
    Commit {
        sha: devpulse_common::id::next_id(),
        author: author.to_string(),
        committed_at: fixed_now() - Duration::days(days_ago),
        to_default_branch: to_default,
        via_pull_request: via_pr,
    }
}

fn make_scan(status: ScanStatus, completed_days_ago: Option<i64>) -> SecurityScan {
    SecurityScan {
        id: devpulse_common::id::next_id(),
        status,
        completed_at: completed_days_ago.map(|d| fixed_now() - Duration::days(d)),
    }
}

fn make_issue(
    key: &str,
    status: SprintIssueStatus,
    points: Option<f64>,
    added_after_start: bool,
    cycle_days: Option<i64>,
) -> SprintIssue {
    let started = fixed_now() - Duration::days(10);
    SprintIssue {
        key: key.to_string(),
        status,
        story_points: points,
        added_after_start,
        started_at: Some(started),
        completed_at: cycle_days.map(|d| started + Duration::days(d)),
    }
}

// ---- pulls ----

#[test]
fn pulls_counts_and_avg_merge_hours() {
    let now = fixed_now();
    let mut batch = RecordBatch::empty(now);
    batch.pull_requests = vec![
        merged_pr(1, now, 24, 1),
        merged_pr(2, now, 48, 1),
        open_pr(3, now, 1, 0),
    ];

    let m = pulls::compute(&batch, &make_window(now)).unwrap();
    assert_eq!(m.merged_count, 2);
    assert_eq!(m.open_count, 1);
    assert_eq!(m.closed_count, 0);
    assert_eq!(m.avg_merge_hours, Some(36.0));
}

#[test]
fn pulls_review_coverage() {
    let now = fixed_now();
    let mut batch = RecordBatch::empty(now);
    batch.pull_requests = vec![
        merged_pr(1, now, 10, 2),
        merged_pr(2, now, 10, 1),
        open_pr(3, now, 1, 0),
    ];

    let m = pulls::compute(&batch, &make_window(now)).unwrap();
    assert!((m.review_coverage_percent - 200.0 / 3.0).abs() < 1e-9);
}

#[test]
fn pulls_stale_ratio_over_open_only() {
    let now = fixed_now();
    let mut batch = RecordBatch::empty(now);
    batch.pull_requests = vec![
        open_pr(1, now, 10, 0), // stale
        open_pr(2, now, 1, 0),
        merged_pr(3, now, 5, 1),
    ];

    let m = pulls::compute(&batch, &make_window(now)).unwrap();
    assert_eq!(m.stale_ratio, Some(0.5));
}

#[test]
fn pulls_empty_batch_is_vacuously_covered() {
    let now = fixed_now();
    let batch = RecordBatch::empty(now);

    let m = pulls::compute(&batch, &make_window(now)).unwrap();
    assert_eq!(m.review_coverage_percent, 100.0);
    assert_eq!(m.avg_merge_hours, None);
    assert_eq!(m.stale_ratio, None);
    assert_eq!(m.avg_size_lines, None);
}

#[test]
fn pulls_avg_size_lines() {
    let now = fixed_now();
    let mut batch = RecordBatch::empty(now);
    batch.pull_requests = vec![merged_pr(1, now, 10, 1), open_pr(2, now, 1, 0)];

    // (100 + 50 + 10 + 5) / 2
    let m = pulls::compute(&batch, &make_window(now)).unwrap();
    assert_eq!(m.avg_size_lines, Some(82.5));
}

#[test]
fn pulls_merged_without_timestamp_is_an_error() {
    let now = fixed_now();
    let mut pr = merged_pr(1, now, 10, 1);
    pr.merged_at = None;
    let mut batch = RecordBatch::empty(now);
    batch.pull_requests = vec![pr];

    assert!(pulls::compute(&batch, &make_window(now)).is_err());
}

// ---- security ----

#[test]
fn security_counts_open_vulns_by_tier() {
    let now = fixed_now();
    let mut batch = RecordBatch::empty(now);
    batch.vulnerabilities = vec![
        make_vuln(VulnerabilitySeverity::Critical, true),
        make_vuln(VulnerabilitySeverity::High, true),
        make_vuln(VulnerabilitySeverity::Medium, true),
        make_vuln(VulnerabilitySeverity::Low, true),
        make_vuln(VulnerabilitySeverity::Critical, false), // fixed, not counted
    ];

    let m = security::compute(&batch, now).unwrap();
    assert_eq!(m.open_critical_high, 2);
    assert_eq!(m.open_medium, 1);
    assert_eq!(m.open_low, 1);
    assert_eq!(m.days_since_last_scan, None);
}

#[test]
fn security_days_since_latest_completed_scan() {
    let now = fixed_now();
    let mut batch = RecordBatch::empty(now);
    batch.security_scans = vec![
        make_scan(ScanStatus::Completed, Some(10)),
        make_scan(ScanStatus::Completed, Some(3)),
        make_scan(ScanStatus::Running, None),
    ];

    let m = security::compute(&batch, now).unwrap();
    assert_eq!(m.days_since_last_scan, Some(3));
}

#[test]
fn security_completed_scan_without_timestamp_is_an_error() {
    let now = fixed_now();
    let mut batch = RecordBatch::empty(now);
    batch.security_scans = vec![make_scan(ScanStatus::Completed, None)];

    assert!(security::compute(&batch, now).is_err());
}

// ---- health ----

#[test]
fn health_counts_recent_direct_pushes_only() {
    let now = fixed_now();
    let mut batch = RecordBatch::empty(now);
    batch.commits = vec![
        make_commit("alice", 10, true, false), // direct push, in horizon
        make_commit("alice", 10, true, true),  // via PR
        make_commit("bob", 10, false, false),  // feature branch
        make_commit("carol", 40, true, false), // too old
    ];
    batch.repo_settings = Some(RepoSettings {
        default_branch: "main".to_string(),
        branch_protection_enabled: true,
        ownership_file_present: false,
    });

    let m = health::compute(&batch, now).unwrap();
    assert_eq!(m.direct_default_pushes_30d, 1);
    assert_eq!(m.branch_protection, Some(true));
}

#[test]
fn health_splits_drift_from_merely_outdated() {
    let now = fixed_now();
    let mut batch = RecordBatch::empty(now);
    batch.dependencies = vec![
        DependencyStatus {
            name: "serde".to_string(),
            current_version: "0.9.0".to_string(),
            latest_version: "3.1.0".to_string(),
            majors_behind: 3,
            outdated: true,
        },
        DependencyStatus {
            name: "tokio".to_string(),
            current_version: "0.9.0".to_string(),
            latest_version: "1.2.0".to_string(),
            majors_behind: 1,
            outdated: true,
        },
        DependencyStatus {
            name: "tracing".to_string(),
            current_version: "1.2.0".to_string(),
            latest_version: "1.2.0".to_string(),
            majors_behind: 0,
            outdated: false,
        },
    ];

    let m = health::compute(&batch, now).unwrap();
    assert_eq!(m.major_drift_count, 1);
    assert_eq!(m.outdated_count, 1);
}

#[test]
fn health_without_settings_leaves_flags_unknown() {
    let now = fixed_now();
    let batch = RecordBatch::empty(now);

    let m = health::compute(&batch, now).unwrap();
    assert_eq!(m.branch_protection, None);
}

// ---- collaboration ----

#[test]
fn collaboration_commits_per_week_rounds_weeks_up() {
    let now = fixed_now();
    let mut batch = RecordBatch::empty(now);
    batch.commits = (0..10).map(|i| make_commit("alice", i % 5, true, true)).collect();
    batch.commits[3].author = "bob".to_string();

    // 30-day window is 5 whole weeks.
    let m = collaboration::compute(&batch, &make_window(now)).unwrap();
    assert_eq!(m.commits_per_week, Some(2.0));
    assert_eq!(m.distinct_committers, 2);
}

#[test]
fn collaboration_zero_length_window_has_no_cadence() {
    let now = fixed_now();
    let batch = RecordBatch::empty(now);
    let window = ScanWindow::trailing_days(now, 0);

    let m = collaboration::compute(&batch, &window).unwrap();
    assert_eq!(m.commits_per_week, None);
}

// ---- sprint ----

#[test]
fn sprint_completion_by_story_points() {
    let now = fixed_now();
    let mut batch = RecordBatch::empty(now);
    batch.sprint_issues = vec![
        make_issue("DP-1", SprintIssueStatus::Done, Some(5.0), false, Some(2)),
        make_issue("DP-2", SprintIssueStatus::Done, Some(3.0), false, Some(4)),
        make_issue("DP-3", SprintIssueStatus::Todo, Some(2.0), false, None),
    ];

    let m = sprint::compute(&batch).unwrap();
    assert_eq!(m.total_issues, 3);
    assert_eq!(m.completed_issues, 2);
    assert_eq!(m.completion_percent, 80.0);
    assert_eq!(m.avg_cycle_time_days, Some(3.0));
}

#[test]
fn sprint_completion_falls_back_to_issue_counts() {
    let now = fixed_now();
    let mut batch = RecordBatch::empty(now);
    batch.sprint_issues = vec![
        make_issue("DP-1", SprintIssueStatus::Done, None, false, Some(1)),
        make_issue("DP-2", SprintIssueStatus::Done, None, false, Some(1)),
        make_issue("DP-3", SprintIssueStatus::InProgress, None, false, None),
        make_issue("DP-4", SprintIssueStatus::Todo, None, false, None),
    ];

    let m = sprint::compute(&batch).unwrap();
    assert_eq!(m.completion_percent, 50.0);
}

#[test]
fn sprint_scope_added_percent() {
    let now = fixed_now();
    let mut batch = RecordBatch::empty(now);
    batch.sprint_issues = vec![
        make_issue("DP-1", SprintIssueStatus::Done, None, false, Some(1)),
        make_issue("DP-2", SprintIssueStatus::Todo, None, true, None),
        make_issue("DP-3", SprintIssueStatus::Todo, None, false, None),
        make_issue("DP-4", SprintIssueStatus::Todo, None, false, None),
    ];

    let m = sprint::compute(&batch).unwrap();
    assert_eq!(m.scope_added_percent, 25.0);
}

#[test]
fn sprint_empty_is_vacuously_complete() {
    let now = fixed_now();
    let batch = RecordBatch::empty(now);

    let m = sprint::compute(&batch).unwrap();
    assert_eq!(m.completion_percent, 100.0);
    assert_eq!(m.scope_added_percent, 0.0);
    assert_eq!(m.avg_cycle_time_days, None);
}

#[test]
fn sprint_negative_cycle_time_is_an_error() {
    let now = fixed_now();
    let mut issue = make_issue("DP-1", SprintIssueStatus::Done, None, false, None);
    issue.completed_at = Some(issue.started_at.unwrap() - Duration::days(1));
    let mut batch = RecordBatch::empty(now);
    batch.sprint_issues = vec![issue];

    assert!(sprint::compute(&batch).is_err());
}

// ---- calculator ----

#[test]
fn calculator_picks_repository_groups() {
    let now = fixed_now();
    let entity = make_entity(EntityKind::Repository);
    let batch = RecordBatch::empty(now);

    let snapshot = MetricsCalculator::new().compute(&entity, &batch, &make_window(now), now);
    assert!(snapshot.metrics.pulls.is_some());
    assert!(snapshot.metrics.security.is_some());
    assert!(snapshot.metrics.health.is_some());
    assert!(snapshot.metrics.collaboration.is_some());
    assert!(snapshot.metrics.sprint.is_none());
    assert_eq!(snapshot.entity_id, entity.id);
    assert_eq!(snapshot.snapshot_date, now.date_naive());
}

#[test]
fn calculator_picks_sprint_group() {
    let now = fixed_now();
    let entity = make_entity(EntityKind::Sprint);
    let batch = RecordBatch::empty(now);

    let snapshot = MetricsCalculator::new().compute(&entity, &batch, &make_window(now), now);
    assert!(snapshot.metrics.sprint.is_some());
    assert!(snapshot.metrics.pulls.is_none());
    assert!(snapshot.metrics.security.is_none());
}

#[test]
fn calculator_substitutes_defaults_when_one_group_fails() {
    let now = fixed_now();
    let entity = make_entity(EntityKind::Repository);

    let mut bad_pr = merged_pr(1, now, 10, 1);
    bad_pr.merged_at = None;
    let mut batch = RecordBatch::empty(now);
    batch.pull_requests = vec![bad_pr];
    batch.vulnerabilities = vec![make_vuln(VulnerabilitySeverity::Critical, true)];

    let snapshot = MetricsCalculator::new().compute(&entity, &batch, &make_window(now), now);

    // The corrupt pulls group collapses to defaults.
    assert_eq!(snapshot.metrics.pulls, Some(PullMetrics::default()));
    // Other groups still compute from their own records.
    assert_eq!(snapshot.metrics.security.as_ref().unwrap().open_critical_high, 1);
}

#[test]
fn calculator_is_deterministic_for_same_inputs() {
    let now = fixed_now();
    let entity = make_entity(EntityKind::Repository);
    let mut batch = RecordBatch::empty(now);
    batch.pull_requests = vec![merged_pr(1, now, 24, 1), open_pr(2, now, 9, 0)];
    batch.commits = vec![make_commit("alice", 2, true, true)];

    let calc = MetricsCalculator::new();
    let a = calc.compute(&entity, &batch, &make_window(now), now);
    let b = calc.compute(&entity, &batch, &make_window(now), now);
    assert_eq!(a.metrics, b.metrics);
}

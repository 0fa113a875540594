use crate::error::{IngestError, Result};
use crate::{EntityFilter, EntityMeta, IngestionAdapter};
use chrono::Duration;
use devpulse_common::types::{
    Commit, DependencyStatus, EntityKind, PullRequest, PullRequestState, RecordBatch, RepoSettings,
    ScanStatus, ScanWindow, SecurityScan, SprintIssue, SprintIssueStatus, TrackedEntity,
    Vulnerability, VulnerabilitySeverity,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

const AUTHORS: &[&str] = &["alice", "bob", "carol", "dave", "erin", "frank"];

const PACKAGES: &[&str] = &[
    "serde", "tokio", "axum", "chrono", "rand", "tracing", "rusqlite", "reqwest", "uuid", "clap",
    "anyhow", "thiserror", "hyper", "regex", "log", "base64",
];

const STORY_POINTS: &[f64] = &[1.0, 2.0, 3.0, 5.0, 8.0, 13.0];

/// Fixture adapter configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixtureConfig {
    /// Base seed folded into every per-entity generator.
    #[serde(default = "default_seed")]
    pub seed: u64,
    /// Repository natural keys the fixture tracker knows about.
    #[serde(default = "default_repositories")]
    pub repositories: Vec<String>,
    /// Sprint natural keys the fixture tracker knows about.
    #[serde(default = "default_sprints")]
    pub sprints: Vec<String>,
    /// Natural keys whose record fetches fail, for exercising failure
    /// isolation end to end.
    #[serde(default)]
    pub fail_keys: Vec<String>,
}

fn default_seed() -> u64 {
    42
}

fn default_repositories() -> Vec<String> {
    vec![
        "acme/api".to_string(),
        "acme/web".to_string(),
        "acme/ops".to_string(),
    ]
}

fn default_sprints() -> Vec<String> {
    vec!["board-1/sprint-24".to_string()]
}

impl Default for FixtureConfig {
    fn default() -> Self {
        FixtureConfig {
            seed: default_seed(),
            repositories: default_repositories(),
            sprints: default_sprints(),
            fail_keys: Vec::new(),
        }
    }
}

/// Deterministic synthetic tracker.
///
/// Record batches are a pure function of (seed, natural key, window end
/// date): refreshing the same entity twice on the same day produces
/// byte-identical records, which keeps snapshot upserts idempotent and
/// makes demo runs reproducible.
#[derive(Debug)]
pub struct FixtureAdapter {
    config: FixtureConfig,
}

impl FixtureAdapter {
    pub fn new(config: FixtureConfig) -> Self {
        FixtureAdapter { config }
    }

    fn meta_for(&self, natural_key: &str) -> Option<EntityMeta> {
        let kind = if self.config.repositories.iter().any(|k| k == natural_key) {
            EntityKind::Repository
        } else if self.config.sprints.iter().any(|k| k == natural_key) {
            EntityKind::Sprint
        } else {
            return None;
        };
        Some(EntityMeta {
            natural_key: natural_key.to_string(),
            kind,
            display_name: display_name(natural_key),
        })
    }

    fn rng_for(&self, natural_key: &str, window: &ScanWindow) -> StdRng {
        let mut hasher = DefaultHasher::new();
        self.config.seed.hash(&mut hasher);
        natural_key.hash(&mut hasher);
        window.end.date_naive().hash(&mut hasher);
        StdRng::seed_from_u64(hasher.finish())
    }

    fn repository_batch(&self, window: &ScanWindow, rng: &mut StdRng) -> RecordBatch {
        let mut batch = RecordBatch::empty(window.end);
        let window_hours = (window.days().max(1) * 24) as u64;

        let pr_count = rng.gen_range(6..18u64);
        for number in 1..=pr_count {
            let created = window.end - Duration::hours(rng.gen_range(12..window_hours) as i64);
            let roll: f64 = rng.gen();
            let review_count = if rng.gen_bool(0.75) {
                rng.gen_range(1..4)
            } else {
                0
            };
            let additions = rng.gen_range(5..800);
            let deletions = rng.gen_range(0..400);

            let pr = if roll < 0.55 {
                let merged = (created + Duration::hours(rng.gen_range(2..96))).min(window.end);
                PullRequest {
                    number,
                    title: format!("change {number}"),
                    state: PullRequestState::Merged,
                    author: AUTHORS[rng.gen_range(0..AUTHORS.len())].to_string(),
                    created_at: created,
                    updated_at: merged,
                    merged_at: Some(merged),
                    closed_at: Some(merged),
                    additions,
                    deletions,
                    review_count,
                }
            } else if roll < 0.85 {
                let updated =
                    (window.end - Duration::days(rng.gen_range(0..12))).max(created);
                PullRequest {
                    number,
                    title: format!("change {number}"),
                    state: PullRequestState::Open,
                    author: AUTHORS[rng.gen_range(0..AUTHORS.len())].to_string(),
                    created_at: created,
                    updated_at: updated,
                    merged_at: None,
                    closed_at: None,
                    additions,
                    deletions,
                    review_count,
                }
            } else {
                let closed = (created + Duration::days(rng.gen_range(1..10))).min(window.end);
                PullRequest {
                    number,
                    title: format!("change {number}"),
                    state: PullRequestState::Closed,
                    author: AUTHORS[rng.gen_range(0..AUTHORS.len())].to_string(),
                    created_at: created,
                    updated_at: closed,
                    merged_at: None,
                    closed_at: Some(closed),
                    additions,
                    deletions,
                    review_count,
                }
            };
            batch.pull_requests.push(pr);
        }

        let vuln_count = rng.gen_range(0..5);
        for i in 0..vuln_count {
            let severity = match rng.gen_range(0..10) {
                0 => VulnerabilitySeverity::Critical,
                1 | 2 => VulnerabilitySeverity::High,
                3..=5 => VulnerabilitySeverity::Medium,
                _ => VulnerabilitySeverity::Low,
            };
            batch.vulnerabilities.push(Vulnerability {
                id: format!("VULN-{i}"),
                package: PACKAGES[rng.gen_range(0..PACKAGES.len())].to_string(),
                severity,
                open: rng.gen_bool(0.7),
                detected_at: window.end - Duration::days(rng.gen_range(0..60)),
            });
        }

        let committer_count = rng.gen_range(2..=5usize);
        let commit_count = rng.gen_range(15..70);
        for _ in 0..commit_count {
            let to_default = rng.gen_bool(0.7);
            batch.commits.push(Commit {
                sha: format!("{:040x}", rng.gen::<u128>()),
                author: AUTHORS[rng.gen_range(0..committer_count)].to_string(),
                committed_at: window.end
                    - Duration::hours(rng.gen_range(0..window_hours) as i64),
                to_default_branch: to_default,
                via_pull_request: to_default && rng.gen_bool(0.85),
            });
        }

        if rng.gen_bool(0.9) {
            let scan_count = rng.gen_range(1..=2);
            for i in 0..scan_count {
                batch.security_scans.push(SecurityScan {
                    id: format!("SCAN-{i}"),
                    status: ScanStatus::Completed,
                    completed_at: Some(window.end - Duration::days(rng.gen_range(0..12))),
                });
            }
            if rng.gen_bool(0.3) {
                batch.security_scans.push(SecurityScan {
                    id: "SCAN-RUNNING".to_string(),
                    status: ScanStatus::Running,
                    completed_at: None,
                });
            }
        }

        let dep_count = rng.gen_range(6..=PACKAGES.len());
        for package in PACKAGES.iter().take(dep_count) {
            let majors_behind = match rng.gen_range(0..10) {
                0..=5 => 0,
                6 | 7 => 1,
                8 => 2,
                _ => 3,
            };
            let current_major = rng.gen_range(1..4u32);
            batch.dependencies.push(DependencyStatus {
                name: (*package).to_string(),
                current_version: format!("{current_major}.{}.0", rng.gen_range(0..10)),
                latest_version: format!(
                    "{}.{}.0",
                    current_major + majors_behind,
                    rng.gen_range(0..10)
                ),
                majors_behind,
                outdated: majors_behind > 0 || rng.gen_bool(0.2),
            });
        }

        batch.repo_settings = Some(RepoSettings {
            default_branch: "main".to_string(),
            branch_protection_enabled: rng.gen_bool(0.8),
            ownership_file_present: rng.gen_bool(0.6),
        });

        batch
    }

    fn sprint_batch(&self, window: &ScanWindow, rng: &mut StdRng) -> RecordBatch {
        let mut batch = RecordBatch::empty(window.end);

        let issue_count = rng.gen_range(8..=16);
        for i in 1..=issue_count {
            let status = match rng.gen_range(0..10) {
                0..=5 => SprintIssueStatus::Done,
                6..=8 => SprintIssueStatus::InProgress,
                _ => SprintIssueStatus::Todo,
            };
            let started_at = if status == SprintIssueStatus::Todo {
                None
            } else {
                Some(window.end - Duration::days(rng.gen_range(2..14)))
            };
            let completed_at = if status == SprintIssueStatus::Done {
                started_at.map(|s| (s + Duration::days(rng.gen_range(1..5))).min(window.end))
            } else {
                None
            };
            batch.sprint_issues.push(SprintIssue {
                key: format!("ISSUE-{i}"),
                status,
                story_points: rng
                    .gen_bool(0.7)
                    .then(|| STORY_POINTS[rng.gen_range(0..STORY_POINTS.len())]),
                added_after_start: rng.gen_bool(0.15),
                started_at,
                completed_at,
            });
        }

        batch
    }
}

fn display_name(natural_key: &str) -> String {
    natural_key
        .rsplit('/')
        .next()
        .unwrap_or(natural_key)
        .to_string()
}

#[async_trait::async_trait]
impl IngestionAdapter for FixtureAdapter {
    fn name(&self) -> &str {
        "fixture"
    }

    async fn list_entities(&self, filter: &EntityFilter) -> Result<Vec<EntityMeta>> {
        let mut entities = Vec::new();
        for key in self.config.repositories.iter().chain(&self.config.sprints) {
            if let Some(meta) = self.meta_for(key) {
                if filter.matches(&meta) {
                    entities.push(meta);
                }
            }
        }
        Ok(entities)
    }

    async fn fetch_entity(&self, natural_key: &str) -> Result<EntityMeta> {
        self.meta_for(natural_key)
            .ok_or_else(|| IngestError::NotFound(natural_key.to_string()))
    }

    async fn fetch_records(
        &self,
        entity: &TrackedEntity,
        window: &ScanWindow,
    ) -> Result<RecordBatch> {
        if self.config.fail_keys.iter().any(|k| k == &entity.natural_key) {
            return Err(IngestError::Upstream {
                tracker: self.name().to_string(),
                message: format!("injected failure for {}", entity.natural_key),
            });
        }
        if self.meta_for(&entity.natural_key).is_none() {
            return Err(IngestError::NotFound(entity.natural_key.clone()));
        }

        let mut rng = self.rng_for(&entity.natural_key, window);
        let batch = match entity.kind {
            EntityKind::Repository => self.repository_batch(window, &mut rng),
            EntityKind::Sprint => self.sprint_batch(window, &mut rng),
        };
        tracing::debug!(
            entity = %entity.natural_key,
            pull_requests = batch.pull_requests.len(),
            commits = batch.commits.len(),
            sprint_issues = batch.sprint_issues.len(),
            "Generated fixture batch"
        );
        Ok(batch)
    }
}

use anyhow::Context;
use chrono::{DateTime, Utc};
use devpulse_common::types::{
    EntityKind, FreshnessRow, RefreshStatus, ScanWindow, TrackedEntity,
};
use devpulse_compliance::build_report;
use devpulse_ingest::error::IngestError;
use devpulse_ingest::{EntityFilter, IngestionAdapter};
use devpulse_metrics::MetricsCalculator;
use devpulse_store::SnapshotStore;
use std::sync::{Arc, Mutex};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RefreshError {
    /// Another cycle holds the flight lock; no work was started.
    #[error("a refresh cycle is already running")]
    AlreadyRunning,
    #[error("unknown entity: {0}")]
    UnknownEntity(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// What a refresh cycle covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshTarget {
    /// Discover upstream entities, then refresh every non-archived one.
    All,
    /// Refresh a single entity by natural key, skipping discovery.
    Entity(String),
}

/// Outcome counters of one refresh cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleSummary {
    pub discovered: u32,
    pub refreshed: u32,
    pub failed: u32,
}

#[derive(Debug, Default)]
struct RefreshState {
    is_refreshing: bool,
    last_refresh_time: Option<DateTime<Utc>>,
    next_scheduled_refresh: Option<DateTime<Utc>>,
}

/// Drives the fetch -> compute -> evaluate -> persist pipeline.
///
/// At most one cycle runs at a time: scheduled ticks and on-demand triggers
/// share a flight lock, and the loser gets [`RefreshError::AlreadyRunning`]
/// instead of queueing. Entities are processed one by one so a failing
/// upstream fetch only costs that entity its update.
pub struct RefreshOrchestrator {
    store: Arc<dyn SnapshotStore>,
    adapter: Arc<dyn IngestionAdapter>,
    calculator: MetricsCalculator,
    state: Mutex<RefreshState>,
    window_days: i64,
    stale_threshold_hours: f64,
}

impl RefreshOrchestrator {
    pub fn new(
        store: Arc<dyn SnapshotStore>,
        adapter: Arc<dyn IngestionAdapter>,
        window_days: i64,
        stale_threshold_hours: f64,
    ) -> Self {
        Self {
            store,
            adapter,
            calculator: MetricsCalculator::new(),
            state: Mutex::new(RefreshState::default()),
            window_days,
            stale_threshold_hours,
        }
    }

    /// Runs one refresh cycle now, for the whole fleet or a single entity.
    ///
    /// Serves both the interval scheduler and manual refresh triggers.
    /// Returns [`RefreshError::AlreadyRunning`] without doing any work when
    /// a cycle is already in flight.
    pub async fn force_refresh(&self, target: RefreshTarget) -> Result<CycleSummary, RefreshError> {
        self.try_begin()?;
        let result = self.run_target(&target).await;
        self.finish();
        result
    }

    /// Registers `natural_key` with the store and runs its first refresh so
    /// a snapshot and report exist as soon as the entity is added.
    pub async fn bootstrap_entity(
        &self,
        kind: EntityKind,
        natural_key: &str,
    ) -> Result<TrackedEntity, RefreshError> {
        let meta = self.adapter.fetch_entity(natural_key).await.map_err(|e| match e {
            IngestError::NotFound(key) => RefreshError::UnknownEntity(key),
            other => RefreshError::Other(other.into()),
        })?;
        if meta.kind != kind {
            return Err(RefreshError::Other(anyhow::anyhow!(
                "{natural_key} is a {} upstream, not a {kind}",
                meta.kind
            )));
        }

        let now = Utc::now();
        let entity = self.store.upsert_entity(&TrackedEntity {
            id: devpulse_common::id::next_id(),
            natural_key: meta.natural_key.clone(),
            kind: meta.kind,
            display_name: meta.display_name.clone(),
            archived: false,
            last_scan_at: None,
            created_at: now,
            updated_at: now,
        })?;
        tracing::info!(entity = %entity.natural_key, kind = %entity.kind, "Entity registered");

        self.force_refresh(RefreshTarget::Entity(entity.natural_key.clone()))
            .await?;

        // Reread to pick up the scan bookkeeping the refresh just wrote.
        self.store
            .get_entity(&entity.id)?
            .ok_or_else(|| RefreshError::UnknownEntity(natural_key.to_string()))
    }

    /// Snapshot of the refresh loop state.
    pub fn status(&self) -> RefreshStatus {
        let state = self.state.lock().unwrap();
        RefreshStatus {
            is_refreshing: state.is_refreshing,
            last_refresh_time: state.last_refresh_time,
            next_scheduled_refresh: state.next_scheduled_refresh,
        }
    }

    /// Records when the scheduler will fire next, for [`Self::status`].
    pub fn set_next_refresh(&self, at: DateTime<Utc>) {
        self.state.lock().unwrap().next_scheduled_refresh = Some(at);
    }

    /// Data age per non-archived entity. Entities never scanned report an
    /// infinite age and are always stale.
    pub fn data_freshness(&self) -> Result<Vec<FreshnessRow>, RefreshError> {
        let now = Utc::now();
        let rows = self
            .store
            .list_entities(false)?
            .into_iter()
            .map(|entity| {
                let data_age_hours = match entity.last_scan_at {
                    Some(ts) => (now - ts).num_seconds() as f64 / 3600.0,
                    None => f64::INFINITY,
                };
                FreshnessRow {
                    stale: data_age_hours > self.stale_threshold_hours,
                    entity_id: entity.id,
                    natural_key: entity.natural_key,
                    kind: entity.kind,
                    last_scan_at: entity.last_scan_at,
                    data_age_hours,
                }
            })
            .collect();
        Ok(rows)
    }

    fn try_begin(&self) -> Result<(), RefreshError> {
        let mut state = self.state.lock().unwrap();
        if state.is_refreshing {
            return Err(RefreshError::AlreadyRunning);
        }
        state.is_refreshing = true;
        Ok(())
    }

    fn finish(&self) {
        let mut state = self.state.lock().unwrap();
        state.is_refreshing = false;
        state.last_refresh_time = Some(Utc::now());
    }

    async fn run_target(&self, target: &RefreshTarget) -> Result<CycleSummary, RefreshError> {
        let now = Utc::now();
        let window = ScanWindow::trailing_days(now, self.window_days);
        let mut summary = CycleSummary::default();

        let entities = match target {
            RefreshTarget::All => {
                summary.discovered = self.discover_entities(now).await;
                self.store.list_entities(false)?
            }
            RefreshTarget::Entity(key) => {
                let entity = self
                    .store
                    .get_entity_by_key(key)?
                    .ok_or_else(|| RefreshError::UnknownEntity(key.clone()))?;
                vec![entity]
            }
        };

        for entity in &entities {
            match self.refresh_entity(entity, &window, now).await {
                Ok(()) => summary.refreshed += 1,
                Err(e) => {
                    summary.failed += 1;
                    tracing::warn!(
                        entity = %entity.natural_key,
                        error = %e,
                        "Entity refresh failed, keeping its previous snapshot"
                    );
                }
            }
        }

        tracing::info!(
            discovered = summary.discovered,
            refreshed = summary.refreshed,
            failed = summary.failed,
            "Refresh cycle finished"
        );
        Ok(summary)
    }

    /// Registers upstream entities the store has not seen yet. Discovery
    /// failures downgrade the cycle to known entities instead of aborting it.
    async fn discover_entities(&self, now: DateTime<Utc>) -> u32 {
        let metas = match self.adapter.list_entities(&EntityFilter::default()).await {
            Ok(metas) => metas,
            Err(e) => {
                tracing::warn!(
                    source = self.adapter.name(),
                    error = %e,
                    "Entity discovery failed, refreshing known entities only"
                );
                return 0;
            }
        };

        let mut discovered = 0;
        for meta in metas {
            match self.store.get_entity_by_key(&meta.natural_key) {
                Ok(Some(_)) => {}
                Ok(None) => {
                    let entity = TrackedEntity {
                        id: devpulse_common::id::next_id(),
                        natural_key: meta.natural_key.clone(),
                        kind: meta.kind,
                        display_name: meta.display_name.clone(),
                        archived: false,
                        last_scan_at: None,
                        created_at: now,
                        updated_at: now,
                    };
                    match self.store.upsert_entity(&entity) {
                        Ok(stored) => {
                            discovered += 1;
                            tracing::info!(
                                entity = %stored.natural_key,
                                kind = %stored.kind,
                                "Discovered new entity"
                            );
                        }
                        Err(e) => {
                            tracing::warn!(
                                entity = %meta.natural_key,
                                error = %e,
                                "Failed to register discovered entity"
                            );
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        entity = %meta.natural_key,
                        error = %e,
                        "Entity lookup failed during discovery"
                    );
                }
            }
        }
        discovered
    }

    /// Fetch, compute, evaluate, persist for one entity. `last_scan_at` is
    /// only advanced after everything else is stored, so a partial failure
    /// leaves the entity looking unrefreshed.
    async fn refresh_entity(
        &self,
        entity: &TrackedEntity,
        window: &ScanWindow,
        now: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        let batch = self
            .adapter
            .fetch_records(entity, window)
            .await
            .with_context(|| format!("fetching records for {}", entity.natural_key))?;

        let snapshot = self.calculator.compute(entity, &batch, window, now);
        self.store.upsert_snapshot(&snapshot)?;

        let benchmarks = self.store.list_benchmarks()?;
        let report = build_report(&snapshot, &benchmarks, now);
        self.store.upsert_report(&report)?;

        self.store.set_entity_last_scan(&entity.id, now)?;

        tracing::info!(
            entity = %entity.natural_key,
            score = report.overall_score,
            status = %report.overall_status,
            "Entity refreshed"
        );
        Ok(())
    }
}

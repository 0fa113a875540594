#![allow(dead_code)]

use anyhow::Result;
use chrono::Utc;
use devpulse_common::types::{EntityKind, TrackedEntity};
use devpulse_ingest::fixture::{FixtureAdapter, FixtureConfig};
use devpulse_ingest::IngestionAdapter;
use devpulse_server::refresh::RefreshOrchestrator;
use devpulse_store::sqlite::SqliteStore;
use devpulse_store::SnapshotStore;
use std::sync::Arc;
use tempfile::TempDir;

pub struct TestContext {
    pub temp_dir: TempDir,
    pub store: Arc<SqliteStore>,
    pub orchestrator: Arc<RefreshOrchestrator>,
}

pub fn build_test_context() -> Result<TestContext> {
    build_context_with_fixture(FixtureConfig::default())
}

pub fn build_context_with_fixture(config: FixtureConfig) -> Result<TestContext> {
    build_context_with_adapter(Arc::new(FixtureAdapter::new(config)))
}

pub fn build_context_with_adapter(adapter: Arc<dyn IngestionAdapter>) -> Result<TestContext> {
    devpulse_common::id::init(1, 1);
    let temp_dir = tempfile::tempdir()?;
    let store = Arc::new(SqliteStore::new(temp_dir.path())?);
    let orchestrator = Arc::new(RefreshOrchestrator::new(
        store.clone() as Arc<dyn SnapshotStore>,
        adapter,
        30,
        12.0,
    ));
    Ok(TestContext {
        temp_dir,
        store,
        orchestrator,
    })
}

/// Registers an entity directly in the store, without running a refresh.
pub fn register_entity(ctx: &TestContext, key: &str, kind: EntityKind) -> Result<TrackedEntity> {
    let now = Utc::now();
    ctx.store.upsert_entity(&TrackedEntity {
        id: devpulse_common::id::next_id(),
        natural_key: key.to_string(),
        kind,
        display_name: key.rsplit('/').next().unwrap_or(key).to_string(),
        archived: false,
        last_scan_at: None,
        created_at: now,
        updated_at: now,
    })
}

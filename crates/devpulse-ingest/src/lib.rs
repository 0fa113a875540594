pub mod error;
pub mod fixture;

use devpulse_common::types::{EntityKind, RecordBatch, ScanWindow, TrackedEntity};
use serde::{Deserialize, Serialize};

/// Entity metadata discovered from the upstream tracker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityMeta {
    /// Stable upstream key: `owner/name` for repositories, board id for sprints.
    pub natural_key: String,
    pub kind: EntityKind,
    pub display_name: String,
}

/// Entity listing filter.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EntityFilter {
    /// Only include entities of these kinds. Empty means all kinds.
    #[serde(default)]
    pub kinds: Vec<EntityKind>,
    /// Only include entities whose natural key starts with this prefix.
    #[serde(default)]
    pub key_prefix: Option<String>,
}

impl EntityFilter {
    /// Check if an entity matches this filter.
    pub fn matches(&self, meta: &EntityMeta) -> bool {
        if !self.kinds.is_empty() && !self.kinds.contains(&meta.kind) {
            return false;
        }
        if let Some(prefix) = &self.key_prefix {
            if !meta.natural_key.starts_with(prefix.as_str()) {
                return false;
            }
        }
        true
    }
}

/// Upstream tracker abstraction the refresh orchestrator pulls raw records
/// through.
///
/// Implementations own their transport, credentials and timeouts; a call
/// that exceeds the adapter's deadline must come back as
/// [`error::IngestError::Timeout`] rather than hang the refresh cycle.
#[async_trait::async_trait]
pub trait IngestionAdapter: Send + Sync + std::fmt::Debug {
    /// Adapter name (e.g., `"fixture"`, `"github:acme"`), used for logging.
    fn name(&self) -> &str;

    /// List entities the tracker knows about, filtered by `filter`.
    async fn list_entities(&self, filter: &EntityFilter) -> error::Result<Vec<EntityMeta>>;

    /// Resolve metadata for one entity by its natural key.
    ///
    /// # Errors
    ///
    /// Returns [`error::IngestError::NotFound`] when the tracker does not
    /// know the key.
    async fn fetch_entity(&self, natural_key: &str) -> error::Result<EntityMeta>;

    /// Fetch all raw records for `entity` within `window`.
    async fn fetch_records(
        &self,
        entity: &TrackedEntity,
        window: &ScanWindow,
    ) -> error::Result<RecordBatch>;
}

/// Build an ingestion adapter for the configured source type.
///
/// The in-tree source is `"fixture"` (deterministic synthetic data); live
/// tracker adapters are injected by embedders through [`IngestionAdapter`].
///
/// # Errors
///
/// Returns [`error::IngestError::UnsupportedSource`] if `source` is not
/// registered.
pub fn build_adapter(
    source: &str,
    config: fixture::FixtureConfig,
) -> error::Result<Box<dyn IngestionAdapter>> {
    match source {
        "fixture" => Ok(Box::new(fixture::FixtureAdapter::new(config))),
        _ => Err(error::IngestError::UnsupportedSource(source.to_string())),
    }
}

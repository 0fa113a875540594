use crate::refresh::{RefreshError, RefreshOrchestrator, RefreshTarget};
use chrono::Utc;
use std::sync::Arc;
use tokio::time::{interval, Duration};

/// Fires fleet-wide refresh cycles on a fixed interval.
///
/// The first cycle starts as soon as the scheduler runs; later ones fire
/// every `interval_secs`. A tick that lands while a manually triggered
/// cycle is still in flight is skipped, not queued.
pub struct RefreshScheduler {
    orchestrator: Arc<RefreshOrchestrator>,
    interval_secs: u64,
}

impl RefreshScheduler {
    pub fn new(orchestrator: Arc<RefreshOrchestrator>, interval_secs: u64) -> Self {
        Self {
            orchestrator,
            interval_secs,
        }
    }

    pub async fn run(&self) {
        tracing::info!(interval_secs = self.interval_secs, "Refresh scheduler started");

        let mut tick = interval(Duration::from_secs(self.interval_secs));
        loop {
            tick.tick().await;
            self.orchestrator.set_next_refresh(
                Utc::now() + chrono::Duration::seconds(self.interval_secs as i64),
            );
            match self.orchestrator.force_refresh(RefreshTarget::All).await {
                Ok(_) => {}
                Err(RefreshError::AlreadyRunning) => {
                    tracing::debug!("Skipping scheduled refresh, a cycle is already in flight");
                }
                Err(e) => {
                    tracing::error!(error = %e, "Scheduled refresh cycle failed");
                }
            }
        }
    }
}

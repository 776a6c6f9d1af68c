//! Self-rescheduling refresh chain, one per source.
//!
//! Each source has a persisted `next_due_at`. A `CheckSource` job asks
//! [`RefreshScheduler::check_source`] how long to wait; the dispatcher
//! re-enqueues the job with that delay, so the chain survives as long as the
//! worker pool runs and resumes from the stored deadline after a restart.

use crate::db::Store;
use crate::domain::SourceId;
use crate::jobs::{Job, JobQueue};
use crate::services::{CatalogError, MetadataService, SourceRegistry};
use chrono::Utc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

pub struct RefreshScheduler {
    registry: SourceRegistry,
    store: Store,
    jobs: JobQueue,
    metadata: Arc<MetadataService>,
}

impl RefreshScheduler {
    #[must_use]
    pub fn new(
        registry: SourceRegistry,
        store: Store,
        jobs: JobQueue,
        metadata: Arc<MetadataService>,
    ) -> Self {
        Self {
            registry,
            store,
            jobs,
            metadata,
        }
    }

    /// Seeds one `CheckSource` job per registered source. Sources that are
    /// not due yet simply wait out their remaining time.
    pub fn start(&self) -> usize {
        let started = self
            .registry
            .ids()
            .filter(|source| self.jobs.enqueue(Job::CheckSource { source: *source }))
            .count();
        info!("Refresh scheduler started for {} sources", started);
        started
    }

    /// Time until `source` is due; zero when it is due now or never ran.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Database`] when the schedule cannot be read.
    pub async fn remaining(&self, source: SourceId) -> Result<Duration, CatalogError> {
        let Some(next_due_at) = self.store.next_due_at(source).await? else {
            return Ok(Duration::ZERO);
        };

        Ok(next_due_at
            .signed_duration_since(Utc::now())
            .to_std()
            .unwrap_or(Duration::ZERO))
    }

    /// Runs the refresh of `source` if it is due and returns the delay until
    /// the next check.
    ///
    /// # Errors
    ///
    /// Returns the refresh error; the source stays due so the caller can
    /// retry after a short delay.
    pub async fn check_source(&self, source: SourceId) -> Result<Duration, CatalogError> {
        let orchestrator = self.registry.get(source)?;
        let period = orchestrator.settings().titles_period;

        let remaining = self.remaining(source).await?;
        if !remaining.is_zero() {
            debug!(source = %source, remaining_secs = remaining.as_secs(), "Source not due yet");
            return Ok(remaining);
        }

        let start = Instant::now();
        info!(event = "job_started", job_name = "refresh_source", source = %source, "Starting scheduled source refresh");

        let started_at = Utc::now();
        if let Err(e) = orchestrator.full_refresh().await {
            error!(event = "job_failed", job_name = "refresh_source", source = %source, error = %e, "Scheduled source refresh failed");
            self.store
                .record_source_run(source, started_at, started_at, Some(e.to_string()))
                .await?;
            return Err(e);
        }

        if let Err(e) = self.metadata.backfill(source).await {
            warn!(source = %source, error = %e, "Metadata backfill failed");
        }

        match self.store.purge_expired_cache().await {
            Ok(0) => {}
            Ok(purged) => debug!(purged, "Expired cache entries purged"),
            Err(e) => warn!(error = %e, "Failed to purge expired cache entries"),
        }

        let next_due_at = started_at
            + chrono::Duration::from_std(period).unwrap_or_else(|_| chrono::Duration::hours(6));
        self.store
            .record_source_run(source, next_due_at, started_at, None)
            .await?;

        info!(
            event = "job_finished",
            job_name = "refresh_source",
            source = %source,
            duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
            next_due_at = %next_due_at.to_rfc3339(),
            "Scheduled source refresh finished"
        );
        Ok(period)
    }
}

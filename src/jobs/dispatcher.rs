use super::Job;
use crate::db::Store;
use crate::domain::SourceId;
use crate::scheduler::RefreshScheduler;
use crate::services::{CatalogError, DurationProber, MetadataService, Orchestrator, SourceRegistry};
use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// What the worker should do with a job after running it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchStatus {
    Success,
    /// Run again if the job's retry policy allows it.
    Retry { error: String },
    Failed { error: String },
    /// Run the same job again after the delay.
    Reschedule(Duration),
}

impl DispatchStatus {
    fn failed(error: impl Display) -> Self {
        Self::Failed {
            error: error.to_string(),
        }
    }
}

#[async_trait::async_trait]
pub trait JobDispatcher: Send + Sync {
    async fn dispatch(&self, job: &Job) -> DispatchStatus;
}

fn settle<T, E: Display>(result: Result<T, E>) -> DispatchStatus {
    match result {
        Ok(_) => DispatchStatus::Success,
        Err(e) => DispatchStatus::failed(e),
    }
}

/// Routes catalog jobs to the orchestrators, the store and the prober.
pub struct CatalogDispatcher {
    registry: SourceRegistry,
    store: Store,
    prober: Option<Arc<DurationProber>>,
    scheduler: Arc<RefreshScheduler>,
    metadata: Arc<MetadataService>,
    retry_delay: Duration,
}

impl CatalogDispatcher {
    #[must_use]
    pub fn new(
        registry: SourceRegistry,
        store: Store,
        prober: Option<Arc<DurationProber>>,
        scheduler: Arc<RefreshScheduler>,
        metadata: Arc<MetadataService>,
        retry_delay: Duration,
    ) -> Self {
        Self {
            registry,
            store,
            prober,
            scheduler,
            metadata,
            retry_delay,
        }
    }

    fn orchestrator(&self, source: SourceId) -> Result<Arc<Orchestrator>, DispatchStatus> {
        self.registry.get(source).map_err(DispatchStatus::failed)
    }

    async fn check_source(&self, source: SourceId) -> DispatchStatus {
        match self.scheduler.check_source(source).await {
            Ok(delay) => DispatchStatus::Reschedule(delay),
            Err(e @ CatalogError::UnknownSource(_)) => DispatchStatus::failed(e),
            Err(e) => {
                warn!(source = %source, error = %e, retry_secs = self.retry_delay.as_secs(), "Source check failed, retrying later");
                DispatchStatus::Reschedule(self.retry_delay)
            }
        }
    }
}

#[async_trait::async_trait]
impl JobDispatcher for CatalogDispatcher {
    async fn dispatch(&self, job: &Job) -> DispatchStatus {
        match job {
            Job::RefreshTitlesPage { source, page } => match self.orchestrator(*source) {
                Ok(o) => settle(o.refresh_titles_page(*page).await),
                Err(status) => status,
            },
            Job::RefreshTitle {
                source,
                title,
                id_on_website,
            } => match self.orchestrator(*source) {
                Ok(o) => settle(o.refresh_title(*title, id_on_website).await),
                Err(status) => status,
            },
            Job::RefreshGenres { source } => match self.orchestrator(*source) {
                Ok(o) => settle(o.refresh_genres().await),
                Err(status) => status,
            },
            Job::RefreshGenrePage {
                source,
                genre,
                genre_id_on_website,
                page,
            } => match self.orchestrator(*source) {
                Ok(o) => settle(
                    o.refresh_genre_page(*genre, genre_id_on_website, *page)
                        .await,
                ),
                Err(status) => status,
            },
            Job::UpdateTitle { title, update } => {
                match self.store.apply_title_update(*title, update).await {
                    Ok(changed) => {
                        debug!(title_id = %title, changed, "Title reconciled");
                        DispatchStatus::Success
                    }
                    Err(e) => DispatchStatus::failed(e),
                }
            }
            Job::RenameGenre { genre, name } => {
                settle(self.store.rename_genre(*genre, name).await)
            }
            Job::LinkGenres { title, genres } => {
                settle(self.store.link_title_genres(*title, genres).await)
            }
            Job::SetMetadataId {
                title,
                shikimori_id,
            } => settle(
                self.store
                    .set_title_shikimori_id(*title, *shikimori_id)
                    .await,
            ),
            Job::RefreshMetadata { shikimori_id } => {
                match self.metadata.refresh(*shikimori_id).await {
                    Ok(_) => DispatchStatus::Success,
                    Err(e) => DispatchStatus::Retry {
                        error: e.to_string(),
                    },
                }
            }
            Job::ProbeDurations { title, episodes } => {
                if let Some(prober) = &self.prober {
                    let summary = prober.probe_episodes(&self.store, episodes).await;
                    debug!(
                        title_id = %title,
                        probed = summary.probed,
                        failed = summary.failed,
                        "Episode durations probed"
                    );
                }
                DispatchStatus::Success
            }
            Job::CheckSource { source } => self.check_source(*source).await,
            Job::FullRefresh { source } => match self.orchestrator(*source) {
                Ok(o) => settle(o.full_refresh().await),
                Err(status) => status,
            },
        }
    }
}

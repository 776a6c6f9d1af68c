use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::cache::{CacheStore, CatalogCache, DbCacheStore, MemoryCacheStore};
use crate::clients::animevost::AnimevostAdapter;
use crate::clients::shikimori::ShikimoriClient;
use crate::config::{CacheBackend, Config, SourceConfig};
use crate::db::Store;
use crate::domain::SourceId;
use crate::jobs::{CatalogDispatcher, JobQueue, JobReceiver, WorkerPool, spawn_workers};
use crate::scheduler::RefreshScheduler;
use crate::services::{
    DurationProber, MetadataProvider, MetadataService, Orchestrator, SourceRegistry,
};
use crate::sources::SiteAdapter;

/// Build a shared HTTP client with reasonable defaults for API calls.
/// This client should be reused across all HTTP-based services to enable
/// connection pooling and avoid socket exhaustion.
fn build_shared_http_client(timeout_seconds: u64) -> anyhow::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_seconds))
        .user_agent("Anicat/1.0")
        .pool_max_idle_per_host(10)
        .build()
        .map_err(|e| anyhow::anyhow!("Failed to build shared HTTP client: {e}"))
}

fn build_adapter(
    source: &SourceConfig,
    client: &reqwest::Client,
) -> Option<Arc<dyn SiteAdapter>> {
    match source.id {
        SourceId::Animevost => Some(Arc::new(AnimevostAdapter::with_shared_client(
            client.clone(),
            source.base_url.clone(),
        ))),
        SourceId::Anidub => {
            warn!(source = %source.id, "No adapter available for source, skipping");
            None
        }
    }
}

#[derive(Clone)]
pub struct SharedState {
    pub config: Arc<Config>,

    pub store: Store,

    pub cache: CatalogCache,

    pub registry: SourceRegistry,

    pub jobs: JobQueue,

    pub scheduler: Arc<RefreshScheduler>,

    pub metadata: Arc<MetadataService>,

    pub prober: Option<Arc<DurationProber>>,
}

impl SharedState {
    /// Connects the database and wires every enabled source. Jobs queued
    /// before [`SharedState::spawn_workers`] is called wait in the queue.
    pub async fn new(config: Config) -> anyhow::Result<(Self, JobReceiver)> {
        let store = Store::with_pool_options(
            &config.general.database_path,
            config.general.max_db_connections,
            config.general.min_db_connections,
        )
        .await?;

        let http_client = build_shared_http_client(config.general.request_timeout_seconds)?;

        let adapters = config
            .enabled_sources()
            .into_iter()
            .filter_map(|source| {
                build_adapter(&source, &http_client).map(|adapter| (source, adapter))
            })
            .collect();

        let provider: Option<Arc<dyn MetadataProvider>> = if config.metadata.enabled {
            Some(Arc::new(ShikimoriClient::with_shared_client(
                http_client,
                &config.metadata.base_url,
            )))
        } else {
            None
        };

        Self::assemble(config, store, adapters, provider)
    }

    /// Builds the state from ready-made parts.
    pub fn assemble(
        config: Config,
        store: Store,
        adapters: Vec<(SourceConfig, Arc<dyn SiteAdapter>)>,
        provider: Option<Arc<dyn MetadataProvider>>,
    ) -> anyhow::Result<(Self, JobReceiver)> {
        let cache_store: Arc<dyn CacheStore> = match config.cache.backend {
            CacheBackend::Database => Arc::new(DbCacheStore::new(store.clone())),
            CacheBackend::Memory => Arc::new(MemoryCacheStore::new(config.cache.memory_max_entries)),
        };
        let cache = CatalogCache::new(cache_store);
        let (jobs, receiver) = JobQueue::new();

        let metadata = Arc::new(MetadataService::new(
            cache.clone(),
            store.clone(),
            provider,
            jobs.clone(),
            config.metadata_settings(),
        ));

        let mut registry = SourceRegistry::new();
        for (source, adapter) in adapters {
            let settings = config.source_settings(&source);
            registry.register(Orchestrator::new(
                source.id,
                adapter,
                cache.clone(),
                store.clone(),
                jobs.clone(),
                metadata.clone(),
                settings,
            ));
        }
        info!("Registered {} catalog sources", registry.len());

        let scheduler = Arc::new(RefreshScheduler::new(
            registry.clone(),
            store.clone(),
            jobs.clone(),
            metadata.clone(),
        ));

        let prober = if config.probe.enabled {
            Some(Arc::new(DurationProber::new(Duration::from_secs(
                config.probe.timeout_seconds,
            ))?))
        } else {
            None
        };

        let state = Self {
            config: Arc::new(config),
            store,
            cache,
            registry,
            jobs,
            scheduler,
            metadata,
            prober,
        };
        Ok((state, receiver))
    }

    /// Starts the job workers that drain `receiver`.
    #[must_use]
    pub fn spawn_workers(&self, receiver: JobReceiver) -> WorkerPool {
        let dispatcher = Arc::new(CatalogDispatcher::new(
            self.registry.clone(),
            self.store.clone(),
            self.prober.clone(),
            self.scheduler.clone(),
            self.metadata.clone(),
            Duration::from_secs(self.config.jobs.check_retry_minutes * 60),
        ));
        spawn_workers(receiver, self.jobs.clone(), dispatcher, self.config.jobs.workers)
    }
}

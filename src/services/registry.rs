use super::orchestrator::{CatalogError, Orchestrator};
use crate::domain::SourceId;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Orchestrators of every enabled source, built once at startup.
#[derive(Clone, Default)]
pub struct SourceRegistry {
    sources: BTreeMap<SourceId, Arc<Orchestrator>>,
}

impl SourceRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `orchestrator` under its own source id, replacing any previous one.
    pub fn register(&mut self, orchestrator: Orchestrator) {
        self.sources
            .insert(orchestrator.source(), Arc::new(orchestrator));
    }

    /// # Errors
    ///
    /// Returns [`CatalogError::UnknownSource`] when `source` is not registered.
    pub fn get(&self, source: SourceId) -> Result<Arc<Orchestrator>, CatalogError> {
        self.sources
            .get(&source)
            .cloned()
            .ok_or_else(|| CatalogError::UnknownSource(source.to_string()))
    }

    /// Parses a path segment and looks the source up.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::UnknownSource`] for unparseable or
    /// unregistered ids.
    pub fn resolve(&self, raw: &str) -> Result<Arc<Orchestrator>, CatalogError> {
        let source = raw
            .parse::<SourceId>()
            .map_err(|e| CatalogError::UnknownSource(e.0))?;
        self.get(source)
    }

    #[must_use]
    pub fn contains(&self, source: SourceId) -> bool {
        self.sources.contains_key(&source)
    }

    pub fn ids(&self) -> impl Iterator<Item = SourceId> + '_ {
        self.sources.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Orchestrator>> {
        self.sources.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

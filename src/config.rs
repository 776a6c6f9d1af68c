use crate::domain::SourceId;
use crate::services::{MetadataSettings, SourceSettings};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

/// Prefix of environment variables that override file settings.
const ENV_PREFIX: &str = "ANICAT_";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,

    pub server: ServerConfig,

    pub cache: CacheConfig,

    pub catalog: CatalogConfig,

    pub sources: Vec<SourceConfig>,

    pub jobs: JobsConfig,

    pub probe: ProbeConfig,

    pub metadata: MetadataConfig,

    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub database_path: String,

    pub log_level: String,

    #[serde(default)]
    pub suppress_connection_errors: bool,

    /// Number of tokio worker threads (default: 2)
    /// Set to 0 to use the number of CPU cores
    pub worker_threads: usize,

    /// Maximum database connections (default: 5)
    pub max_db_connections: u32,

    /// Minimum database connections (default: 1)
    pub min_db_connections: u32,

    /// Timeout for requests to catalog websites and the metadata API.
    pub request_timeout_seconds: u64,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            database_path: "sqlite:data/anicat.db".to_string(),
            log_level: "info".to_string(),
            suppress_connection_errors: false,
            worker_threads: 2,
            max_db_connections: 5,
            min_db_connections: 1,
            request_timeout_seconds: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub enabled: bool,

    pub port: u16,

    pub cors_allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: 6790,
            cors_allowed_origins: vec![
                "http://localhost:6790".to_string(),
                "http://127.0.0.1:6790".to_string(),
            ],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    /// Entries live in the catalog database and survive restarts.
    #[default]
    Database,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub backend: CacheBackend,

    /// Capacity of the in-memory backend.
    pub memory_max_entries: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: CacheBackend::Database,
            memory_max_entries: 10_000,
        }
    }
}

/// Defaults shared by every source.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    pub titles_cache_hours: u64,

    pub genres_cache_hours: u64,

    pub main_pages_count: u32,

    /// Pause between listing pages during a full refresh.
    pub page_delay_ms: u64,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            titles_cache_hours: 6,
            genres_cache_hours: 168,
            main_pages_count: 3,
            page_delay_ms: 1500,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub id: SourceId,

    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Overrides the website API root.
    #[serde(default)]
    pub base_url: Option<String>,

    #[serde(default)]
    pub titles_cache_hours: Option<u64>,

    #[serde(default)]
    pub genres_cache_hours: Option<u64>,

    #[serde(default)]
    pub main_pages_count: Option<u32>,
}

const fn default_true() -> bool {
    true
}

impl SourceConfig {
    #[must_use]
    pub const fn new(id: SourceId) -> Self {
        Self {
            id,
            enabled: true,
            base_url: None,
            titles_cache_hours: None,
            genres_cache_hours: None,
            main_pages_count: None,
        }
    }
}

fn default_sources() -> Vec<SourceConfig> {
    vec![SourceConfig {
        titles_cache_hours: Some(12),
        ..SourceConfig::new(SourceId::Animevost)
    }]
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JobsConfig {
    pub workers: usize,

    /// Delay before a failed scheduled source check runs again.
    pub check_retry_minutes: u64,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            check_retry_minutes: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    pub enabled: bool,

    pub timeout_seconds: u64,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            timeout_seconds: 6,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataConfig {
    pub enabled: bool,

    pub base_url: String,

    pub expiration_hours: u64,

    pub fail_cooldown_minutes: u64,

    /// Titles looked up per scheduled refresh.
    pub backfill_batch: u64,
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: crate::clients::shikimori::SHIKIMORI_API.to_string(),
            expiration_hours: 7 * 24,
            fail_cooldown_minutes: 5,
            backfill_batch: 20,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    pub metrics_enabled: bool,

    pub loki_enabled: bool,

    pub loki_url: String,

    pub loki_labels: std::collections::HashMap<String, String>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        let mut labels = std::collections::HashMap::new();
        labels.insert("app".to_string(), "anicat".to_string());

        Self {
            metrics_enabled: true,
            loki_enabled: false,
            loki_url: "http://localhost:3100".to_string(),
            loki_labels: labels,
        }
    }
}

const fn hours(h: u64) -> Duration {
    Duration::from_secs(h * 3600)
}

impl Config {
    pub fn load() -> Result<Self> {
        let paths = Self::config_paths();

        let mut config = match paths.iter().find(|path| path.exists()) {
            Some(path) => {
                info!("Loading config from: {}", path.display());
                Self::load_from_path(path)?
            }
            None => {
                info!("No config file found, using defaults");
                Self::default()
            }
        };

        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Applies `ANICAT_*` overrides read through `lookup`.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(&format!("{ENV_PREFIX}{name}"));

        if let Some(value) = var("DATABASE_PATH") {
            self.general.database_path = value;
        }
        if let Some(value) = var("LOG_LEVEL") {
            self.general.log_level = value;
        }
        if let Some(value) = var("PORT") {
            self.server.port = value.parse().context("Invalid ANICAT_PORT")?;
        }
        if let Some(value) = var("CACHE_BACKEND") {
            self.cache.backend = match value.to_ascii_lowercase().as_str() {
                "database" | "db" => CacheBackend::Database,
                "memory" => CacheBackend::Memory,
                other => anyhow::bail!("Invalid ANICAT_CACHE_BACKEND: {other}"),
            };
        }
        if let Some(value) = var("JOB_WORKERS") {
            self.jobs.workers = value.parse().context("Invalid ANICAT_JOB_WORKERS")?;
        }
        if let Some(value) = var("METADATA_ENABLED") {
            self.metadata.enabled = value.parse().context("Invalid ANICAT_METADATA_ENABLED")?;
        }
        if let Some(value) = var("LOKI_URL") {
            self.observability.loki_enabled = true;
            self.observability.loki_url = value;
        }

        Ok(())
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::default_config_path();
        self.save_to_path(&path)
    }

    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Config saved to: {}", path.display());
        Ok(())
    }

    fn config_paths() -> Vec<PathBuf> {
        let mut paths = vec![];

        paths.push(PathBuf::from("config.toml"));

        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("anicat").join("config.toml"));
        }

        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".anicat").join("config.toml"));
        }

        paths
    }

    fn default_config_path() -> PathBuf {
        PathBuf::from("config.toml")
    }

    pub fn create_default_if_missing() -> Result<bool> {
        let path = Self::default_config_path();
        if path.exists() {
            Ok(false)
        } else {
            let config = Self {
                sources: default_sources(),
                ..Self::default()
            };
            config.save_to_path(&path)?;
            info!("Created default config file: {}", path.display());
            Ok(true)
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.catalog.titles_cache_hours == 0 || self.catalog.genres_cache_hours == 0 {
            anyhow::bail!("Catalog cache periods must be > 0");
        }

        if self.catalog.main_pages_count == 0 {
            anyhow::bail!("main_pages_count must be > 0");
        }

        for (index, source) in self.sources.iter().enumerate() {
            if self.sources[..index].iter().any(|s| s.id == source.id) {
                anyhow::bail!("Source '{}' is configured twice", source.id);
            }
            if source.titles_cache_hours == Some(0) || source.genres_cache_hours == Some(0) {
                anyhow::bail!("Cache periods of source '{}' must be > 0", source.id);
            }
            if source.main_pages_count == Some(0) {
                anyhow::bail!("main_pages_count of source '{}' must be > 0", source.id);
            }
        }

        if self.probe.enabled && self.probe.timeout_seconds == 0 {
            anyhow::bail!("Probe timeout must be > 0 when probing is enabled");
        }

        if self.metadata.enabled && self.metadata.base_url.is_empty() {
            anyhow::bail!("Metadata base URL cannot be empty when enabled");
        }

        Ok(())
    }

    /// Configured sources, or the built-in default list when none are set.
    #[must_use]
    pub fn enabled_sources(&self) -> Vec<SourceConfig> {
        let sources = if self.sources.is_empty() {
            default_sources()
        } else {
            self.sources.clone()
        };
        sources.into_iter().filter(|s| s.enabled).collect()
    }

    /// Effective settings of one source: its overrides on top of `[catalog]`.
    #[must_use]
    pub fn source_settings(&self, source: &SourceConfig) -> SourceSettings {
        SourceSettings {
            titles_period: hours(
                source
                    .titles_cache_hours
                    .unwrap_or(self.catalog.titles_cache_hours),
            ),
            genres_period: hours(
                source
                    .genres_cache_hours
                    .unwrap_or(self.catalog.genres_cache_hours),
            ),
            main_pages: source
                .main_pages_count
                .unwrap_or(self.catalog.main_pages_count),
            page_delay: Duration::from_millis(self.catalog.page_delay_ms),
            probe_durations: self.probe.enabled,
        }
    }

    #[must_use]
    pub const fn metadata_settings(&self) -> MetadataSettings {
        MetadataSettings {
            expiration: hours(self.metadata.expiration_hours),
            fail_cooldown: Duration::from_secs(self.metadata.fail_cooldown_minutes * 60),
            backfill_batch: self.metadata.backfill_batch,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.catalog.titles_cache_hours, 6);
        assert_eq!(config.catalog.genres_cache_hours, 168);
        assert_eq!(config.probe.timeout_seconds, 6);
        assert_eq!(config.cache.backend, CacheBackend::Database);
        assert!(config.validate().is_ok());

        let sources = config.enabled_sources();
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].id, SourceId::Animevost);
        assert_eq!(
            config.source_settings(&sources[0]).titles_period,
            Duration::from_secs(12 * 3600)
        );
    }

    #[test]
    fn test_config_serialization() {
        let config = Config {
            sources: default_sources(),
            ..Config::default()
        };
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[general]"));
        assert!(toml_str.contains("[catalog]"));
        assert!(toml_str.contains("[[sources]]"));

        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.sources.len(), 1);
        assert_eq!(parsed.sources[0].titles_cache_hours, Some(12));
        assert_eq!(parsed.server.port, config.server.port);
    }

    #[test]
    fn test_config_deserialization() {
        let toml_str = r#"
            [general]
            log_level = "debug"

            [catalog]
            main_pages_count = 5

            [cache]
            backend = "memory"

            [[sources]]
            id = "anidub"
            genres_cache_hours = 24
        "#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.general.log_level, "debug");
        assert_eq!(config.cache.backend, CacheBackend::Memory);

        let sources = config.enabled_sources();
        assert_eq!(sources.len(), 1);
        let settings = config.source_settings(&sources[0]);
        assert_eq!(settings.main_pages, 5);
        assert_eq!(settings.genres_period, Duration::from_secs(24 * 3600));
        assert_eq!(settings.titles_period, Duration::from_secs(6 * 3600));
    }

    #[test]
    fn env_overrides_replace_file_values() {
        let vars: HashMap<&str, &str> = [
            ("ANICAT_PORT", "8080"),
            ("ANICAT_CACHE_BACKEND", "memory"),
            ("ANICAT_JOB_WORKERS", "8"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config
            .apply_env_overrides(|key| vars.get(key).map(|v| (*v).to_string()))
            .unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.cache.backend, CacheBackend::Memory);
        assert_eq!(config.jobs.workers, 8);

        let mut broken = Config::default();
        assert!(
            broken
                .apply_env_overrides(|key| (key == "ANICAT_PORT").then(|| "x".to_string()))
                .is_err()
        );
    }

    #[test]
    fn rejects_duplicate_sources() {
        let config = Config {
            sources: vec![
                SourceConfig::new(SourceId::Animevost),
                SourceConfig::new(SourceId::Animevost),
            ],
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_zero_main_pages_override() {
        let mut config = Config {
            sources: vec![SourceConfig {
                main_pages_count: Some(0),
                ..SourceConfig::new(SourceId::Animevost)
            }],
            ..Config::default()
        };
        assert!(config.validate().is_err());

        config.sources[0].main_pages_count = Some(1);
        assert!(config.validate().is_ok());
    }
}

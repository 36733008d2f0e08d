//! The configuration surface: storage backend selection, cache sizing,
//! metadata store location, chunker tuning and GC scheduling. Persisted
//! as a single JSON document, locked and atomically replaced rather
//! than modeled as a repeatable, multi-section ini file, since this
//! engine only ever has one storage backend configured per process
//! rather than a directory of named datastores.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use sealock_types::{StorageError, StorageResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct StorageConfig {
    pub storage: StorageBackendConfig,
    pub chunker: ChunkerConfig,
    pub gc: GcConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct StorageBackendConfig {
    #[serde(rename = "type")]
    pub kind: StorageBackendKind,
    pub cache: CacheConfig,
    pub metadata: MetadataConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackendKind {
    Local,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CacheConfig {
    pub address: String,
    pub ttl_secs: u64,
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct MetadataConfig {
    /// Directory (or, for future backends, connection string) the
    /// metadata store persists its JSON records under.
    pub dsn: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkerMode {
    Fixed,
    Cdc,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ChunkerConfig {
    pub mode: ChunkerMode,
    pub fixed_size: usize,
    pub cdc_min: usize,
    pub cdc_avg: usize,
    pub cdc_max: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct GcConfig {
    pub interval_secs: u64,
}

impl GcConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig {
            storage: StorageBackendConfig {
                kind: StorageBackendKind::Local,
                cache: CacheConfig {
                    address: "memory://local".into(),
                    ttl_secs: 300,
                },
                metadata: MetadataConfig {
                    dsn: "./sealock-data/metadata".into(),
                },
            },
            chunker: ChunkerConfig {
                mode: ChunkerMode::Cdc,
                fixed_size: 8 * 1024,
                cdc_min: 4 * 1024,
                cdc_avg: 16 * 1024,
                cdc_max: 64 * 1024,
            },
            gc: GcConfig { interval_secs: 3600 },
        }
    }
}

/// Load the config at `path`, or the defaults if the file does not exist.
pub fn load(path: &Path) -> StorageResult<StorageConfig> {
    let raw = proxmox_sys::fs::file_read_optional_string(path)
        .map_err(|err| StorageError::Fatal(format!("reading config {path:?}: {err}")))?;

    match raw {
        Some(raw) => serde_json::from_str(&raw)
            .map_err(|err| StorageError::InvalidInput(format!("malformed config {path:?}: {err}"))),
        None => Ok(StorageConfig::default()),
    }
}

/// Atomically replace the config at `path`.
pub fn save(path: &Path, config: &StorageConfig) -> StorageResult<()> {
    let data = serde_json::to_vec_pretty(config)
        .map_err(|err| StorageError::Fatal(format!("serializing config: {err}")))?;

    proxmox_sys::fs::replace_file(path, &data, proxmox_sys::fs::CreateOptions::new(), true)
        .map_err(|err| StorageError::Transient(format!("writing config {path:?}: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_round_trips_through_json() {
        let config = StorageConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let parsed: StorageConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config.chunker.cdc_avg, parsed.chunker.cdc_avg);
        assert_eq!(config.storage.cache.ttl_secs, parsed.storage.cache.ttl_secs);
    }

    #[test]
    fn loading_missing_file_returns_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("does-not-exist.json");
        let config = load(&path).unwrap();
        assert_eq!(config.gc.interval_secs, StorageConfig::default().gc.interval_secs);
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("storage.json");

        let mut config = StorageConfig::default();
        config.chunker.cdc_avg = 32 * 1024;

        save(&path, &config).unwrap();
        let loaded = load(&path).unwrap();
        assert_eq!(loaded.chunker.cdc_avg, 32 * 1024);
    }

    #[test]
    fn rejects_malformed_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("storage.json");
        std::fs::write(&path, b"not json").unwrap();
        assert!(matches!(load(&path), Err(StorageError::InvalidInput(_))));
    }
}

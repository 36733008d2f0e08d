//! Configuration loading for the sealock storage engine.
//!
//! The config surface (storage backend, cache, chunker, GC) is a single
//! JSON document, locked and atomically replaced via `proxmox_sys::fs`.

pub mod storage;

pub use storage::{
    CacheConfig, ChunkerConfig, ChunkerMode, GcConfig, MetadataConfig, StorageBackendConfig,
    StorageBackendKind, StorageConfig,
};

use std::path::Path;
use std::time::Duration;

use sealock_types::{StorageError, StorageResult};

/// Holds the advisory lock on the config file for the lifetime of a
/// read-modify-write cycle; dropping it releases the lock.
pub struct ConfigLockGuard(#[allow(dead_code)] std::fs::File);

/// Lock the config file for exclusive read-modify-write access, creating
/// it (empty) first if it doesn't exist yet.
pub fn lock_config_file<P: AsRef<Path>>(path: P) -> StorageResult<ConfigLockGuard> {
    let file = proxmox_sys::fs::open_file_locked(
        path,
        Duration::from_secs(10),
        true,
        proxmox_sys::fs::CreateOptions::new(),
    )
    .map_err(|err| StorageError::Transient(format!("locking config file: {err}")))?;

    Ok(ConfigLockGuard(file))
}

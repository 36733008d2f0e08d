use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use log::info;

use sealock::FileService;
use sealock_store::{CachedBlockStore, LocalBlockStore};

fn main() -> Result<()> {
    if std::env::var_os("RUST_LOG").is_none() {
        std::env::set_var("RUST_LOG", "info");
    }
    env_logger::init();

    let config_path = std::env::var_os("SEALOCK_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("/etc/sealock/storage.json"));

    let config = sealock_config::storage::load(&config_path)
        .with_context(|| format!("loading config from {config_path:?}"))?;

    info!("sealock {} ({}) starting", env!("CARGO_PKG_VERSION"), env!("REPOID"));

    let base = PathBuf::from(&config.storage.metadata.dsn);
    let blocks = LocalBlockStore::open(&base).context("opening block store")?;
    let cached = CachedBlockStore::new(blocks, 4096, config.storage.cache.ttl());

    let metadata = sealock_metadata::MetadataStore::open(&base).context("opening metadata store")?;
    let upload = sealock_upload::UploadCoordinator::new(Duration::from_secs(3600));

    let service = Arc::new(FileService::new(base, cached, metadata, upload, config.chunker.clone()));

    let gc_interval = config.gc.interval();
    {
        let service = Arc::clone(&service);
        std::thread::spawn(move || loop {
            std::thread::sleep(gc_interval);
            let status = service.run_gc();
            info!(
                "gc pass: scanned {} removed {} ({} bytes) pending {}",
                status.scanned_blocks, status.removed_chunks, status.removed_bytes, status.pending_chunks
            );
        });
    }

    info!("sealock ready, gc interval {}s", config.gc.interval_secs);

    // The HTTP/API surface that would drive `service` from the outside
    // sits outside this engine's scope; see DESIGN.md.
    let _ = service;
    Ok(())
}

//! Garbage collection. Orphaned blocks are known the instant the
//! metadata store's ref count for them reaches zero -- no scanning, no
//! atime, no grace-period floor. A sweep just drains that candidate set.
//!
//! A block failing to delete (e.g. a transient I/O error) is left in place
//! with its metadata row intact, so the next sweep retries it rather than
//! losing track of it.

use sealock_metadata::MetadataStore;
use sealock_store::BlockStore;
use sealock_types::GarbageCollectionStatus;

pub fn run<B: BlockStore>(blocks: &B, metadata: &MetadataStore) -> GarbageCollectionStatus {
    let started_at = proxmox_time::epoch_i64();
    let orphans = metadata.list_orphan_blocks();

    let mut status = GarbageCollectionStatus {
        scanned_blocks: orphans.len() as u64,
        started_at,
        ..Default::default()
    };

    for block in orphans {
        match blocks.delete(&block.digest) {
            Ok(()) => {
                let _ = metadata.remove_block(&block.digest);
                status.removed_chunks += 1;
                status.removed_bytes += block.size;
            }
            Err(_) => {
                status.pending_chunks += 1;
            }
        }
    }

    status.finished_at = proxmox_time::epoch_i64();
    status
}

use serde::{Deserialize, Serialize};

/// Result of one garbage-collection sweep. Mirrors the shape of a
/// typical content-addressed store's GC report: counts moved into the
/// `removed_*` fields are blocks that were actually unlinked from the
/// block store, never blocks that merely looked orphaned.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct GarbageCollectionStatus {
    /// Blocks examined during the sweep.
    pub scanned_blocks: u64,
    /// Blocks with ref_count == 0 that were not claimed by any in-flight
    /// upload session and were deleted from the block store.
    pub removed_chunks: u64,
    /// Bytes freed by `removed_chunks`.
    pub removed_bytes: u64,
    /// Orphan candidates that were skipped because a live upload session
    /// still claims the digest.
    pub pending_chunks: u64,
    pub started_at: i64,
    pub finished_at: i64,
}

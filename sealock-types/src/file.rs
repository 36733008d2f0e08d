use proxmox_uuid::Uuid;
use serde::{Deserialize, Serialize};

use crate::digest::Digest;

/// A file owns its ordered block-digest list, but not the blocks
/// themselves -- those are shared and ref-counted (see [`crate::block`]).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct FileRecord {
    pub id: u64,
    pub uuid: Uuid,
    pub name: String,
    pub size: u64,
    pub content_digest: Digest,
    pub block_digests: Vec<Digest>,
    pub library_id: u64,
    pub created_at: i64,
    pub updated_at: i64,
}

impl FileRecord {
    /// `size` must always equal the sum of the sizes of `block_digests`;
    /// callers construct this only through the metadata store, which
    /// enforces that invariant at insert time.
    pub fn block_count(&self) -> usize {
        self.block_digests.len()
    }
}

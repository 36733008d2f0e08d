use serde::{Deserialize, Serialize};

use crate::digest::Digest;

/// Metadata row for one physical block. The payload itself lives in the
/// block store; this is the ref-counted bookkeeping side.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct BlockRecord {
    pub digest: Digest,
    pub size: u64,
    pub ref_count: u64,
    pub created_at: i64,
}

impl BlockRecord {
    pub fn is_orphan(&self) -> bool {
        self.ref_count == 0
    }
}

use proxmox_uuid::Uuid;
use serde::{Deserialize, Serialize};

use crate::digest::Digest;

/// An immutable manifest of (path -> file-digest) at one point in time.
/// `root_digest` is the Merkle root over the directory layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SnapshotRecord {
    pub id: u64,
    pub uuid: Uuid,
    pub name: String,
    pub description: String,
    pub parent_id: Option<u64>,
    pub root_digest: Digest,
    pub file_count: u64,
    pub size: u64,
    pub created_at: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotFileStatus {
    Active,
    Removed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SnapshotFileRecord {
    pub snapshot_id: u64,
    pub file_id: u64,
    pub file_name: String,
    pub file_digest: Digest,
    pub status: SnapshotFileStatus,
}

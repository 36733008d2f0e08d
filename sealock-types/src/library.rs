use proxmox_uuid::Uuid;
use serde::{Deserialize, Serialize};

use crate::digest::Digest;

/// Top level container for files, versions and snapshots.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct LibraryRecord {
    pub id: u64,
    pub uuid: Uuid,
    pub name: String,
    pub owner: String,
    pub current_version: Option<Digest>,
    pub file_count: u64,
    pub total_size: u64,
    pub created_at: i64,
}

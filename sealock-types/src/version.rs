use serde::{Deserialize, Serialize};

use crate::digest::Digest;

/// A node in the commit DAG. `parents` is empty for the first commit of a
/// library, has one entry for a fast-forward, and two or more for a merge.
/// Referenced by digest only -- never by an in-memory pointer -- so the DAG
/// has no cyclic back-references to manage.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct VersionRecord {
    pub commit_digest: Digest,
    pub library_id: u64,
    pub root_tree_digest: Digest,
    pub message: String,
    pub author: String,
    pub parents: Vec<Digest>,
    pub created_at: i64,
}

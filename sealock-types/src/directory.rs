use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::digest::Digest;

/// Recursive directory layout node used as input to the Merkle engine.
/// `children` is only meaningful for `is_dir == true` and must be sorted by
/// name before hashing; [`DirectoryEntry::sorted`] enforces that.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct DirectoryEntry {
    pub name: String,
    pub is_dir: bool,
    pub content_digest: Digest,
    pub size: u64,
    #[serde(default)]
    pub children: Vec<DirectoryEntry>,
}

impl DirectoryEntry {
    pub fn leaf(name: impl Into<String>, content_digest: Digest, size: u64) -> Self {
        DirectoryEntry {
            name: name.into(),
            is_dir: false,
            content_digest,
            size,
            children: Vec::new(),
        }
    }

    pub fn dir(name: impl Into<String>, content_digest: Digest, children: Vec<DirectoryEntry>) -> Self {
        let size = children.iter().map(|c| c.size).sum();
        DirectoryEntry {
            name: name.into(),
            is_dir: true,
            content_digest,
            size,
            children,
        }
    }
}

/// The outcome of comparing two snapshots' directory layouts.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct DirectoryDiff {
    pub added: BTreeMap<String, Digest>,
    pub removed: BTreeMap<String, Digest>,
    /// name -> (old digest, new digest)
    pub modified: BTreeMap<String, (Digest, Digest)>,
}

impl DirectoryDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.modified.is_empty()
    }
}

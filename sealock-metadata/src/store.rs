//! The metadata store. Tracks everything about blocks, files,
//! libraries, version commits and snapshots *except* the block payloads
//! themselves (those live in `sealock-store`'s block store). Ref-counting
//! here is what garbage collection reads to find orphaned blocks --
//! a block is a GC candidate the instant its count reaches zero, never
//! based on access time.
//!
//! Persisted as one JSON document under `base`, written via an atomic
//! temp-file-plus-rename, without any privilege-separation or file
//! ownership model -- this engine's deployment doesn't need one.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use sealock_types::{BlockRecord, Digest, FileRecord, LibraryRecord, SnapshotRecord, StorageError, StorageResult, VersionRecord};

#[derive(Default, Serialize, Deserialize)]
struct MetadataState {
    blocks: HashMap<Digest, BlockRecord>,
    files: HashMap<u64, FileRecord>,
    next_file_id: u64,
    libraries: HashMap<u64, LibraryRecord>,
    next_library_id: u64,
    versions: HashMap<Digest, VersionRecord>,
    snapshots: HashMap<u64, SnapshotRecord>,
    next_snapshot_id: u64,
}

pub struct MetadataStore {
    base: PathBuf,
    state: Mutex<MetadataState>,
}

fn state_path(base: &Path) -> PathBuf {
    base.join("metadata-state.json")
}

impl MetadataStore {
    pub fn open<P: Into<PathBuf>>(base: P) -> StorageResult<Self> {
        let base: PathBuf = base.into();
        std::fs::create_dir_all(&base)
            .map_err(|err| StorageError::Fatal(format!("creating metadata dir {base:?}: {err}")))?;

        let path = state_path(&base);
        let state = match proxmox_sys::fs::file_read_optional_string(&path)
            .map_err(|err| StorageError::Fatal(format!("reading metadata state {path:?}: {err}")))?
        {
            Some(raw) => serde_json::from_str(&raw)
                .map_err(|err| StorageError::Fatal(format!("corrupt metadata state {path:?}: {err}")))?,
            None => MetadataState::default(),
        };

        Ok(MetadataStore {
            base,
            state: Mutex::new(state),
        })
    }

    fn persist(&self, state: &MetadataState) -> StorageResult<()> {
        let data = serde_json::to_vec(state)
            .map_err(|err| StorageError::Fatal(format!("serializing metadata state: {err}")))?;
        proxmox_sys::fs::replace_file(state_path(&self.base), &data, proxmox_sys::fs::CreateOptions::new(), true)
            .map_err(|err| StorageError::Transient(format!("persisting metadata state: {err}")))
    }

    // -- blocks --------------------------------------------------------

    /// Record a new reference to `digest`, creating its row with
    /// `ref_count == 1` if this is the first one seen.
    pub fn incr_block_ref(&self, digest: Digest, size: u64, created_at: i64) -> StorageResult<BlockRecord> {
        let mut state = self.state.lock().unwrap();
        let record = state
            .blocks
            .entry(digest)
            .or_insert_with(|| BlockRecord {
                digest,
                size,
                ref_count: 0,
                created_at,
            })
            .clone();
        let record = BlockRecord {
            ref_count: record.ref_count + 1,
            ..record
        };
        state.blocks.insert(digest, record.clone());
        self.persist(&state)?;
        Ok(record)
    }

    /// Drop one reference to `digest`. The row is kept (with
    /// `ref_count == 0`) rather than deleted -- deletion from the block
    /// store and metadata is garbage collection's job, not this call's.
    pub fn decr_block_ref(&self, digest: &Digest) -> StorageResult<BlockRecord> {
        let mut state = self.state.lock().unwrap();
        let record = state
            .blocks
            .get(digest)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(format!("block {digest}")))?;
        let record = BlockRecord {
            ref_count: record.ref_count.saturating_sub(1),
            ..record
        };
        state.blocks.insert(*digest, record.clone());
        self.persist(&state)?;
        Ok(record)
    }

    pub fn get_block(&self, digest: &Digest) -> StorageResult<BlockRecord> {
        let state = self.state.lock().unwrap();
        state
            .blocks
            .get(digest)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(format!("block {digest}")))
    }

    /// Blocks with `ref_count == 0`, the candidate set for collection.
    pub fn list_orphan_blocks(&self) -> Vec<BlockRecord> {
        let state = self.state.lock().unwrap();
        state.blocks.values().filter(|b| b.is_orphan()).cloned().collect()
    }

    /// Drop a block's metadata row entirely. Only valid once GC has
    /// confirmed the underlying bytes were deleted from the block store.
    pub fn remove_block(&self, digest: &Digest) -> StorageResult<()> {
        let mut state = self.state.lock().unwrap();
        state.blocks.remove(digest);
        self.persist(&state)
    }

    // -- files -----------------------------------------------------------

    /// Insert a file record, assigning it a fresh id if `record.id == 0`.
    pub fn insert_file(&self, mut record: FileRecord) -> StorageResult<FileRecord> {
        let mut state = self.state.lock().unwrap();
        if record.id == 0 {
            state.next_file_id += 1;
            record.id = state.next_file_id;
        }
        state.files.insert(record.id, record.clone());
        self.persist(&state)?;
        Ok(record)
    }

    pub fn get_file(&self, id: u64) -> StorageResult<FileRecord> {
        let state = self.state.lock().unwrap();
        state.files.get(&id).cloned().ok_or_else(|| StorageError::NotFound(format!("file {id}")))
    }

    /// Look up an existing file by its whole-content digest -- the
    /// dedup check the upload coordinator's `check` operation uses.
    pub fn find_file_by_content_digest(&self, digest: &Digest) -> Option<FileRecord> {
        let state = self.state.lock().unwrap();
        state.files.values().find(|f| f.content_digest == *digest).cloned()
    }

    pub fn delete_file(&self, id: u64) -> StorageResult<FileRecord> {
        let mut state = self.state.lock().unwrap();
        let record = state
            .files
            .remove(&id)
            .ok_or_else(|| StorageError::NotFound(format!("file {id}")))?;
        self.persist(&state)?;
        Ok(record)
    }

    pub fn list_files_for_library(&self, library_id: u64) -> Vec<FileRecord> {
        let state = self.state.lock().unwrap();
        let mut files: Vec<_> = state.files.values().filter(|f| f.library_id == library_id).cloned().collect();
        files.sort_by_key(|f| f.id);
        files
    }

    // -- libraries ---------------------------------------------------------

    pub fn insert_library(&self, mut record: LibraryRecord) -> StorageResult<LibraryRecord> {
        let mut state = self.state.lock().unwrap();
        if record.id == 0 {
            state.next_library_id += 1;
            record.id = state.next_library_id;
        }
        state.libraries.insert(record.id, record.clone());
        self.persist(&state)?;
        Ok(record)
    }

    pub fn get_library(&self, id: u64) -> StorageResult<LibraryRecord> {
        let state = self.state.lock().unwrap();
        state.libraries.get(&id).cloned().ok_or_else(|| StorageError::NotFound(format!("library {id}")))
    }

    pub fn update_library(&self, record: LibraryRecord) -> StorageResult<LibraryRecord> {
        let mut state = self.state.lock().unwrap();
        if !state.libraries.contains_key(&record.id) {
            return Err(StorageError::NotFound(format!("library {}", record.id)));
        }
        state.libraries.insert(record.id, record.clone());
        self.persist(&state)?;
        Ok(record)
    }

    // -- version commits -----------------------------------------------

    pub fn insert_version(&self, record: VersionRecord) -> StorageResult<VersionRecord> {
        let mut state = self.state.lock().unwrap();
        state.versions.insert(record.commit_digest, record.clone());
        self.persist(&state)?;
        Ok(record)
    }

    pub fn get_version(&self, digest: &Digest) -> StorageResult<VersionRecord> {
        let state = self.state.lock().unwrap();
        state.versions.get(digest).cloned().ok_or_else(|| StorageError::NotFound(format!("version {digest}")))
    }

    /// Commits for one library, newest first.
    pub fn list_versions_for_library(&self, library_id: u64) -> Vec<VersionRecord> {
        let state = self.state.lock().unwrap();
        let mut versions: BTreeMap<i64, VersionRecord> = BTreeMap::new();
        for v in state.versions.values().filter(|v| v.library_id == library_id) {
            versions.insert(v.created_at, v.clone());
        }
        versions.into_values().rev().collect()
    }

    // -- snapshots -------------------------------------------------------

    pub fn insert_snapshot(&self, mut record: SnapshotRecord) -> StorageResult<SnapshotRecord> {
        let mut state = self.state.lock().unwrap();
        if record.id == 0 {
            state.next_snapshot_id += 1;
            record.id = state.next_snapshot_id;
        }
        state.snapshots.insert(record.id, record.clone());
        self.persist(&state)?;
        Ok(record)
    }

    pub fn get_snapshot(&self, id: u64) -> StorageResult<SnapshotRecord> {
        let state = self.state.lock().unwrap();
        state.snapshots.get(&id).cloned().ok_or_else(|| StorageError::NotFound(format!("snapshot {id}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proxmox_uuid::Uuid;

    fn temp_store() -> (tempfile::TempDir, MetadataStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = MetadataStore::open(dir.path()).unwrap();
        (dir, store)
    }

    fn digest(byte: u8) -> Digest {
        Digest::from_bytes([byte; 32])
    }

    #[test]
    fn block_ref_counting_is_conserved() {
        let (_dir, store) = temp_store();
        let d = digest(1);

        let rec = store.incr_block_ref(d, 100, 0).unwrap();
        assert_eq!(rec.ref_count, 1);
        let rec = store.incr_block_ref(d, 100, 0).unwrap();
        assert_eq!(rec.ref_count, 2);

        let rec = store.decr_block_ref(&d).unwrap();
        assert_eq!(rec.ref_count, 1);
        assert!(!rec.is_orphan());

        let rec = store.decr_block_ref(&d).unwrap();
        assert_eq!(rec.ref_count, 0);
        assert!(rec.is_orphan());

        assert_eq!(store.list_orphan_blocks().len(), 1);
    }

    #[test]
    fn orphan_block_is_not_listed_once_removed() {
        let (_dir, store) = temp_store();
        let d = digest(2);
        store.incr_block_ref(d, 10, 0).unwrap();
        store.decr_block_ref(&d).unwrap();
        assert_eq!(store.list_orphan_blocks().len(), 1);

        store.remove_block(&d).unwrap();
        assert_eq!(store.list_orphan_blocks().len(), 0);
        assert!(matches!(store.get_block(&d), Err(StorageError::NotFound(_))));
    }

    #[test]
    fn file_insert_assigns_sequential_ids() {
        let (_dir, store) = temp_store();
        let base = FileRecord {
            id: 0,
            uuid: Uuid::generate(),
            name: "a.txt".into(),
            size: 0,
            content_digest: digest(3),
            block_digests: vec![],
            library_id: 1,
            created_at: 0,
            updated_at: 0,
        };

        let f1 = store.insert_file(base.clone()).unwrap();
        let f2 = store.insert_file(base).unwrap();
        assert_ne!(f1.id, f2.id);
    }

    #[test]
    fn find_file_by_content_digest_locates_dedup_candidate() {
        let (_dir, store) = temp_store();
        let d = digest(4);
        let record = FileRecord {
            id: 0,
            uuid: Uuid::generate(),
            name: "a.txt".into(),
            size: 0,
            content_digest: d,
            block_digests: vec![],
            library_id: 1,
            created_at: 0,
            updated_at: 0,
        };
        let inserted = store.insert_file(record).unwrap();
        let found = store.find_file_by_content_digest(&d).unwrap();
        assert_eq!(found.id, inserted.id);
        assert!(store.find_file_by_content_digest(&digest(99)).is_none());
    }

    #[test]
    fn state_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let d = digest(5);
        {
            let store = MetadataStore::open(dir.path()).unwrap();
            store.incr_block_ref(d, 42, 0).unwrap();
        }
        let store = MetadataStore::open(dir.path()).unwrap();
        assert_eq!(store.get_block(&d).unwrap().size, 42);
    }

    #[test]
    fn versions_list_newest_first() {
        let (_dir, store) = temp_store();
        for (i, t) in [10, 30, 20].into_iter().enumerate() {
            store
                .insert_version(VersionRecord {
                    commit_digest: digest(i as u8 + 1),
                    library_id: 1,
                    root_tree_digest: digest(0),
                    message: "m".into(),
                    author: "a".into(),
                    parents: vec![],
                    created_at: t,
                })
                .unwrap();
        }
        let versions = store.list_versions_for_library(1);
        let timestamps: Vec<_> = versions.iter().map(|v| v.created_at).collect();
        assert_eq!(timestamps, vec![30, 20, 10]);
    }
}

//! The file service facade. Orchestrates upload, download, delete,
//! snapshot and diff operations across the chunker, block store, cache,
//! metadata store, garbage collector and Merkle engine without any of
//! those modules knowing about each other.

use std::path::{Path, PathBuf};

use sealock_config::ChunkerConfig;
use sealock_metadata::MetadataStore;
use sealock_store::chunker::{CdcChunker, FixedChunker};
use sealock_store::{digest, merkle, BlockStore};
use sealock_types::{
    ChunkStatus, Digest, DirectoryDiff, DirectoryEntry, FileRecord, LibraryRecord,
    SnapshotRecord, StorageError, StorageResult, UploadCheckResponse, UploadChunkRequest,
    UploadChunkResponse, UploadFinishRequest, UploadFinishResponse, VersionRecord,
};
use sealock_upload::UploadCoordinator;

use crate::gc;

pub struct FileService<B> {
    base: PathBuf,
    blocks: B,
    metadata: MetadataStore,
    upload: UploadCoordinator,
    chunker: ChunkerConfig,
}

impl<B: BlockStore> FileService<B> {
    pub fn new(
        base: impl Into<PathBuf>,
        blocks: B,
        metadata: MetadataStore,
        upload: UploadCoordinator,
        chunker: ChunkerConfig,
    ) -> Self {
        FileService {
            base: base.into(),
            blocks,
            metadata,
            upload,
            chunker,
        }
    }

    fn snapshot_tree_path(&self, snapshot_id: u64) -> PathBuf {
        self.base.join("snapshots").join(format!("{snapshot_id}.json"))
    }

    fn now(&self) -> i64 {
        proxmox_time::epoch_i64()
    }

    // -- libraries -----------------------------------------------------

    pub fn create_library(&self, name: &str, owner: &str) -> StorageResult<LibraryRecord> {
        self.metadata.insert_library(LibraryRecord {
            id: 0,
            uuid: proxmox_uuid::Uuid::generate(),
            name: name.to_string(),
            owner: owner.to_string(),
            current_version: None,
            file_count: 0,
            total_size: 0,
            created_at: self.now(),
        })
    }

    pub fn get_library(&self, id: u64) -> StorageResult<LibraryRecord> {
        self.metadata.get_library(id)
    }

    // -- chunking --------------------------------------------------------

    /// Split `data` into content-addressed blocks per the configured
    /// chunker, without writing anything -- used by callers that want to
    /// drive the upload protocol (check/put_chunk/finish) themselves.
    pub fn split_into_chunks<'a>(&self, data: &'a [u8]) -> Vec<&'a [u8]> {
        match self.chunker.mode {
            sealock_config::ChunkerMode::Fixed => {
                let mut chunker = FixedChunker::new(self.chunker.fixed_size);
                chunker.chunks(data).map(|(off, len)| &data[off..off + len]).collect()
            }
            sealock_config::ChunkerMode::Cdc => {
                let mut chunker = CdcChunker::new(self.chunker.cdc_min, self.chunker.cdc_avg, self.chunker.cdc_max);
                chunker.chunks(data).map(|(off, len)| &data[off..off + len]).collect()
            }
        }
    }

    // -- uploads -----------------------------------------------------

    /// `GET /upload/check`: report whether a file with this whole-content
    /// digest already exists (letting the client skip the upload
    /// entirely), or hand back a fresh session id to upload against.
    pub fn check_upload(&self, library_id: u64, file_hash: Digest, total_chunks: u32) -> StorageResult<UploadCheckResponse> {
        if let Some(file) = self.metadata.find_file_by_content_digest(&file_hash) {
            return Ok(UploadCheckResponse {
                exists: true,
                file: Some(file),
                upload_id: None,
            });
        }
        let upload_id = self.upload.open(file_hash, total_chunks, library_id);
        Ok(UploadCheckResponse {
            exists: false,
            file: None,
            upload_id: Some(upload_id),
        })
    }

    /// `POST /upload/chunk`: verify and store one chunk, then record it
    /// against the session.
    pub fn put_chunk(&self, request: &UploadChunkRequest, data: &[u8]) -> StorageResult<UploadChunkResponse> {
        let computed = digest::hash_bytes(data);
        if computed != request.chunk_hash {
            return Err(StorageError::InvalidInput(format!(
                "chunk {} hash mismatch: expected {}, got {computed}",
                request.chunk_index, request.chunk_hash
            )));
        }

        let status = self.upload.put_chunk(&request.upload_id, request.chunk_index, request.chunk_hash)?;

        if status == ChunkStatus::Received {
            self.blocks.put(&request.chunk_hash, data)?;
            self.metadata.incr_block_ref(request.chunk_hash, data.len() as u64, self.now())?;
        }

        Ok(UploadChunkResponse {
            chunk_index: request.chunk_index,
            status,
        })
    }

    /// `POST /upload/finish`: commit the session and materialize the
    /// finished [`FileRecord`].
    pub fn finish_upload(&self, request: &UploadFinishRequest) -> StorageResult<UploadFinishResponse> {
        let info = self.upload.info(&request.upload_id)?;

        let ordered = self.upload.finalize(&request.upload_id)?;
        if ordered != request.chunk_hashes {
            return Err(StorageError::InvalidInput(
                "finish request's chunk list does not match what was uploaded".into(),
            ));
        }

        let content_digest = digest::combine(ordered.iter());
        if content_digest != request.file_hash {
            return Err(StorageError::InvalidInput(format!(
                "file hash mismatch: expected {}, assembled {content_digest}",
                request.file_hash
            )));
        }

        let now = self.now();
        let record = self.metadata.insert_file(FileRecord {
            id: 0,
            uuid: proxmox_uuid::Uuid::generate(),
            name: request.file_name.clone(),
            size: request.file_size,
            content_digest,
            block_digests: ordered,
            library_id: info.library_id,
            created_at: now,
            updated_at: now,
        })?;

        let mut library = self.metadata.get_library(info.library_id)?;
        library.file_count += 1;
        library.total_size += record.size;
        self.metadata.update_library(library)?;

        Ok(UploadFinishResponse { file: record })
    }

    pub fn missing_chunks(&self, upload_id: &str) -> StorageResult<Vec<u32>> {
        self.upload.missing(upload_id)
    }

    pub fn cancel_upload(&self, upload_id: &str) -> StorageResult<()> {
        self.upload.cancel(upload_id)
    }

    // -- download / delete -----------------------------------------------

    pub fn download_file(&self, file_id: u64) -> StorageResult<Vec<u8>> {
        let file = self.metadata.get_file(file_id)?;
        let mut data = Vec::with_capacity(file.size as usize);
        for digest in &file.block_digests {
            data.extend_from_slice(&self.blocks.get(digest)?);
        }
        Ok(data)
    }

    pub fn delete_file(&self, file_id: u64) -> StorageResult<()> {
        let file = self.metadata.delete_file(file_id)?;
        for digest in &file.block_digests {
            self.metadata.decr_block_ref(digest)?;
        }

        let mut library = self.metadata.get_library(file.library_id)?;
        library.file_count = library.file_count.saturating_sub(1);
        library.total_size = library.total_size.saturating_sub(file.size);
        self.metadata.update_library(library)?;

        Ok(())
    }

    // -- snapshots and diff ----------------------------------------------

    fn count_files(tree: &DirectoryEntry) -> u64 {
        if tree.is_dir {
            tree.children.iter().map(Self::count_files).sum()
        } else {
            1
        }
    }

    /// Commit a directory tree (already built via `sealock_store::merkle`)
    /// as a named snapshot.
    pub fn create_snapshot(
        &self,
        name: &str,
        description: &str,
        parent_id: Option<u64>,
        tree: &DirectoryEntry,
    ) -> StorageResult<SnapshotRecord> {
        let record = self.metadata.insert_snapshot(SnapshotRecord {
            id: 0,
            uuid: proxmox_uuid::Uuid::generate(),
            name: name.to_string(),
            description: description.to_string(),
            parent_id,
            root_digest: tree.content_digest,
            file_count: Self::count_files(tree),
            size: tree.size,
            created_at: self.now(),
        })?;

        self.persist_snapshot_tree(record.id, tree)?;
        Ok(record)
    }

    fn persist_snapshot_tree(&self, snapshot_id: u64, tree: &DirectoryEntry) -> StorageResult<()> {
        let path = self.snapshot_tree_path(snapshot_id);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|err| StorageError::Fatal(format!("creating snapshot dir {parent:?}: {err}")))?;
        }
        let data = serde_json::to_vec(tree)
            .map_err(|err| StorageError::Fatal(format!("serializing snapshot tree: {err}")))?;
        proxmox_sys::fs::replace_file(&path, &data, proxmox_sys::fs::CreateOptions::new(), true)
            .map_err(|err| StorageError::Transient(format!("writing snapshot tree {path:?}: {err}")))
    }

    pub fn get_snapshot(&self, snapshot_id: u64) -> StorageResult<SnapshotRecord> {
        self.metadata.get_snapshot(snapshot_id)
    }

    pub fn get_snapshot_tree(&self, snapshot_id: u64) -> StorageResult<DirectoryEntry> {
        let path = self.snapshot_tree_path(snapshot_id);
        let raw = std::fs::read(&path).map_err(|err| {
            if err.kind() == std::io::ErrorKind::NotFound {
                StorageError::NotFound(format!("snapshot tree {snapshot_id}"))
            } else {
                StorageError::Transient(format!("reading snapshot tree {path:?}: {err}"))
            }
        })?;
        serde_json::from_slice(&raw)
            .map_err(|err| StorageError::Fatal(format!("corrupt snapshot tree {path:?}: {err}")))
    }

    pub fn diff_snapshots(&self, old_id: u64, new_id: u64) -> StorageResult<DirectoryDiff> {
        let old_tree = self.get_snapshot_tree(old_id)?;
        let new_tree = self.get_snapshot_tree(new_id)?;
        Ok(merkle::diff(&old_tree, &new_tree))
    }

    // -- version commits (Git-like DAG) -----------------------------------

    fn commit_digest(root_tree_digest: &Digest, parents: &[Digest], message: &str, author: &str, created_at: i64) -> Digest {
        let mut buf = Vec::new();
        buf.extend_from_slice(root_tree_digest.as_bytes());
        for parent in parents {
            buf.extend_from_slice(parent.as_bytes());
        }
        buf.extend_from_slice(message.as_bytes());
        buf.extend_from_slice(author.as_bytes());
        buf.extend_from_slice(&created_at.to_le_bytes());
        digest::hash_bytes(&buf)
    }

    pub fn commit_version(
        &self,
        library_id: u64,
        root_tree_digest: Digest,
        message: &str,
        author: &str,
        parents: Vec<Digest>,
    ) -> StorageResult<VersionRecord> {
        let created_at = self.now();
        let commit_digest = Self::commit_digest(&root_tree_digest, &parents, message, author, created_at);

        let record = self.metadata.insert_version(VersionRecord {
            commit_digest,
            library_id,
            root_tree_digest,
            message: message.to_string(),
            author: author.to_string(),
            parents,
            created_at,
        })?;

        let mut library = self.metadata.get_library(library_id)?;
        library.current_version = Some(record.commit_digest);
        self.metadata.update_library(library)?;

        Ok(record)
    }

    pub fn list_versions(&self, library_id: u64) -> Vec<VersionRecord> {
        self.metadata.list_versions_for_library(library_id)
    }

    // -- garbage collection ------------------------------------------------

    pub fn run_gc(&self) -> sealock_types::GarbageCollectionStatus {
        gc::run(&self.blocks, &self.metadata)
    }

    pub fn base_dir(&self) -> &Path {
        &self.base
    }
}

//! Shared data types for the sealock content-addressed storage engine.
//!
//! This crate carries no behavior: it is the common vocabulary (digests,
//! records, error taxonomy, HTTP contract DTOs) that every other sealock
//! crate builds on, the same role `pbs-api-types` plays for PBS.

pub mod block;
pub mod digest;
pub mod directory;
pub mod error;
pub mod file;
pub mod gc;
pub mod library;
pub mod snapshot;
pub mod upload;
pub mod version;

pub use block::BlockRecord;
pub use digest::Digest;
pub use directory::{DirectoryDiff, DirectoryEntry};
pub use error::{StorageError, StorageResult};
pub use file::FileRecord;
pub use gc::GarbageCollectionStatus;
pub use library::LibraryRecord;
pub use snapshot::{SnapshotFileRecord, SnapshotFileStatus, SnapshotRecord};
pub use upload::{
    ChunkStatus, UploadCheckResponse, UploadChunkRequest, UploadChunkResponse,
    UploadFinishRequest, UploadFinishResponse,
};
pub use version::VersionRecord;

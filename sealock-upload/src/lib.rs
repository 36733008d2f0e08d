//! Resumable chunked upload session coordination.

pub mod coordinator;

pub use coordinator::{UploadCoordinator, UploadSession, UploadSessionInfo, UploadState};

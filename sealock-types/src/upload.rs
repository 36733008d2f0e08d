use serde::{Deserialize, Serialize};

use crate::digest::Digest;
use crate::file::FileRecord;

/// `GET /upload/check?fileHash=<hex64>`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadCheckResponse {
    pub exists: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<FileRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upload_id: Option<String>,
}

/// `POST /upload/chunk` request body (the raw chunk bytes travel alongside,
/// out of band of this JSON envelope -- see the upload coordinator contract).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadChunkRequest {
    pub upload_id: String,
    pub chunk_index: u32,
    pub total_chunks: u32,
    pub chunk_hash: Digest,
    pub file_hash: Digest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkStatus {
    Received,
    Duplicate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadChunkResponse {
    pub chunk_index: u32,
    pub status: ChunkStatus,
}

/// `POST /upload/finish` request body.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadFinishRequest {
    pub upload_id: String,
    pub file_name: String,
    pub file_size: u64,
    pub file_hash: Digest,
    pub chunk_hashes: Vec<Digest>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadFinishResponse {
    pub file: FileRecord,
}

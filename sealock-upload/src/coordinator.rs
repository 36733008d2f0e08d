//! The resumable chunked upload session coordinator. A session walks
//! `Open -> Committed` on a successful `finalize`, or `Open -> Aborted` on
//! an explicit `cancel`, or `Open -> Expired` if its TTL lapses before
//! either happens. All three are terminal: once left, `Open` is never
//! re-entered for the same `upload_id`.
//!
//! Sessions are held purely in memory (an ephemeral, TTL-bounded hot
//! store) -- losing them on restart is acceptable because an
//! interrupted upload is always resumable by starting a fresh session
//! for the same file digest.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use sealock_types::{ChunkStatus, Digest, StorageError, StorageResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadState {
    Open,
    Committed,
    Aborted,
    Expired,
}

pub struct UploadSession {
    pub upload_id: String,
    pub file_hash: Digest,
    pub total_chunks: u32,
    /// Library the finished file will belong to. Carried on the session
    /// rather than the wire DTOs, since `UploadFinishRequest` only needs
    /// to repeat identifiers the client already chose, not ones the
    /// server assigned at `check` time.
    pub library_id: u64,
    pub state: UploadState,
    received: HashMap<u32, Digest>,
    expires_at: Instant,
}

impl UploadSession {
    pub fn missing(&self) -> Vec<u32> {
        (0..self.total_chunks).filter(|i| !self.received.contains_key(i)).collect()
    }

    pub fn is_complete(&self) -> bool {
        self.received.len() as u32 == self.total_chunks
    }
}

/// A read-only snapshot of session state, safe to hand back to callers
/// without holding the coordinator's lock.
#[derive(Debug, Clone)]
pub struct UploadSessionInfo {
    pub file_hash: Digest,
    pub total_chunks: u32,
    pub library_id: u64,
    pub state: UploadState,
}

pub struct UploadCoordinator {
    ttl: Duration,
    sessions: Mutex<HashMap<String, UploadSession>>,
}

impl UploadCoordinator {
    pub fn new(ttl: Duration) -> Self {
        UploadCoordinator {
            ttl,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Start a new upload session for a file expected to have `total_chunks`
    /// blocks and whole-content digest `file_hash`, destined for
    /// `library_id`. Returns the fresh session's id.
    pub fn open(&self, file_hash: Digest, total_chunks: u32, library_id: u64) -> String {
        let upload_id = proxmox_uuid::Uuid::generate().to_string();
        let session = UploadSession {
            upload_id: upload_id.clone(),
            file_hash,
            total_chunks,
            library_id,
            state: UploadState::Open,
            received: HashMap::new(),
            expires_at: Instant::now() + self.ttl,
        };
        self.sessions.lock().unwrap().insert(upload_id.clone(), session);
        upload_id
    }

    fn with_open_session<T>(
        &self,
        upload_id: &str,
        f: impl FnOnce(&mut UploadSession) -> StorageResult<T>,
    ) -> StorageResult<T> {
        let mut sessions = self.sessions.lock().unwrap();
        let session = sessions
            .get_mut(upload_id)
            .ok_or_else(|| StorageError::NotFound(format!("upload session {upload_id}")))?;

        if session.state == UploadState::Open && Instant::now() >= session.expires_at {
            session.state = UploadState::Expired;
        }

        match session.state {
            UploadState::Open => f(session),
            UploadState::Committed => Err(StorageError::Conflict(format!("upload session {upload_id} already committed"))),
            UploadState::Aborted => Err(StorageError::Conflict(format!("upload session {upload_id} was aborted"))),
            UploadState::Expired => Err(StorageError::Conflict(format!("upload session {upload_id} expired"))),
        }
    }

    /// Record one received chunk. Re-submitting the same index with the
    /// same hash is a no-op reported as `Duplicate`; a mismatched
    /// re-submission is a client-side error.
    pub fn put_chunk(&self, upload_id: &str, chunk_index: u32, chunk_hash: Digest) -> StorageResult<ChunkStatus> {
        self.with_open_session(upload_id, |session| {
            if chunk_index >= session.total_chunks {
                return Err(StorageError::InvalidInput(format!(
                    "chunk index {chunk_index} out of range for {} chunks",
                    session.total_chunks
                )));
            }

            match session.received.get(&chunk_index) {
                Some(existing) if *existing == chunk_hash => Ok(ChunkStatus::Duplicate),
                Some(existing) => Err(StorageError::Conflict(format!(
                    "chunk {chunk_index} already received with a different hash ({existing} != {chunk_hash})"
                ))),
                None => {
                    session.received.insert(chunk_index, chunk_hash);
                    Ok(ChunkStatus::Received)
                }
            }
        })
    }

    /// Indices not yet received.
    pub fn missing(&self, upload_id: &str) -> StorageResult<Vec<u32>> {
        self.with_open_session(upload_id, |session| Ok(session.missing()))
    }

    /// Commit the session, returning the ordered chunk digest list for the
    /// finished file. Fails with `Incomplete` (naming the missing indices)
    /// if any chunk is still outstanding.
    pub fn finalize(&self, upload_id: &str) -> StorageResult<Vec<Digest>> {
        self.with_open_session(upload_id, |session| {
            let missing = session.missing();
            if !missing.is_empty() {
                return Err(StorageError::Incomplete { missing });
            }
            session.state = UploadState::Committed;
            let ordered = (0..session.total_chunks)
                .map(|i| session.received[&i])
                .collect();
            Ok(ordered)
        })
    }

    pub fn cancel(&self, upload_id: &str) -> StorageResult<()> {
        self.with_open_session(upload_id, |session| {
            session.state = UploadState::Aborted;
            Ok(())
        })
    }

    /// Sweep sessions whose TTL has lapsed, transitioning them to
    /// `Expired` in place so a late caller gets a clear `Conflict` instead
    /// of silently vanishing. Returns how many were swept.
    pub fn sweep_expired(&self) -> usize {
        let mut sessions = self.sessions.lock().unwrap();
        let now = Instant::now();
        let mut swept = 0;
        for session in sessions.values_mut() {
            if session.state == UploadState::Open && now >= session.expires_at {
                session.state = UploadState::Expired;
                swept += 1;
            }
        }
        swept
    }

    pub fn state_of(&self, upload_id: &str) -> StorageResult<UploadState> {
        let sessions = self.sessions.lock().unwrap();
        sessions
            .get(upload_id)
            .map(|s| s.state)
            .ok_or_else(|| StorageError::NotFound(format!("upload session {upload_id}")))
    }

    pub fn info(&self, upload_id: &str) -> StorageResult<UploadSessionInfo> {
        let sessions = self.sessions.lock().unwrap();
        sessions
            .get(upload_id)
            .map(|s| UploadSessionInfo {
                file_hash: s.file_hash,
                total_chunks: s.total_chunks,
                library_id: s.library_id,
                state: s.state,
            })
            .ok_or_else(|| StorageError::NotFound(format!("upload session {upload_id}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn digest(byte: u8) -> Digest {
        Digest::from_bytes([byte; 32])
    }

    #[test]
    fn happy_path_finalizes_in_order() {
        let coordinator = UploadCoordinator::new(Duration::from_secs(60));
        let id = coordinator.open(digest(0), 3, 1);

        coordinator.put_chunk(&id, 1, digest(2)).unwrap();
        coordinator.put_chunk(&id, 0, digest(1)).unwrap();
        assert_eq!(coordinator.missing(&id).unwrap(), vec![2]);

        coordinator.put_chunk(&id, 2, digest(3)).unwrap();
        let chunks = coordinator.finalize(&id).unwrap();
        assert_eq!(chunks, vec![digest(1), digest(2), digest(3)]);
        assert_eq!(coordinator.state_of(&id).unwrap(), UploadState::Committed);
    }

    #[test]
    fn duplicate_chunk_with_same_hash_is_a_noop() {
        let coordinator = UploadCoordinator::new(Duration::from_secs(60));
        let id = coordinator.open(digest(0), 1, 1);

        assert_eq!(coordinator.put_chunk(&id, 0, digest(1)).unwrap(), ChunkStatus::Received);
        assert_eq!(coordinator.put_chunk(&id, 0, digest(1)).unwrap(), ChunkStatus::Duplicate);
    }

    #[test]
    fn duplicate_chunk_with_different_hash_conflicts() {
        let coordinator = UploadCoordinator::new(Duration::from_secs(60));
        let id = coordinator.open(digest(0), 1, 1);

        coordinator.put_chunk(&id, 0, digest(1)).unwrap();
        assert!(matches!(coordinator.put_chunk(&id, 0, digest(2)), Err(StorageError::Conflict(_))));
    }

    #[test]
    fn finalize_with_missing_chunks_reports_them() {
        let coordinator = UploadCoordinator::new(Duration::from_secs(60));
        let id = coordinator.open(digest(0), 2, 1);
        coordinator.put_chunk(&id, 1, digest(2)).unwrap();

        match coordinator.finalize(&id) {
            Err(StorageError::Incomplete { missing }) => assert_eq!(missing, vec![0]),
            other => panic!("expected Incomplete, got {other:?}"),
        }
    }

    #[test]
    fn cancelled_session_rejects_further_writes() {
        let coordinator = UploadCoordinator::new(Duration::from_secs(60));
        let id = coordinator.open(digest(0), 1, 1);
        coordinator.cancel(&id).unwrap();

        assert!(matches!(coordinator.put_chunk(&id, 0, digest(1)), Err(StorageError::Conflict(_))));
        assert_eq!(coordinator.state_of(&id).unwrap(), UploadState::Aborted);
    }

    #[test]
    fn committed_session_rejects_further_writes() {
        let coordinator = UploadCoordinator::new(Duration::from_secs(60));
        let id = coordinator.open(digest(0), 1, 1);
        coordinator.put_chunk(&id, 0, digest(1)).unwrap();
        coordinator.finalize(&id).unwrap();

        assert!(matches!(coordinator.put_chunk(&id, 0, digest(1)), Err(StorageError::Conflict(_))));
    }

    #[test]
    fn expired_session_rejects_operations_and_is_swept() {
        let coordinator = UploadCoordinator::new(Duration::from_millis(1));
        let id = coordinator.open(digest(0), 1, 1);
        std::thread::sleep(Duration::from_millis(5));

        assert!(matches!(coordinator.put_chunk(&id, 0, digest(1)), Err(StorageError::Conflict(_))));
        assert_eq!(coordinator.state_of(&id).unwrap(), UploadState::Expired);

        let id2 = coordinator.open(digest(9), 1, 1);
        std::thread::sleep(Duration::from_millis(5));
        let swept = coordinator.sweep_expired();
        assert!(swept >= 1);
        assert_eq!(coordinator.state_of(&id2).unwrap(), UploadState::Expired);
    }

    #[test]
    fn unknown_session_is_not_found() {
        let coordinator = UploadCoordinator::new(Duration::from_secs(60));
        assert!(matches!(coordinator.missing("no-such-id"), Err(StorageError::NotFound(_))));
    }

    #[test]
    fn chunk_index_out_of_range_is_invalid_input() {
        let coordinator = UploadCoordinator::new(Duration::from_secs(60));
        let id = coordinator.open(digest(0), 2, 1);
        assert!(matches!(coordinator.put_chunk(&id, 5, digest(1)), Err(StorageError::InvalidInput(_))));
    }
}

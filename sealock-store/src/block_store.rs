//! The durable, content-addressed block store. Blocks are written
//! once under a path derived purely from their digest and never
//! mutated in place afterwards, using a sharded-directory layout with
//! atomic temp-file-plus-rename writes. Ref-counting (and so GC
//! eligibility) lives one layer up, in the metadata store.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use sealock_types::{Digest, StorageError, StorageResult};

use crate::digest::hash_bytes;

/// Durable storage for content-addressed blocks. Implementations must be
/// safe to share across threads; callers serialize logically-conflicting
/// operations (e.g. via the metadata store's ref-count bookkeeping), not
/// this trait.
pub trait BlockStore: Send + Sync {
    /// Store `data` under `digest`. Must be idempotent: writing the same
    /// digest twice is a no-op on the second call. `data`'s hash is not
    /// re-verified here -- callers that accept untrusted input must hash
    /// it themselves first and compare against the caller-supplied digest.
    fn put(&self, digest: &Digest, data: &[u8]) -> StorageResult<()>;

    /// Read back a previously stored block. Returns `NotFound` if absent,
    /// `Fatal` if the stored bytes no longer hash to `digest`.
    fn get(&self, digest: &Digest) -> StorageResult<Vec<u8>>;

    fn exists(&self, digest: &Digest) -> StorageResult<bool>;

    /// Remove a block. Not an error if it is already absent, since GC
    /// sweeps may race with themselves across restarts.
    fn delete(&self, digest: &Digest) -> StorageResult<()>;

    fn size(&self, digest: &Digest) -> StorageResult<u64>;
}

/// Builds the on-disk shard path for a digest: a single byte of the digest
/// hex-encoded as a two-character directory component, keeping any one
/// directory from holding more than ~1/256th of the block population.
fn shard_path(base: &Path, digest: &Digest) -> PathBuf {
    let mut path = base.to_path_buf();
    path.push(digest.shard_prefix());
    path.push(digest.to_hex());
    path
}

/// Filesystem-backed [`BlockStore`], laid out as `<base>/blocks/<xx>/<digest>`.
pub struct LocalBlockStore {
    base: PathBuf,
    write_lock: Mutex<()>,
}

impl LocalBlockStore {
    /// Open an existing store, creating its directory layout if absent.
    pub fn open<P: Into<PathBuf>>(base: P) -> StorageResult<Self> {
        let base: PathBuf = base.into();
        let blocks_dir = base.join("blocks");

        std::fs::create_dir_all(&blocks_dir)
            .map_err(|err| StorageError::Fatal(format!("creating block store at {blocks_dir:?}: {err}")))?;

        for shard in 0u16..256 {
            let dir = blocks_dir.join(format!("{:02x}", shard));
            std::fs::create_dir_all(&dir)
                .map_err(|err| StorageError::Fatal(format!("creating shard dir {dir:?}: {err}")))?;
        }

        Ok(LocalBlockStore {
            base: blocks_dir,
            write_lock: Mutex::new(()),
        })
    }

    fn path_for(&self, digest: &Digest) -> PathBuf {
        shard_path(&self.base, digest)
    }
}

impl BlockStore for LocalBlockStore {
    fn put(&self, digest: &Digest, data: &[u8]) -> StorageResult<()> {
        let path = self.path_for(digest);

        let _guard = self.write_lock.lock().unwrap();

        if path.exists() {
            return Ok(());
        }

        let tmp_path = path.with_extension("tmp");
        std::fs::write(&tmp_path, data)
            .map_err(|err| StorageError::Transient(format!("writing block {digest}: {err}")))?;
        std::fs::rename(&tmp_path, &path)
            .map_err(|err| StorageError::Transient(format!("finalizing block {digest}: {err}")))?;

        Ok(())
    }

    fn get(&self, digest: &Digest) -> StorageResult<Vec<u8>> {
        let path = self.path_for(digest);
        let data = std::fs::read(&path).map_err(|err| {
            if err.kind() == std::io::ErrorKind::NotFound {
                StorageError::NotFound(format!("block {digest}"))
            } else {
                StorageError::Transient(format!("reading block {digest}: {err}"))
            }
        })?;

        if hash_bytes(&data) != *digest {
            return Err(StorageError::Fatal(format!(
                "block {digest} failed integrity check on read"
            )));
        }

        Ok(data)
    }

    fn exists(&self, digest: &Digest) -> StorageResult<bool> {
        Ok(self.path_for(digest).exists())
    }

    fn delete(&self, digest: &Digest) -> StorageResult<()> {
        let path = self.path_for(digest);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(StorageError::Transient(format!("deleting block {digest}: {err}"))),
        }
    }

    fn size(&self, digest: &Digest) -> StorageResult<u64> {
        let path = self.path_for(digest);
        let metadata = std::fs::metadata(&path).map_err(|err| {
            if err.kind() == std::io::ErrorKind::NotFound {
                StorageError::NotFound(format!("block {digest}"))
            } else {
                StorageError::Transient(format!("statting block {digest}: {err}"))
            }
        })?;
        Ok(metadata.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store() -> (tempfile::TempDir, LocalBlockStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalBlockStore::open(dir.path()).unwrap();
        (dir, store)
    }

    #[test]
    fn put_then_get_round_trips() {
        let (_dir, store) = temp_store();
        let data = b"some block content";
        let digest = hash_bytes(data);

        store.put(&digest, data).unwrap();
        assert!(store.exists(&digest).unwrap());
        assert_eq!(store.get(&digest).unwrap(), data);
        assert_eq!(store.size(&digest).unwrap(), data.len() as u64);
    }

    #[test]
    fn put_is_idempotent() {
        let (_dir, store) = temp_store();
        let data = b"idempotent";
        let digest = hash_bytes(data);

        store.put(&digest, data).unwrap();
        store.put(&digest, data).unwrap();
        assert_eq!(store.get(&digest).unwrap(), data);
    }

    #[test]
    fn get_missing_is_not_found() {
        let (_dir, store) = temp_store();
        let digest = hash_bytes(b"never written");
        assert!(matches!(store.get(&digest), Err(StorageError::NotFound(_))));
    }

    #[test]
    fn delete_then_get_is_not_found() {
        let (_dir, store) = temp_store();
        let data = b"to be deleted";
        let digest = hash_bytes(data);

        store.put(&digest, data).unwrap();
        store.delete(&digest).unwrap();
        assert!(!store.exists(&digest).unwrap());
        assert!(matches!(store.get(&digest), Err(StorageError::NotFound(_))));
    }

    #[test]
    fn delete_of_absent_block_is_not_an_error() {
        let (_dir, store) = temp_store();
        let digest = hash_bytes(b"absent");
        store.delete(&digest).unwrap();
    }
}

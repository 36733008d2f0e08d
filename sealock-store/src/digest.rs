//! The content digest primitive. Every block, file, directory and
//! version in the store is addressed by the output of this module.

use openssl::sha::Sha256;
use sealock_types::Digest;

/// H(bytes) -> 32-byte digest.
pub fn hash_bytes(data: &[u8]) -> Digest {
    let mut hasher = Sha256::new();
    hasher.update(data);
    Digest::from_bytes(hasher.finish())
}

/// Combine an ordered sequence of digests into one: `H(d1 || d2 || ... || dn)`.
/// Used both for the file-content digest over a block list, and as the
/// pairwise combiner the Merkle engine builds on.
pub fn combine<'a>(digests: impl IntoIterator<Item = &'a Digest>) -> Digest {
    let mut hasher = Sha256::new();
    for digest in digests {
        hasher.update(digest.as_bytes());
    }
    Digest::from_bytes(hasher.finish())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_deterministic_and_depends_on_content() {
        let a = hash_bytes(b"hello world");
        let b = hash_bytes(b"hello world");
        let c = hash_bytes(b"hello world!");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn combine_is_order_sensitive() {
        let a = hash_bytes(b"one");
        let b = hash_bytes(b"two");
        assert_ne!(combine([&a, &b]), combine([&b, &a]));
    }

    #[test]
    fn combine_of_empty_sequence_is_stable() {
        let empty: Vec<Digest> = Vec::new();
        assert_eq!(combine(&empty), combine(&empty));
    }
}

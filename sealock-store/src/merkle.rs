//! The Merkle directory engine. Builds a canonical, content-addressed
//! digest over a directory tree and diffs two such trees path-by-path.
//!
//! Canonicalization rules:
//! - a leaf's digest is `H(name || "F" || file_content_digest)`
//! - a directory's digest is `H(name || "D" || child_root)`, where
//!   `child_root` folds the (name-sorted) children's digests pairwise,
//!   duplicating the last one when a layer has an odd count -- the
//!   standard Merkle-tree padding rule, so two directories with the same
//!   members always land on the same root regardless of listing order.

use std::collections::BTreeMap;

use sealock_types::{Digest, DirectoryDiff, DirectoryEntry};

use crate::digest::{combine, hash_bytes};

fn tagged(name: &str, tag: u8, payload: &Digest) -> Digest {
    let mut buf = Vec::with_capacity(name.len() + 1 + 32);
    buf.extend_from_slice(name.as_bytes());
    buf.push(tag);
    buf.extend_from_slice(payload.as_bytes());
    hash_bytes(&buf)
}

pub fn leaf_digest(name: &str, file_content_digest: &Digest) -> Digest {
    tagged(name, b'F', file_content_digest)
}

pub fn dir_digest(name: &str, child_root: &Digest) -> Digest {
    tagged(name, b'D', child_root)
}

/// Fold a list of child digests into one root, pairwise, duplicating the
/// last entry of any odd-length layer.
pub fn merkle_root(digests: &[Digest]) -> Digest {
    if digests.is_empty() {
        return combine(&[]);
    }

    let mut layer = digests.to_vec();
    while layer.len() > 1 {
        if layer.len() % 2 == 1 {
            let last = *layer.last().unwrap();
            layer.push(last);
        }
        let mut next = Vec::with_capacity(layer.len() / 2);
        for pair in layer.chunks(2) {
            next.push(combine([&pair[0], &pair[1]]));
        }
        layer = next;
    }
    layer[0]
}

/// Build a leaf entry, computing its canonical digest from its name and
/// file content digest.
pub fn build_leaf(name: impl Into<String>, file_content_digest: Digest, size: u64) -> DirectoryEntry {
    let name = name.into();
    let digest = leaf_digest(&name, &file_content_digest);
    DirectoryEntry::leaf(name, digest, size)
}

/// Build a directory entry over `children`, sorting them by name first
/// (the sort is required for the digest to be order-independent) and
/// computing its canonical digest from the resulting child root.
pub fn build_dir(name: impl Into<String>, mut children: Vec<DirectoryEntry>) -> DirectoryEntry {
    children.sort_by(|a, b| a.name.cmp(&b.name));
    let child_digests: Vec<Digest> = children.iter().map(|c| c.content_digest).collect();
    let root = merkle_root(&child_digests);
    let name = name.into();
    let digest = dir_digest(&name, &root);
    DirectoryEntry::dir(name, digest, children)
}

fn flatten(entry: &DirectoryEntry, prefix: &str, out: &mut BTreeMap<String, Digest>) {
    if entry.is_dir {
        for child in &entry.children {
            let path = if prefix.is_empty() {
                child.name.clone()
            } else {
                format!("{prefix}/{}", child.name)
            };
            flatten(child, &path, out);
        }
    } else {
        out.insert(prefix.to_string(), entry.content_digest);
    }
}

/// Diff two directory trees by full file path, regardless of how much of
/// the tree structure around them changed.
pub fn diff(old: &DirectoryEntry, new: &DirectoryEntry) -> DirectoryDiff {
    let mut old_files = BTreeMap::new();
    flatten(old, "", &mut old_files);
    let mut new_files = BTreeMap::new();
    flatten(new, "", &mut new_files);

    let mut result = DirectoryDiff::default();

    for (path, new_digest) in &new_files {
        match old_files.get(path) {
            None => {
                result.added.insert(path.clone(), *new_digest);
            }
            Some(old_digest) if old_digest != new_digest => {
                result.modified.insert(path.clone(), (*old_digest, *new_digest));
            }
            _ => {}
        }
    }

    for (path, old_digest) in &old_files {
        if !new_files.contains_key(path) {
            result.removed.insert(path.clone(), *old_digest);
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::digest::hash_bytes;

    fn file(name: &str, content: &[u8]) -> DirectoryEntry {
        build_leaf(name, hash_bytes(content), content.len() as u64)
    }

    #[test]
    fn digest_is_stable_across_child_insertion_order() {
        let a = build_dir(
            "root",
            vec![file("a.txt", b"aaa"), file("b.txt", b"bbb"), file("c.txt", b"ccc")],
        );
        let b = build_dir(
            "root",
            vec![file("c.txt", b"ccc"), file("a.txt", b"aaa"), file("b.txt", b"bbb")],
        );
        assert_eq!(a.content_digest, b.content_digest);
    }

    #[test]
    fn digest_changes_when_any_file_changes() {
        let a = build_dir("root", vec![file("a.txt", b"aaa")]);
        let b = build_dir("root", vec![file("a.txt", b"aaaa")]);
        assert_ne!(a.content_digest, b.content_digest);
    }

    #[test]
    fn handles_odd_numbers_of_children() {
        let tree = build_dir(
            "root",
            vec![file("a.txt", b"1"), file("b.txt", b"2"), file("c.txt", b"3")],
        );
        // just confirm it doesn't panic and produces a stable digest
        let again = build_dir(
            "root",
            vec![file("a.txt", b"1"), file("b.txt", b"2"), file("c.txt", b"3")],
        );
        assert_eq!(tree.content_digest, again.content_digest);
    }

    #[test]
    fn diff_reports_added_removed_and_modified() {
        let old = build_dir(
            "root",
            vec![
                file("keep.txt", b"same"),
                file("remove.txt", b"gone"),
                file("change.txt", b"before"),
            ],
        );
        let new = build_dir(
            "root",
            vec![
                file("keep.txt", b"same"),
                file("change.txt", b"after"),
                file("add.txt", b"new"),
            ],
        );

        let d = diff(&old, &new);
        assert!(d.added.contains_key("add.txt"));
        assert!(d.removed.contains_key("remove.txt"));
        assert!(d.modified.contains_key("change.txt"));
        assert!(!d.added.contains_key("keep.txt"));
        assert!(!d.is_empty());
    }

    #[test]
    fn diff_of_identical_trees_is_empty() {
        let tree = build_dir("root", vec![file("a.txt", b"same")]);
        assert!(diff(&tree, &tree).is_empty());
    }

    #[test]
    fn diff_handles_nested_directories_by_full_path() {
        let old = build_dir(
            "root",
            vec![build_dir("sub", vec![file("x.txt", b"1")])],
        );
        let new = build_dir(
            "root",
            vec![build_dir("sub", vec![file("x.txt", b"2")])],
        );

        let d = diff(&old, &new);
        assert!(d.modified.contains_key("sub/x.txt"));
    }
}

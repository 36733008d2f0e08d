//! The storage engine proper: content digests, chunking, the durable
//! block store, an advisory read cache and the Merkle directory engine.
//!
//! # Data model
//!
//! Files are split into blocks by a [`chunker`], each block is addressed
//! by its digest ([`digest`]) and stored once, deduplicated, in a
//! [`block_store`]. A file's overall content digest is the combine of its
//! ordered block digests. Directory layouts are committed via
//! [`merkle`], which folds a tree of names and content digests into a
//! single root that changes if and only if something under it changed.
//!
//! # Garbage collection
//!
//! Block lifetime is governed by an explicit reference count kept in
//! the metadata store (`sealock-metadata`): a block is eligible for
//! collection the instant its count reaches zero, and GC (`sealock`'s
//! `gc` module) only has to delete what the metadata store already
//! knows is orphaned -- no chunk store sweep, no `atime` races with
//! `relatime` mounts.

pub mod block_store;
pub mod cache;
pub mod chunker;
pub mod digest;
pub mod merkle;

pub use block_store::{BlockStore, LocalBlockStore};
pub use cache::CachedBlockStore;
pub use chunker::{CdcChunker, ChunkBoundaries, FixedChunker};

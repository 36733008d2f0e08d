//! `sealock`: a content-addressed document storage engine with Git-like
//! versioning. This crate wires the storage engine (`sealock-store`),
//! metadata bookkeeping (`sealock-metadata`), upload session coordination
//! (`sealock-upload`) and configuration loading (`sealock-config`) together
//! behind the [`FileService`] facade used by the `sealockd` binary.

pub mod gc;
pub mod service;

pub use service::FileService;

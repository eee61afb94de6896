//! Traits implemented by collaborator crates.

pub mod storage;

pub use storage::BlobStore;

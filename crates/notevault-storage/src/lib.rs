//! # notevault-storage
//!
//! Blob store backends for NoteVault. Each non-folder item owns exactly
//! one object keyed by its uid; providers implement the
//! [`notevault_core::traits::BlobStore`] contract.

pub mod providers;

pub use providers::create_blob_store;
pub use providers::local::LocalBlobStore;
pub use providers::memory::MemoryBlobStore;
#[cfg(feature = "s3")]
pub use providers::s3::S3BlobStore;

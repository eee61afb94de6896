//! # notevault-service
//!
//! Business logic layer for NoteVault: the versioned item lifecycle,
//! per-item advisory locking, and three-way merge reconciliation.
//!
//! Services follow constructor injection: all collaborators are provided
//! at construction time via `Arc` references so tests can substitute fakes.

pub mod context;
pub mod item;
pub mod lock;

pub use context::RequestContext;
pub use item::{
    ItemService, MetadataUpdate, ParentChange, TextUpdate, TextUpdateOutcome, TextUpdateResult,
};
pub use lock::{LockGuard, ResourceLock};

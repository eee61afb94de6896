//! Versioned item lifecycle: create, update, soft-delete, restore, and
//! permanent deletion, serialized per item by the advisory lock.

pub mod merge;
pub mod naming;
pub mod service;

pub use service::{
    ItemService, MetadataUpdate, ParentChange, TextUpdate, TextUpdateOutcome, TextUpdateResult,
};

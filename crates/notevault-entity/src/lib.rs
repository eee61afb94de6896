//! # notevault-entity
//!
//! Domain entity models for NoteVault. Plain data structures shared by
//! the database, storage, and service crates.

pub mod item;

pub use item::{Item, ItemKind, ItemSummary, NewItem};

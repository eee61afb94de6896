//! Item entity: a node in a per-owner forest of notes and folders.

pub mod kind;
pub mod model;

pub use kind::ItemKind;
pub use model::{Item, ItemSummary, NewItem};

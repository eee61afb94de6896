//! # notevault-core
//!
//! Core crate for NoteVault. Contains the unified error system,
//! configuration schemas, and the storage trait consumed by the
//! service layer.
//!
//! This crate has **no** internal dependencies on other NoteVault crates.

pub mod config;
pub mod error;
pub mod result;
pub mod traits;

pub use error::{AppError, ErrorKind};
pub use result::AppResult;

//! # notevault-database
//!
//! PostgreSQL connection management, migrations, and the item repository.
//! The [`repositories::ItemRepository`] trait is the metadata row-store
//! contract consumed by the service layer; [`repositories::PgItemRepository`]
//! is its production implementation.

pub mod connection;
pub mod migration;
pub mod repositories;

pub use connection::DatabasePool;
pub use repositories::{ItemRepository, PgItemRepository};

//! Item repository: the metadata row-store contract and its Postgres
//! implementation.

pub mod item;

use async_trait::async_trait;
use uuid::Uuid;

use notevault_core::result::AppResult;
use notevault_entity::item::{Item, NewItem};

pub use item::PgItemRepository;

/// Row-level contract for item metadata.
///
/// The service layer holds this as a trait object so tests can substitute
/// an in-memory fake. Single-row writes are atomic; cross-row invariants
/// (the live sibling-name uniqueness) are enforced by the backing store
/// and surfaced as `DuplicateName`.
#[async_trait]
pub trait ItemRepository: Send + Sync + std::fmt::Debug + 'static {
    /// Insert a new item row with a NULL version.
    ///
    /// Fails with `DuplicateName` if a live sibling already holds the name.
    async fn insert(&self, item: &NewItem) -> AppResult<Item>;

    /// Find an item by uid, live or soft-deleted.
    async fn find_by_uid(&self, uid: Uuid) -> AppResult<Option<Item>>;

    /// Find the live item with the given name under the given parent
    /// (`None` parent means root level).
    async fn find_live_sibling(
        &self,
        owner_id: Uuid,
        parent_uid: Option<Uuid>,
        name: &str,
    ) -> AppResult<Option<Item>>;

    /// Names of all live items under the given parent for one owner.
    async fn live_sibling_names(
        &self,
        owner_id: Uuid,
        parent_uid: Option<Uuid>,
    ) -> AppResult<Vec<String>>;

    /// All live children of the given item, in insertion order.
    async fn live_children(&self, parent_uid: Uuid) -> AppResult<Vec<Item>>;

    /// All live items for an owner, in insertion order.
    async fn list_live(&self, owner_id: Uuid) -> AppResult<Vec<Item>>;

    /// All soft-deleted items for an owner, in insertion order.
    async fn list_deleted(&self, owner_id: Uuid) -> AppResult<Vec<Item>>;

    /// Write back a full item row (name, parent, version, timestamps,
    /// deletion marker). Fails with `NotFound` if the row is gone and
    /// `DuplicateName` on a live sibling-name collision.
    async fn update(&self, item: &Item) -> AppResult<Item>;

    /// Remove the row permanently. Returns `false` if no row existed.
    async fn delete_row(&self, uid: Uuid) -> AppResult<bool>;
}

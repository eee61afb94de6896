//! Item entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::kind::ItemKind;

/// A versioned item stored in NoteVault.
///
/// Items form a per-owner forest via `parent_uid`. Rows are soft-deleted
/// by setting `deleted_at`; the row and its blob survive until a permanent
/// delete removes both.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Item {
    /// Unique item identifier, immutable, assigned at creation.
    pub uid: Uuid,
    /// The parent folder, or `None` for a root-level item.
    pub parent_uid: Option<Uuid>,
    /// The owning principal, immutable.
    pub owner_id: Uuid,
    /// Display name, unique among live siblings under the same parent.
    pub name: String,
    /// What kind of item this is.
    pub kind: ItemKind,
    /// SHA-256 hex fingerprint of the current text content.
    ///
    /// `None` means "no content yet" or a kind that carries no version.
    /// Folders always have `None` here.
    pub version: Option<String>,
    /// When the item was created.
    pub created_at: DateTime<Utc>,
    /// When the item was last mutated.
    pub updated_at: DateTime<Utc>,
    /// Soft-delete marker; `None` means the item is live.
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Item {
    /// Whether the item is live (not soft-deleted).
    pub fn is_live(&self) -> bool {
        self.deleted_at.is_none()
    }

    /// Produce the listing summary for this item.
    pub fn summary(&self) -> ItemSummary {
        ItemSummary {
            uid: self.uid,
            parent_uid: self.parent_uid,
            name: self.name.clone(),
            kind: self.kind,
            version: self.version.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
            deleted_at: self.deleted_at,
        }
    }
}

/// Data required to create a new item row.
///
/// The uid is supplied by the caller so that clients can create items
/// offline and sync them later under a stable identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewItem {
    /// The uid the new item will be known by.
    pub uid: Uuid,
    /// Parent folder, or `None` for root level.
    pub parent_uid: Option<Uuid>,
    /// The owning principal.
    pub owner_id: Uuid,
    /// Display name.
    pub name: String,
    /// Item kind.
    pub kind: ItemKind,
}

/// Item summary returned by listings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemSummary {
    /// Item uid.
    pub uid: Uuid,
    /// Parent folder uid, if any.
    pub parent_uid: Option<Uuid>,
    /// Display name.
    pub name: String,
    /// Item kind.
    pub kind: ItemKind,
    /// Content-hash version, if any.
    pub version: Option<String>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last mutation timestamp.
    pub updated_at: DateTime<Utc>,
    /// Soft-delete timestamp, if deleted.
    pub deleted_at: Option<DateTime<Utc>>,
}

//! The versioned item store.
//!
//! Every mutating operation follows the same shape: acquire the item's
//! advisory lock, read the current row, branch per operation, write the
//! row and (when content is involved) the blob, release the lock when the
//! guard drops. Lock acquisition never blocks; contention surfaces as a
//! retryable `ResourceBusy`.

use std::sync::Arc;

use bytes::Bytes;
use chrono::Utc;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info};
use uuid::Uuid;

use notevault_core::error::{AppError, ErrorKind};
use notevault_core::result::AppResult;
use notevault_core::traits::BlobStore;
use notevault_database::ItemRepository;
use notevault_entity::item::{Item, ItemSummary, NewItem};

use crate::context::RequestContext;
use crate::lock::ResourceLock;

use super::{merge, naming};

/// How a metadata update treats the parent field.
///
/// `Unchanged` and `ToRoot` are distinct intents: an API request that does
/// not mention the parent leaves it alone, while an explicit null moves
/// the item to the root level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ParentChange {
    /// Leave the parent as it is.
    #[default]
    Unchanged,
    /// Move the item to the root level.
    ToRoot,
    /// Move the item under the given folder.
    To(Uuid),
}

/// Partial metadata update: absent fields are no-ops.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MetadataUpdate {
    /// New display name, if renaming.
    pub name: Option<String>,
    /// Parent change, if moving.
    #[serde(default)]
    pub parent: ParentChange,
}

/// A text edit submitted against the baseline the editor last read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextUpdate {
    /// The stored version the editor's view was based on.
    pub baseline_version: Option<String>,
    /// The text of that baseline, used as the merge base on divergence.
    pub baseline_text: String,
    /// The editor's new text.
    pub new_text: String,
}

/// Which path a text update took.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TextUpdateOutcome {
    /// The baseline was current; the new text was written verbatim.
    FastForward,
    /// The stored text had diverged; a three-way merge was persisted.
    Merged,
}

/// Result of a text update.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextUpdateResult {
    /// Which path the update took.
    pub outcome: TextUpdateOutcome,
    /// The new stored content-hash version.
    pub version: String,
}

/// Orchestrates the versioned item lifecycle over the row and blob stores.
#[derive(Debug, Clone)]
pub struct ItemService {
    /// Item metadata rows.
    repo: Arc<dyn ItemRepository>,
    /// Item content blobs.
    blobs: Arc<dyn BlobStore>,
    /// Per-item advisory locks.
    locks: ResourceLock,
}

impl ItemService {
    /// Creates a new item service.
    ///
    /// The lock table is passed in so that deployments sharing one process
    /// across multiple service handles contend on the same locks.
    pub fn new(
        repo: Arc<dyn ItemRepository>,
        blobs: Arc<dyn BlobStore>,
        locks: ResourceLock,
    ) -> Self {
        Self { repo, blobs, locks }
    }

    /// Whether the given item exists and belongs to the calling principal.
    pub async fn is_owned(&self, ctx: &RequestContext, uid: Uuid) -> AppResult<bool> {
        Ok(self
            .repo
            .find_by_uid(uid)
            .await?
            .is_some_and(|item| item.owner_id == ctx.user_id))
    }

    /// Create an item row and, for content-bearing kinds, its empty blob.
    ///
    /// The writes are ordered row-then-blob with a compensating row delete
    /// if the blob write fails, so a failed create leaves no metadata row
    /// referencing a missing blob.
    pub async fn create(&self, ctx: &RequestContext, new_item: NewItem) -> AppResult<Item> {
        if new_item.owner_id != ctx.user_id {
            return Err(AppError::unauthorized("Cannot create items for another user"));
        }
        if new_item.name.trim().is_empty() {
            return Err(AppError::validation("Item name cannot be empty"));
        }
        if let Some(parent_uid) = new_item.parent_uid {
            self.require_live_folder(ctx, parent_uid).await?;
        }

        let item = self.repo.insert(&new_item).await?;

        if item.kind.has_content() {
            if let Err(blob_err) = self.blobs.put(item.uid, Bytes::new()).await {
                // Roll the row back so no metadata references a missing blob.
                if let Err(cleanup_err) = self.repo.delete_row(item.uid).await {
                    tracing::warn!(
                        item_uid = %item.uid,
                        error = %cleanup_err,
                        "Failed to roll back item row after blob init failure"
                    );
                }
                return Err(AppError::with_source(
                    ErrorKind::WriteFailure,
                    format!("Blob initialization failed for item {}", item.uid),
                    blob_err,
                ));
            }
        }

        info!(user_id = %ctx.user_id, item_uid = %item.uid, kind = %item.kind, "Item created");
        Ok(item)
    }

    /// Apply a partial metadata update (rename and/or move) under the
    /// item's lock.
    pub async fn update_metadata(
        &self,
        ctx: &RequestContext,
        uid: Uuid,
        update: MetadataUpdate,
    ) -> AppResult<Item> {
        let _guard = self.locks.try_acquire(uid)?;

        let mut item = self.load_owned_live(ctx, uid).await?;

        if let Some(name) = update.name {
            if name.trim().is_empty() {
                return Err(AppError::validation("Item name cannot be empty"));
            }
            item.name = name;
        }

        match update.parent {
            ParentChange::Unchanged => {}
            ParentChange::ToRoot => item.parent_uid = None,
            ParentChange::To(parent_uid) => {
                if parent_uid == uid {
                    return Err(AppError::validation("An item cannot be its own parent"));
                }
                self.require_live_folder(ctx, parent_uid).await?;
                self.require_no_cycle(uid, parent_uid).await?;
                item.parent_uid = Some(parent_uid);
            }
        }

        item.updated_at = Utc::now();
        let item = self.repo.update(&item).await?;

        info!(user_id = %ctx.user_id, item_uid = %uid, "Item metadata updated");
        Ok(item)
    }

    /// Apply a text edit under the item's lock: fast-forward when the
    /// caller's baseline is current, three-way merge when it is stale.
    pub async fn update_text(
        &self,
        ctx: &RequestContext,
        uid: Uuid,
        update: TextUpdate,
    ) -> AppResult<TextUpdateResult> {
        let _guard = self.locks.try_acquire(uid)?;

        let mut item = self.load_owned_live(ctx, uid).await?;
        if !item.kind.is_versioned() {
            return Err(AppError::validation(format!(
                "Item {uid} is a {} and has no editable text",
                item.kind
            )));
        }

        let fast_forward =
            item.version.is_none() || item.version == update.baseline_version;

        let (content, outcome) = if fast_forward {
            (update.new_text, TextUpdateOutcome::FastForward)
        } else {
            // The stored text diverged from the editor's baseline. Read
            // what the server has now and reconcile; a read failure aborts
            // the update rather than silently overwriting the divergence.
            let current = self.blobs.get(uid).await.map_err(|e| {
                AppError::with_source(
                    ErrorKind::ReadFailure,
                    format!("Cannot read current content of item {uid} for merge"),
                    e,
                )
            })?;
            let server_text = String::from_utf8(current.to_vec()).map_err(|e| {
                AppError::with_source(
                    ErrorKind::ReadFailure,
                    format!("Stored content of item {uid} is not valid UTF-8"),
                    e,
                )
            })?;

            let merged = merge::merge(&update.baseline_text, &server_text, &update.new_text);
            (merged, TextUpdateOutcome::Merged)
        };

        let version = content_hash(&content);
        self.blobs
            .put(uid, Bytes::from(content))
            .await
            .map_err(|e| {
                AppError::with_source(
                    ErrorKind::WriteFailure,
                    format!("Failed to write content of item {uid}"),
                    e,
                )
            })?;

        item.version = Some(version.clone());
        item.updated_at = Utc::now();
        self.repo.update(&item).await?;

        info!(
            user_id = %ctx.user_id,
            item_uid = %uid,
            outcome = ?outcome,
            "Item text updated"
        );
        Ok(TextUpdateResult { outcome, version })
    }

    /// Soft-delete an item and, depth-first, every live descendant.
    ///
    /// Each descendant is its own fully locked operation; the subtree as a
    /// whole is not atomic. The first child failure aborts the cascade.
    pub async fn soft_delete(&self, ctx: &RequestContext, uid: Uuid) -> AppResult<()> {
        // Ownership is checked once at the cascade root; children share
        // the owner by construction.
        let item = self.load_owned(ctx, uid).await?;
        if item.deleted_at.is_some() {
            return Ok(());
        }

        self.soft_delete_recursive(uid).await?;
        info!(user_id = %ctx.user_id, item_uid = %uid, "Item soft-deleted");
        Ok(())
    }

    fn soft_delete_recursive(&self, uid: Uuid) -> BoxFuture<'_, AppResult<()>> {
        Box::pin(async move {
            // Children first. The parent's lock is not held while a child's
            // is acquired; each recursive call stands alone.
            let children = self.repo.live_children(uid).await?;
            for child in children {
                self.soft_delete_recursive(child.uid).await?;
            }

            let _guard = self.locks.try_acquire(uid)?;
            let mut item = self
                .repo
                .find_by_uid(uid)
                .await?
                .ok_or_else(|| AppError::not_found(format!("Item {uid} not found")))?;

            if item.deleted_at.is_some() {
                // A concurrent delete got here first; nothing left to do.
                return Ok(());
            }

            let now = Utc::now();
            item.deleted_at = Some(now);
            item.updated_at = now;
            self.repo.update(&item).await?;

            debug!(item_uid = %uid, "Marked item deleted");
            Ok(())
        })
    }

    /// Restore a soft-deleted item to the root level under its lock.
    ///
    /// Items restore to root rather than to their original parent, since
    /// the parent chain may itself be deleted. A live root-level name
    /// collision is resolved with a fresh `stem_<n>` name.
    pub async fn restore(&self, ctx: &RequestContext, uid: Uuid) -> AppResult<Item> {
        let _guard = self.locks.try_acquire(uid)?;

        let mut item = self.load_owned(ctx, uid).await?;
        if item.deleted_at.is_none() {
            return Err(AppError::not_found(format!(
                "Item {uid} is not in the trash"
            )));
        }

        let collision = self
            .repo
            .find_live_sibling(ctx.user_id, None, &item.name)
            .await?
            .is_some();
        if collision {
            let existing = self.repo.live_sibling_names(ctx.user_id, None).await?;
            let fresh = naming::generate_new_name(&item.name, &existing);
            debug!(item_uid = %uid, new_name = %fresh, "Restore renamed to avoid collision");
            item.name = fresh;
        }

        item.parent_uid = None;
        item.deleted_at = None;
        item.updated_at = Utc::now();
        let item = self.repo.update(&item).await?;

        info!(user_id = %ctx.user_id, item_uid = %uid, name = %item.name, "Item restored");
        Ok(item)
    }

    /// Permanently delete an item under its lock: blob first, then row.
    ///
    /// A blob-delete failure leaves the row in place so the operation can
    /// be retried; a retry that finds the blob already gone succeeds.
    pub async fn permanent_delete(&self, ctx: &RequestContext, uid: Uuid) -> AppResult<()> {
        let _guard = self.locks.try_acquire(uid)?;

        let item = self.load_owned(ctx, uid).await?;

        if item.kind.has_content() {
            self.blobs.delete(uid).await.map_err(|e| {
                AppError::with_source(
                    ErrorKind::WriteFailure,
                    format!("Failed to delete content of item {uid}; retry the operation"),
                    e,
                )
            })?;
        }

        self.repo.delete_row(uid).await?;

        info!(user_id = %ctx.user_id, item_uid = %uid, "Item permanently deleted");
        Ok(())
    }

    /// Current text content and stored version of a document.
    pub async fn read_document(
        &self,
        ctx: &RequestContext,
        uid: Uuid,
    ) -> AppResult<(String, Option<String>)> {
        let item = self.load_owned(ctx, uid).await?;
        if !item.kind.is_versioned() {
            return Err(AppError::validation(format!(
                "Item {uid} is a {} and has no text content",
                item.kind
            )));
        }

        let bytes = self.blobs.get(uid).await?;
        let content = String::from_utf8(bytes.to_vec()).map_err(|e| {
            AppError::with_source(
                ErrorKind::ReadFailure,
                format!("Stored content of item {uid} is not valid UTF-8"),
                e,
            )
        })?;
        Ok((content, item.version))
    }

    /// Size in bytes of an item's stored content.
    pub async fn content_size(&self, ctx: &RequestContext, uid: Uuid) -> AppResult<u64> {
        let item = self.load_owned(ctx, uid).await?;
        if !item.kind.has_content() {
            return Err(AppError::validation(format!(
                "Item {uid} is a folder and has no content"
            )));
        }
        self.blobs.size(uid).await
    }

    /// Live items of the calling principal, in insertion order.
    pub async fn list_live(&self, ctx: &RequestContext) -> AppResult<Vec<ItemSummary>> {
        let items = self.repo.list_live(ctx.user_id).await?;
        Ok(items.iter().map(Item::summary).collect())
    }

    /// Soft-deleted items of the calling principal, in insertion order.
    pub async fn list_deleted(&self, ctx: &RequestContext) -> AppResult<Vec<ItemSummary>> {
        let items = self.repo.list_deleted(ctx.user_id).await?;
        Ok(items.iter().map(Item::summary).collect())
    }

    /// Load an item by uid and verify the caller owns it.
    async fn load_owned(&self, ctx: &RequestContext, uid: Uuid) -> AppResult<Item> {
        let item = self
            .repo
            .find_by_uid(uid)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Item {uid} not found")))?;
        if item.owner_id != ctx.user_id {
            return Err(AppError::unauthorized(format!(
                "Item {uid} is not owned by the caller"
            )));
        }
        Ok(item)
    }

    /// Like [`Self::load_owned`] but soft-deleted items count as absent.
    async fn load_owned_live(&self, ctx: &RequestContext, uid: Uuid) -> AppResult<Item> {
        let item = self.load_owned(ctx, uid).await?;
        if item.deleted_at.is_some() {
            return Err(AppError::not_found(format!("Item {uid} is deleted")));
        }
        Ok(item)
    }

    /// Require that `uid` names a live folder owned by the caller.
    async fn require_live_folder(&self, ctx: &RequestContext, uid: Uuid) -> AppResult<()> {
        let parent = self.load_owned_live(ctx, uid).await.map_err(|e| {
            if e.kind == ErrorKind::NotFound {
                AppError::not_found(format!("Parent folder {uid} not found"))
            } else {
                e
            }
        })?;
        if !matches!(parent.kind, notevault_entity::item::ItemKind::Folder) {
            return Err(AppError::validation(format!(
                "Item {uid} is not a folder and cannot contain children"
            )));
        }
        Ok(())
    }

    /// Reject a reparent that would make `uid` its own ancestor.
    async fn require_no_cycle(&self, uid: Uuid, new_parent: Uuid) -> AppResult<()> {
        let mut cursor = Some(new_parent);
        while let Some(current) = cursor {
            if current == uid {
                return Err(AppError::validation(
                    "Move rejected: the target folder is inside the item being moved",
                ));
            }
            cursor = self
                .repo
                .find_by_uid(current)
                .await?
                .and_then(|item| item.parent_uid);
        }
        Ok(())
    }
}

/// SHA-256 hex fingerprint of text content, as stored in `version`.
pub fn content_hash(text: &str) -> String {
    hex::encode(Sha256::digest(text.as_bytes()))
}

//! Item service integration tests against in-memory collaborators.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use uuid::Uuid;

use notevault_core::error::{AppError, ErrorKind};
use notevault_core::result::AppResult;
use notevault_core::traits::BlobStore;
use notevault_database::ItemRepository;
use notevault_entity::item::{Item, ItemKind, NewItem};
use notevault_service::item::merge::merge;
use notevault_service::item::service::content_hash;
use notevault_service::{
    ItemService, MetadataUpdate, ParentChange, RequestContext, ResourceLock, TextUpdate,
    TextUpdateOutcome,
};
use notevault_storage::MemoryBlobStore;

/// In-memory row store enforcing the live sibling-name uniqueness the
/// real Postgres schema provides via a partial unique index.
#[derive(Debug, Default)]
struct FakeItemRepository {
    rows: Mutex<Vec<Item>>,
}

impl FakeItemRepository {
    fn has_live_sibling(rows: &[Item], candidate: &Item) -> bool {
        rows.iter().any(|row| {
            row.uid != candidate.uid
                && row.owner_id == candidate.owner_id
                && row.parent_uid == candidate.parent_uid
                && row.name == candidate.name
                && row.deleted_at.is_none()
        })
    }
}

#[async_trait]
impl ItemRepository for FakeItemRepository {
    async fn insert(&self, item: &NewItem) -> AppResult<Item> {
        let mut rows = self.rows.lock().unwrap();
        let now = Utc::now();
        let row = Item {
            uid: item.uid,
            parent_uid: item.parent_uid,
            owner_id: item.owner_id,
            name: item.name.clone(),
            kind: item.kind,
            version: None,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        if Self::has_live_sibling(&rows, &row) {
            return Err(AppError::duplicate_name(
                "A live sibling with this name already exists",
            ));
        }
        rows.push(row.clone());
        Ok(row)
    }

    async fn find_by_uid(&self, uid: Uuid) -> AppResult<Option<Item>> {
        let rows = self.rows.lock().unwrap();
        Ok(rows.iter().find(|row| row.uid == uid).cloned())
    }

    async fn find_live_sibling(
        &self,
        owner_id: Uuid,
        parent_uid: Option<Uuid>,
        name: &str,
    ) -> AppResult<Option<Item>> {
        let rows = self.rows.lock().unwrap();
        Ok(rows
            .iter()
            .find(|row| {
                row.owner_id == owner_id
                    && row.parent_uid == parent_uid
                    && row.name == name
                    && row.deleted_at.is_none()
            })
            .cloned())
    }

    async fn live_sibling_names(
        &self,
        owner_id: Uuid,
        parent_uid: Option<Uuid>,
    ) -> AppResult<Vec<String>> {
        let rows = self.rows.lock().unwrap();
        Ok(rows
            .iter()
            .filter(|row| {
                row.owner_id == owner_id
                    && row.parent_uid == parent_uid
                    && row.deleted_at.is_none()
            })
            .map(|row| row.name.clone())
            .collect())
    }

    async fn live_children(&self, parent_uid: Uuid) -> AppResult<Vec<Item>> {
        let rows = self.rows.lock().unwrap();
        Ok(rows
            .iter()
            .filter(|row| row.parent_uid == Some(parent_uid) && row.deleted_at.is_none())
            .cloned()
            .collect())
    }

    async fn list_live(&self, owner_id: Uuid) -> AppResult<Vec<Item>> {
        let rows = self.rows.lock().unwrap();
        Ok(rows
            .iter()
            .filter(|row| row.owner_id == owner_id && row.deleted_at.is_none())
            .cloned()
            .collect())
    }

    async fn list_deleted(&self, owner_id: Uuid) -> AppResult<Vec<Item>> {
        let rows = self.rows.lock().unwrap();
        Ok(rows
            .iter()
            .filter(|row| row.owner_id == owner_id && row.deleted_at.is_some())
            .cloned()
            .collect())
    }

    async fn update(&self, item: &Item) -> AppResult<Item> {
        let mut rows = self.rows.lock().unwrap();
        if item.deleted_at.is_none() && Self::has_live_sibling(&rows, item) {
            return Err(AppError::duplicate_name(
                "A live sibling with this name already exists",
            ));
        }
        let row = rows
            .iter_mut()
            .find(|row| row.uid == item.uid)
            .ok_or_else(|| AppError::not_found(format!("Item {} not found", item.uid)))?;
        *row = item.clone();
        Ok(row.clone())
    }

    async fn delete_row(&self, uid: Uuid) -> AppResult<bool> {
        let mut rows = self.rows.lock().unwrap();
        let before = rows.len();
        rows.retain(|row| row.uid != uid);
        Ok(rows.len() < before)
    }
}

/// Blob store with switchable failures for the compensation paths.
#[derive(Debug, Default)]
struct FlakyBlobStore {
    inner: MemoryBlobStore,
    fail_put: AtomicBool,
    fail_get: AtomicBool,
    fail_delete: AtomicBool,
}

#[async_trait]
impl BlobStore for FlakyBlobStore {
    fn provider_type(&self) -> &str {
        "flaky"
    }

    async fn health_check(&self) -> AppResult<bool> {
        Ok(true)
    }

    async fn put(&self, uid: Uuid, data: Bytes) -> AppResult<()> {
        if self.fail_put.load(Ordering::SeqCst) {
            return Err(AppError::storage("injected put failure"));
        }
        self.inner.put(uid, data).await
    }

    async fn get(&self, uid: Uuid) -> AppResult<Bytes> {
        if self.fail_get.load(Ordering::SeqCst) {
            return Err(AppError::storage("injected get failure"));
        }
        self.inner.get(uid).await
    }

    async fn delete(&self, uid: Uuid) -> AppResult<()> {
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(AppError::storage("injected delete failure"));
        }
        self.inner.delete(uid).await
    }

    async fn size(&self, uid: Uuid) -> AppResult<u64> {
        self.inner.size(uid).await
    }

    async fn exists(&self, uid: Uuid) -> AppResult<bool> {
        self.inner.exists(uid).await
    }
}

struct Harness {
    service: ItemService,
    repo: Arc<FakeItemRepository>,
    blobs: Arc<FlakyBlobStore>,
    locks: ResourceLock,
    ctx: RequestContext,
}

fn harness() -> Harness {
    let repo = Arc::new(FakeItemRepository::default());
    let blobs = Arc::new(FlakyBlobStore::default());
    let locks = ResourceLock::new();
    let service = ItemService::new(repo.clone(), blobs.clone(), locks.clone());
    Harness {
        service,
        repo,
        blobs,
        locks,
        ctx: RequestContext::new(Uuid::new_v4()),
    }
}

fn new_item(ctx: &RequestContext, parent: Option<Uuid>, name: &str, kind: ItemKind) -> NewItem {
    NewItem {
        uid: Uuid::new_v4(),
        parent_uid: parent,
        owner_id: ctx.user_id,
        name: name.to_string(),
        kind,
    }
}

async fn create_document(h: &Harness, name: &str) -> Item {
    h.service
        .create(&h.ctx, new_item(&h.ctx, None, name, ItemKind::Document))
        .await
        .expect("create document")
}

async fn write_text(h: &Harness, uid: Uuid, text: &str) -> String {
    let stored = h.repo.find_by_uid(uid).await.unwrap().unwrap();
    let result = h
        .service
        .update_text(
            &h.ctx,
            uid,
            TextUpdate {
                baseline_version: stored.version,
                baseline_text: String::new(),
                new_text: text.to_string(),
            },
        )
        .await
        .expect("write text");
    result.version
}

#[tokio::test]
async fn test_create_document_has_null_version_and_empty_blob() {
    let h = harness();
    let item = create_document(&h, "notes").await;

    assert_eq!(item.version, None);
    assert_eq!(h.blobs.get(item.uid).await.unwrap(), Bytes::new());
}

#[tokio::test]
async fn test_create_folder_has_no_blob() {
    let h = harness();
    let folder = h
        .service
        .create(&h.ctx, new_item(&h.ctx, None, "stuff", ItemKind::Folder))
        .await
        .unwrap();

    assert!(!h.blobs.exists(folder.uid).await.unwrap());
}

#[tokio::test]
async fn test_create_duplicate_live_sibling_name_rejected() {
    let h = harness();
    create_document(&h, "notes").await;

    let err = h
        .service
        .create(&h.ctx, new_item(&h.ctx, None, "notes", ItemKind::Document))
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::DuplicateName);
}

#[tokio::test]
async fn test_create_rolls_back_row_when_blob_init_fails() {
    let h = harness();
    h.blobs.fail_put.store(true, Ordering::SeqCst);

    let item = new_item(&h.ctx, None, "notes", ItemKind::Document);
    let uid = item.uid;
    let err = h.service.create(&h.ctx, item).await.unwrap_err();

    assert_eq!(err.kind, ErrorKind::WriteFailure);
    assert_eq!(h.repo.find_by_uid(uid).await.unwrap(), None);
}

#[tokio::test]
async fn test_create_under_non_folder_parent_rejected() {
    let h = harness();
    let doc = create_document(&h, "notes").await;

    let err = h
        .service
        .create(
            &h.ctx,
            new_item(&h.ctx, Some(doc.uid), "child", ItemKind::Document),
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Validation);
}

#[tokio::test]
async fn test_update_text_first_write_fast_forwards() {
    let h = harness();
    let item = create_document(&h, "notes").await;

    let result = h
        .service
        .update_text(
            &h.ctx,
            item.uid,
            TextUpdate {
                baseline_version: None,
                baseline_text: String::new(),
                new_text: "hello world".to_string(),
            },
        )
        .await
        .unwrap();

    assert_eq!(result.outcome, TextUpdateOutcome::FastForward);
    assert_eq!(result.version, content_hash("hello world"));
    assert_eq!(
        h.blobs.get(item.uid).await.unwrap(),
        Bytes::from_static(b"hello world")
    );
}

#[tokio::test]
async fn test_update_text_current_baseline_fast_forwards() {
    let h = harness();
    let item = create_document(&h, "notes").await;
    let v1 = write_text(&h, item.uid, "line1\nline2").await;

    let result = h
        .service
        .update_text(
            &h.ctx,
            item.uid,
            TextUpdate {
                baseline_version: Some(v1),
                baseline_text: "line1\nline2".to_string(),
                new_text: "line1\nline2\nline3".to_string(),
            },
        )
        .await
        .unwrap();

    assert_eq!(result.outcome, TextUpdateOutcome::FastForward);
    assert_eq!(result.version, content_hash("line1\nline2\nline3"));
}

#[tokio::test]
async fn test_update_text_stale_baseline_merges() {
    let h = harness();
    let item = create_document(&h, "notes").await;

    let base = "line1\nline2\nline3";
    let v_base = write_text(&h, item.uid, base).await;

    // Another editor advances the server past this editor's baseline.
    let server = "line1\nserver line2\nline3";
    h.service
        .update_text(
            &h.ctx,
            item.uid,
            TextUpdate {
                baseline_version: Some(v_base.clone()),
                baseline_text: base.to_string(),
                new_text: server.to_string(),
            },
        )
        .await
        .unwrap();

    // The stale editor submits against the original baseline.
    let user = "line1\nuser line2\nline3";
    let result = h
        .service
        .update_text(
            &h.ctx,
            item.uid,
            TextUpdate {
                baseline_version: Some(v_base),
                baseline_text: base.to_string(),
                new_text: user.to_string(),
            },
        )
        .await
        .unwrap();

    let expected = merge(base, server, user);
    assert_eq!(result.outcome, TextUpdateOutcome::Merged);
    assert_eq!(result.version, content_hash(&expected));
    assert_eq!(
        h.blobs.get(item.uid).await.unwrap(),
        Bytes::from(expected.into_bytes())
    );
}

#[tokio::test]
async fn test_update_text_read_failure_aborts_merge_path() {
    let h = harness();
    let item = create_document(&h, "notes").await;
    let v1 = write_text(&h, item.uid, "server text").await;

    h.blobs.fail_get.store(true, Ordering::SeqCst);

    let err = h
        .service
        .update_text(
            &h.ctx,
            item.uid,
            TextUpdate {
                baseline_version: Some("stale".to_string()),
                baseline_text: String::new(),
                new_text: "user text".to_string(),
            },
        )
        .await
        .unwrap_err();

    // Never silently fast-forward over unreadable server content.
    assert_eq!(err.kind, ErrorKind::ReadFailure);
    let stored = h.repo.find_by_uid(item.uid).await.unwrap().unwrap();
    assert_eq!(stored.version, Some(v1));
}

#[tokio::test]
async fn test_update_text_on_folder_rejected() {
    let h = harness();
    let folder = h
        .service
        .create(&h.ctx, new_item(&h.ctx, None, "stuff", ItemKind::Folder))
        .await
        .unwrap();

    let err = h
        .service
        .update_text(
            &h.ctx,
            folder.uid,
            TextUpdate {
                baseline_version: None,
                baseline_text: String::new(),
                new_text: "text".to_string(),
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Validation);
}

#[tokio::test]
async fn test_locked_item_is_resource_busy_until_released() {
    let h = harness();
    let item = create_document(&h, "notes").await;

    let guard = h.locks.try_acquire(item.uid).unwrap();
    let err = h
        .service
        .update_text(
            &h.ctx,
            item.uid,
            TextUpdate {
                baseline_version: None,
                baseline_text: String::new(),
                new_text: "blocked".to_string(),
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::ResourceBusy);

    drop(guard);
    write_text(&h, item.uid, "unblocked").await;
}

#[tokio::test]
async fn test_interleaved_writers_cannot_both_fast_forward() {
    let h = harness();
    let item = create_document(&h, "notes").await;
    let v0 = write_text(&h, item.uid, "shared baseline").await;

    // Writer A lands first against v0.
    let a = h
        .service
        .update_text(
            &h.ctx,
            item.uid,
            TextUpdate {
                baseline_version: Some(v0.clone()),
                baseline_text: "shared baseline".to_string(),
                new_text: "writer a".to_string(),
            },
        )
        .await
        .unwrap();
    assert_eq!(a.outcome, TextUpdateOutcome::FastForward);

    // Writer B was serialized behind A; its view of the stored version now
    // reflects A's completed write, so the same baseline must merge.
    let b = h
        .service
        .update_text(
            &h.ctx,
            item.uid,
            TextUpdate {
                baseline_version: Some(v0),
                baseline_text: "shared baseline".to_string(),
                new_text: "writer b".to_string(),
            },
        )
        .await
        .unwrap();
    assert_eq!(b.outcome, TextUpdateOutcome::Merged);
}

#[tokio::test]
async fn test_soft_delete_cascades_to_all_descendants() {
    let h = harness();
    let root = h
        .service
        .create(&h.ctx, new_item(&h.ctx, None, "root", ItemKind::Folder))
        .await
        .unwrap();
    let sub = h
        .service
        .create(
            &h.ctx,
            new_item(&h.ctx, Some(root.uid), "sub", ItemKind::Folder),
        )
        .await
        .unwrap();
    let doc_in_root = h
        .service
        .create(
            &h.ctx,
            new_item(&h.ctx, Some(root.uid), "a", ItemKind::Document),
        )
        .await
        .unwrap();
    let doc_in_sub = h
        .service
        .create(
            &h.ctx,
            new_item(&h.ctx, Some(sub.uid), "b", ItemKind::Document),
        )
        .await
        .unwrap();

    h.service.soft_delete(&h.ctx, root.uid).await.unwrap();

    for uid in [root.uid, sub.uid, doc_in_root.uid, doc_in_sub.uid] {
        let row = h.repo.find_by_uid(uid).await.unwrap().unwrap();
        assert!(row.deleted_at.is_some(), "item {uid} should be deleted");
    }
    assert!(h.service.list_live(&h.ctx).await.unwrap().is_empty());
    assert_eq!(h.service.list_deleted(&h.ctx).await.unwrap().len(), 4);
}

#[tokio::test]
async fn test_soft_delete_aborts_on_locked_descendant() {
    let h = harness();
    let root = h
        .service
        .create(&h.ctx, new_item(&h.ctx, None, "root", ItemKind::Folder))
        .await
        .unwrap();
    let child = h
        .service
        .create(
            &h.ctx,
            new_item(&h.ctx, Some(root.uid), "child", ItemKind::Document),
        )
        .await
        .unwrap();

    let _guard = h.locks.try_acquire(child.uid).unwrap();
    let err = h.service.soft_delete(&h.ctx, root.uid).await.unwrap_err();

    assert_eq!(err.kind, ErrorKind::ResourceBusy);
    let root_row = h.repo.find_by_uid(root.uid).await.unwrap().unwrap();
    assert!(root_row.deleted_at.is_none(), "parent must stay live");
}

#[tokio::test]
async fn test_restore_without_collision_keeps_name() {
    let h = harness();
    let folder = h
        .service
        .create(&h.ctx, new_item(&h.ctx, None, "stuff", ItemKind::Folder))
        .await
        .unwrap();
    let doc = h
        .service
        .create(
            &h.ctx,
            new_item(&h.ctx, Some(folder.uid), "notes", ItemKind::Document),
        )
        .await
        .unwrap();

    h.service.soft_delete(&h.ctx, doc.uid).await.unwrap();
    let restored = h.service.restore(&h.ctx, doc.uid).await.unwrap();

    assert_eq!(restored.name, "notes");
    assert_eq!(restored.parent_uid, None);
    assert!(restored.deleted_at.is_none());
}

#[tokio::test]
async fn test_restore_collision_appends_next_suffix() {
    let h = harness();
    let folder = h
        .service
        .create(&h.ctx, new_item(&h.ctx, None, "stuff", ItemKind::Folder))
        .await
        .unwrap();
    let trashed = h
        .service
        .create(
            &h.ctx,
            new_item(&h.ctx, Some(folder.uid), "notes", ItemKind::Document),
        )
        .await
        .unwrap();
    h.service.soft_delete(&h.ctx, trashed.uid).await.unwrap();

    // Live root-level items now claim the name and a numbered variant.
    create_document(&h, "notes").await;
    create_document(&h, "notes_3").await;

    let restored = h.service.restore(&h.ctx, trashed.uid).await.unwrap();
    assert_eq!(restored.name, "notes_4");
}

#[tokio::test]
async fn test_restore_of_live_item_is_not_found() {
    let h = harness();
    let doc = create_document(&h, "notes").await;

    let err = h.service.restore(&h.ctx, doc.uid).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::NotFound);
}

#[tokio::test]
async fn test_permanent_delete_removes_blob_and_row() {
    let h = harness();
    let item = create_document(&h, "notes").await;
    write_text(&h, item.uid, "content").await;

    h.service.permanent_delete(&h.ctx, item.uid).await.unwrap();

    assert!(!h.blobs.exists(item.uid).await.unwrap());
    assert_eq!(h.repo.find_by_uid(item.uid).await.unwrap(), None);

    let err = h
        .service
        .permanent_delete(&h.ctx, item.uid)
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::NotFound);
}

#[tokio::test]
async fn test_permanent_delete_is_retryable_after_blob_failure() {
    let h = harness();
    let item = create_document(&h, "notes").await;

    h.blobs.fail_delete.store(true, Ordering::SeqCst);
    let err = h
        .service
        .permanent_delete(&h.ctx, item.uid)
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::WriteFailure);
    assert!(
        h.repo.find_by_uid(item.uid).await.unwrap().is_some(),
        "row must survive a failed blob delete so the operation can retry"
    );

    h.blobs.fail_delete.store(false, Ordering::SeqCst);
    h.service.permanent_delete(&h.ctx, item.uid).await.unwrap();
}

#[tokio::test]
async fn test_update_metadata_rename_leaves_parent_alone() {
    let h = harness();
    let folder = h
        .service
        .create(&h.ctx, new_item(&h.ctx, None, "stuff", ItemKind::Folder))
        .await
        .unwrap();
    let doc = h
        .service
        .create(
            &h.ctx,
            new_item(&h.ctx, Some(folder.uid), "notes", ItemKind::Document),
        )
        .await
        .unwrap();

    let updated = h
        .service
        .update_metadata(
            &h.ctx,
            doc.uid,
            MetadataUpdate {
                name: Some("renamed".to_string()),
                parent: ParentChange::Unchanged,
            },
        )
        .await
        .unwrap();

    assert_eq!(updated.name, "renamed");
    assert_eq!(updated.parent_uid, Some(folder.uid));
}

#[tokio::test]
async fn test_update_metadata_explicit_move_to_root() {
    let h = harness();
    let folder = h
        .service
        .create(&h.ctx, new_item(&h.ctx, None, "stuff", ItemKind::Folder))
        .await
        .unwrap();
    let doc = h
        .service
        .create(
            &h.ctx,
            new_item(&h.ctx, Some(folder.uid), "notes", ItemKind::Document),
        )
        .await
        .unwrap();

    let updated = h
        .service
        .update_metadata(
            &h.ctx,
            doc.uid,
            MetadataUpdate {
                name: None,
                parent: ParentChange::ToRoot,
            },
        )
        .await
        .unwrap();

    assert_eq!(updated.parent_uid, None);
    assert_eq!(updated.name, "notes");
}

#[tokio::test]
async fn test_update_metadata_rejects_cycle() {
    let h = harness();
    let outer = h
        .service
        .create(&h.ctx, new_item(&h.ctx, None, "outer", ItemKind::Folder))
        .await
        .unwrap();
    let inner = h
        .service
        .create(
            &h.ctx,
            new_item(&h.ctx, Some(outer.uid), "inner", ItemKind::Folder),
        )
        .await
        .unwrap();

    let err = h
        .service
        .update_metadata(
            &h.ctx,
            outer.uid,
            MetadataUpdate {
                name: None,
                parent: ParentChange::To(inner.uid),
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Validation);
}

#[tokio::test]
async fn test_other_user_cannot_mutate() {
    let h = harness();
    let item = create_document(&h, "notes").await;

    let stranger = RequestContext::new(Uuid::new_v4());
    assert!(!h.service.is_owned(&stranger, item.uid).await.unwrap());

    let err = h
        .service
        .soft_delete(&stranger, item.uid)
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Unauthorized);
}

#[tokio::test]
async fn test_listings_filter_by_owner_and_deletion() {
    let h = harness();
    let first = create_document(&h, "first").await;
    let second = create_document(&h, "second").await;
    create_document(&h, "third").await;

    h.service.soft_delete(&h.ctx, second.uid).await.unwrap();

    let live = h.service.list_live(&h.ctx).await.unwrap();
    assert_eq!(
        live.iter().map(|s| s.name.as_str()).collect::<Vec<_>>(),
        vec!["first", "third"]
    );
    assert_eq!(live[0].uid, first.uid);

    let deleted = h.service.list_deleted(&h.ctx).await.unwrap();
    assert_eq!(deleted.len(), 1);
    assert_eq!(deleted[0].uid, second.uid);

    let stranger = RequestContext::new(Uuid::new_v4());
    assert!(h.service.list_live(&stranger).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_read_document_returns_content_and_version() {
    let h = harness();
    let item = create_document(&h, "notes").await;
    let version = write_text(&h, item.uid, "hello").await;

    let (content, stored_version) = h.service.read_document(&h.ctx, item.uid).await.unwrap();
    assert_eq!(content, "hello");
    assert_eq!(stored_version, Some(version));
}

#[tokio::test]
async fn test_content_size_reports_blob_size() {
    let h = harness();
    let item = create_document(&h, "notes").await;
    write_text(&h, item.uid, "12345").await;

    assert_eq!(h.service.content_size(&h.ctx, item.uid).await.unwrap(), 5);
}

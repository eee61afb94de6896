//! Postgres item repository implementation.

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use notevault_core::error::{AppError, ErrorKind};
use notevault_core::result::AppResult;
use notevault_entity::item::{Item, NewItem};

use super::ItemRepository;

/// Repository for item row CRUD and query operations.
#[derive(Debug, Clone)]
pub struct PgItemRepository {
    pool: PgPool,
}

impl PgItemRepository {
    /// Create a new item repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Map a sqlx error, turning unique-index violations into `DuplicateName`.
fn map_write_error(e: sqlx::Error, context: &str) -> AppError {
    let unique = e
        .as_database_error()
        .is_some_and(|db| db.is_unique_violation());
    if unique {
        AppError::duplicate_name("A live sibling with this name already exists")
    } else {
        AppError::with_source(ErrorKind::Database, context.to_string(), e)
    }
}

#[async_trait]
impl ItemRepository for PgItemRepository {
    async fn insert(&self, item: &NewItem) -> AppResult<Item> {
        sqlx::query_as::<_, Item>(
            "INSERT INTO items (uid, parent_uid, owner_id, name, kind) \
             VALUES ($1, $2, $3, $4, $5) RETURNING *",
        )
        .bind(item.uid)
        .bind(item.parent_uid)
        .bind(item.owner_id)
        .bind(&item.name)
        .bind(item.kind)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_write_error(e, "Failed to insert item"))
    }

    async fn find_by_uid(&self, uid: Uuid) -> AppResult<Option<Item>> {
        sqlx::query_as::<_, Item>("SELECT * FROM items WHERE uid = $1")
            .bind(uid)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to find item", e))
    }

    async fn find_live_sibling(
        &self,
        owner_id: Uuid,
        parent_uid: Option<Uuid>,
        name: &str,
    ) -> AppResult<Option<Item>> {
        sqlx::query_as::<_, Item>(
            "SELECT * FROM items \
             WHERE owner_id = $1 AND parent_uid IS NOT DISTINCT FROM $2 \
               AND name = $3 AND deleted_at IS NULL",
        )
        .bind(owner_id)
        .bind(parent_uid)
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to find sibling by name", e)
        })
    }

    async fn live_sibling_names(
        &self,
        owner_id: Uuid,
        parent_uid: Option<Uuid>,
    ) -> AppResult<Vec<String>> {
        sqlx::query_scalar::<_, String>(
            "SELECT name FROM items \
             WHERE owner_id = $1 AND parent_uid IS NOT DISTINCT FROM $2 \
               AND deleted_at IS NULL",
        )
        .bind(owner_id)
        .bind(parent_uid)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to list sibling names", e))
    }

    async fn live_children(&self, parent_uid: Uuid) -> AppResult<Vec<Item>> {
        sqlx::query_as::<_, Item>(
            "SELECT * FROM items \
             WHERE parent_uid = $1 AND deleted_at IS NULL ORDER BY created_at ASC",
        )
        .bind(parent_uid)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to list children", e))
    }

    async fn list_live(&self, owner_id: Uuid) -> AppResult<Vec<Item>> {
        sqlx::query_as::<_, Item>(
            "SELECT * FROM items \
             WHERE owner_id = $1 AND deleted_at IS NULL ORDER BY created_at ASC",
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to list live items", e))
    }

    async fn list_deleted(&self, owner_id: Uuid) -> AppResult<Vec<Item>> {
        sqlx::query_as::<_, Item>(
            "SELECT * FROM items \
             WHERE owner_id = $1 AND deleted_at IS NOT NULL ORDER BY created_at ASC",
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to list deleted items", e))
    }

    async fn update(&self, item: &Item) -> AppResult<Item> {
        sqlx::query_as::<_, Item>(
            "UPDATE items SET parent_uid = $2, name = $3, version = $4, \
             updated_at = $5, deleted_at = $6 \
             WHERE uid = $1 RETURNING *",
        )
        .bind(item.uid)
        .bind(item.parent_uid)
        .bind(&item.name)
        .bind(&item.version)
        .bind(item.updated_at)
        .bind(item.deleted_at)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_write_error(e, "Failed to update item"))?
        .ok_or_else(|| AppError::not_found(format!("Item {} not found", item.uid)))
    }

    async fn delete_row(&self, uid: Uuid) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM items WHERE uid = $1")
            .bind(uid)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to delete item", e))?;
        Ok(result.rows_affected() > 0)
    }
}

//! Repository layer for database operations
//!
//! This module provides CRUD operations for all entities.
//!
//! Two invariants are enforced here rather than in callers:
//! - the storage ledger only moves through atomic SQL increments,
//!   with the quota ceiling checked inside the same statement
//! - every grant mutation recomputes the owning item's denormalized
//!   `is_shared` flag before returning

use super::models::*;
use crate::config::DEFAULT_STORAGE_QUOTA_BYTES;
use crate::error::{AppError, Result};
use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use uuid::Uuid;

fn unique_violation(err: sqlx::Error, conflict: &str) -> AppError {
    let is_unique = matches!(&err, sqlx::Error::Database(db) if db.is_unique_violation());

    if is_unique {
        AppError::Conflict(conflict.to_string())
    } else {
        AppError::Database(err)
    }
}

/// Repository for database operations
#[derive(Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    #[cfg(test)]
    pub(crate) fn pool_for_tests(&self) -> &SqlitePool {
        &self.pool
    }

    // ===== Users =====

    /// Create a new user with the default quota.
    pub async fn create_user(
        &self,
        username: &str,
        email: &str,
        password_hash: &str,
    ) -> Result<User> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();

        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, username, email, password_hash,
                               storage_quota_bytes, used_storage_bytes, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, 0, ?, ?)
            RETURNING *
            "#,
        )
        .bind(&id)
        .bind(username)
        .bind(email)
        .bind(password_hash)
        .bind(DEFAULT_STORAGE_QUOTA_BYTES)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| unique_violation(e, "Username or email already exists."))?;

        tracing::debug!("Created user: {}", id);
        Ok(user)
    }

    /// Get a user by ID
    pub async fn get_user(&self, id: &str) -> Result<User> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("User".to_string()))
    }

    /// Apply a signed byte delta to a user's storage ledger.
    ///
    /// Positive deltas are applied with the quota ceiling checked in the
    /// same UPDATE, so enforcement cannot race with a concurrent writer.
    /// Negative deltas always apply.
    pub async fn apply_storage_delta(&self, user_id: &str, delta: i64) -> Result<()> {
        let now = Utc::now();

        let rows = if delta > 0 {
            sqlx::query(
                r#"
                UPDATE users
                SET used_storage_bytes = used_storage_bytes + ?, updated_at = ?
                WHERE id = ? AND used_storage_bytes + ? <= storage_quota_bytes
                "#,
            )
            .bind(delta)
            .bind(now)
            .bind(user_id)
            .bind(delta)
            .execute(&self.pool)
            .await?
            .rows_affected()
        } else {
            sqlx::query(
                r#"
                UPDATE users
                SET used_storage_bytes = used_storage_bytes + ?, updated_at = ?
                WHERE id = ?
                "#,
            )
            .bind(delta)
            .bind(now)
            .bind(user_id)
            .execute(&self.pool)
            .await?
            .rows_affected()
        };

        if rows == 0 {
            // Either the user is gone or the conditional update refused.
            self.get_user(user_id).await?;
            return Err(AppError::QuotaExceeded);
        }

        tracing::debug!("Applied storage delta {} for user {}", delta, user_id);
        Ok(())
    }

    // ===== Folders =====

    /// Create a new folder. A sibling with the same name trips the
    /// unique index and surfaces as CONFLICT.
    pub async fn create_folder(
        &self,
        user_id: &str,
        name: &str,
        parent_folder_id: Option<&str>,
        pin_protected: bool,
        pin_hash: Option<&str>,
    ) -> Result<Folder> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();

        let folder = sqlx::query_as::<_, Folder>(
            r#"
            INSERT INTO folders (id, user_id, parent_folder_id, name,
                                 pin_protected, pin_hash, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(&id)
        .bind(user_id)
        .bind(parent_folder_id)
        .bind(name)
        .bind(pin_protected)
        .bind(pin_hash)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| unique_violation(e, "Folder name already exists."))?;

        tracing::debug!("Created folder: {}", id);
        Ok(folder)
    }

    /// Get a folder by ID
    pub async fn get_folder(&self, id: &str) -> Result<Folder> {
        self.find_folder(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Folder".to_string()))
    }

    /// Get a folder by ID, None if absent
    pub async fn find_folder(&self, id: &str) -> Result<Option<Folder>> {
        let folder = sqlx::query_as::<_, Folder>("SELECT * FROM folders WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(folder)
    }

    /// Check for a sibling folder with the same name, optionally
    /// excluding one id (the folder being renamed).
    pub async fn sibling_folder_exists(
        &self,
        user_id: &str,
        parent_folder_id: Option<&str>,
        name: &str,
        exclude_id: Option<&str>,
    ) -> Result<bool> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM folders
            WHERE user_id = ?
              AND COALESCE(parent_folder_id, '') = COALESCE(?, '')
              AND name = ?
              AND id != COALESCE(?, '')
            "#,
        )
        .bind(user_id)
        .bind(parent_folder_id)
        .bind(name)
        .bind(exclude_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count > 0)
    }

    /// List folders under one parent (or the root), paginated.
    /// Returns the page plus the total matching count.
    pub async fn list_folders(
        &self,
        user_id: &str,
        parent_folder_id: Option<&str>,
        page: i64,
        limit: i64,
        sort: SortKey,
        order: SortOrder,
    ) -> Result<(Vec<Folder>, i64)> {
        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM folders
            WHERE user_id = ? AND COALESCE(parent_folder_id, '') = COALESCE(?, '')
            "#,
        )
        .bind(user_id)
        .bind(parent_folder_id)
        .fetch_one(&self.pool)
        .await?;

        let sql = format!(
            r#"
            SELECT * FROM folders
            WHERE user_id = ? AND COALESCE(parent_folder_id, '') = COALESCE(?, '')
            ORDER BY {} {}
            LIMIT ? OFFSET ?
            "#,
            sort.column(),
            order.keyword()
        );

        let folders = sqlx::query_as::<_, Folder>(&sql)
            .bind(user_id)
            .bind(parent_folder_id)
            .bind(limit)
            .bind((page - 1) * limit)
            .fetch_all(&self.pool)
            .await?;

        Ok((folders, total))
    }

    /// Direct child folders of a folder
    pub async fn child_folders(&self, folder_id: &str) -> Result<Vec<Folder>> {
        let folders =
            sqlx::query_as::<_, Folder>("SELECT * FROM folders WHERE parent_folder_id = ?")
                .bind(folder_id)
                .fetch_all(&self.pool)
                .await?;

        Ok(folders)
    }

    /// Persist folder mutations (rename, reparent, PIN toggle)
    pub async fn update_folder(&self, folder: &Folder) -> Result<()> {
        let now = Utc::now();

        sqlx::query(
            r#"
            UPDATE folders
            SET name = ?, parent_folder_id = ?, pin_protected = ?, pin_hash = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&folder.name)
        .bind(&folder.parent_folder_id)
        .bind(folder.pin_protected)
        .bind(&folder.pin_hash)
        .bind(now)
        .bind(&folder.id)
        .execute(&self.pool)
        .await
        .map_err(|e| unique_violation(e, "Folder name already exists."))?;

        tracing::debug!("Updated folder: {}", folder.id);
        Ok(())
    }

    /// Remove a folder record. Descendants are the caller's problem;
    /// the cascade in the tree service processes them first.
    pub async fn delete_folder_row(&self, id: &str) -> Result<()> {
        sqlx::query("DELETE FROM folders WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        tracing::debug!("Deleted folder row: {}", id);
        Ok(())
    }

    // ===== Items =====

    /// Insert a fully built item
    pub async fn insert_item(&self, item: &Item) -> Result<()> {
        let (note_content, file_url, thumbnail_url, file_mime_type) = match &item.kind {
            ItemKind::Note { content } => (Some(content.as_str()), None, None, None),
            ItemKind::Image {
                file_url,
                mime_type,
                thumbnail_url,
            } => (
                None,
                Some(file_url.as_str()),
                Some(thumbnail_url.as_str()),
                Some(mime_type.as_str()),
            ),
            ItemKind::Pdf {
                file_url,
                mime_type,
            } => (None, Some(file_url.as_str()), None, Some(mime_type.as_str())),
        };

        sqlx::query(
            r#"
            INSERT INTO items (id, user_id, parent_folder_id, item_type, name, size_bytes,
                               is_favorite, is_shared, pin_protected, pin_hash,
                               note_content, file_url, thumbnail_url, file_mime_type,
                               created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&item.id)
        .bind(&item.user_id)
        .bind(&item.parent_folder_id)
        .bind(item.kind.item_type().as_str())
        .bind(&item.name)
        .bind(item.size_bytes)
        .bind(item.is_favorite)
        .bind(item.is_shared)
        .bind(item.pin_protected)
        .bind(&item.pin_hash)
        .bind(note_content)
        .bind(file_url)
        .bind(thumbnail_url)
        .bind(file_mime_type)
        .bind(item.created_at)
        .bind(item.updated_at)
        .execute(&self.pool)
        .await?;

        tracing::debug!("Created item: {} ({})", item.id, item.kind.item_type().as_str());
        Ok(())
    }

    /// Get an item by ID
    pub async fn get_item(&self, id: &str) -> Result<Item> {
        sqlx::query_as::<_, Item>("SELECT * FROM items WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("Item".to_string()))
    }

    /// Items directly inside one folder
    pub async fn items_in_folder(&self, folder_id: &str) -> Result<Vec<Item>> {
        let items = sqlx::query_as::<_, Item>("SELECT * FROM items WHERE parent_folder_id = ?")
            .bind(folder_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(items)
    }

    /// Persist item mutations. `is_shared` is deliberately not written
    /// here; only grant operations may move it.
    pub async fn update_item(&self, item: &Item) -> Result<()> {
        let now = Utc::now();

        let note_content = match &item.kind {
            ItemKind::Note { content } => Some(content.as_str()),
            _ => None,
        };

        sqlx::query(
            r#"
            UPDATE items
            SET name = ?, parent_folder_id = ?, size_bytes = ?, is_favorite = ?,
                pin_protected = ?, pin_hash = ?, note_content = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&item.name)
        .bind(&item.parent_folder_id)
        .bind(item.size_bytes)
        .bind(item.is_favorite)
        .bind(item.pin_protected)
        .bind(&item.pin_hash)
        .bind(note_content)
        .bind(now)
        .bind(&item.id)
        .execute(&self.pool)
        .await?;

        tracing::debug!("Updated item: {}", item.id);
        Ok(())
    }

    /// Remove an item record
    pub async fn delete_item_row(&self, id: &str) -> Result<()> {
        sqlx::query("DELETE FROM items WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        tracing::debug!("Deleted item row: {}", id);
        Ok(())
    }

    fn push_item_visibility_and_filters(
        qb: &mut QueryBuilder<'_, Sqlite>,
        user_id: &str,
        query: &ItemListQuery,
    ) {
        // Owned union shared-with; folder ownership never leaks items.
        qb.push(" WHERE (user_id = ");
        qb.push_bind(user_id.to_string());
        qb.push(" OR id IN (SELECT item_id FROM shared_permissions WHERE shared_with_user_id = ");
        qb.push_bind(user_id.to_string());
        qb.push("))");

        if let Some(parent) = &query.parent_folder_id {
            qb.push(" AND parent_folder_id = ");
            qb.push_bind(parent.clone());
        }
        if let Some(item_type) = query.item_type {
            qb.push(" AND item_type = ");
            qb.push_bind(item_type.as_str());
        }
        if let Some(search) = &query.search {
            let pattern = format!("%{}%", search);
            qb.push(" AND (name LIKE ");
            qb.push_bind(pattern.clone());
            qb.push(" OR note_content LIKE ");
            qb.push_bind(pattern);
            qb.push(")");
        }
        if let Some(from) = query.date_from {
            qb.push(" AND created_at >= ");
            qb.push_bind(from);
        }
        if let Some(to) = query.date_to {
            qb.push(" AND created_at <= ");
            qb.push_bind(to);
        }
    }

    /// List items visible to a user (owned or shared with them),
    /// filtered, sorted and paginated. Returns the page plus the total
    /// matching count.
    pub async fn list_items(
        &self,
        user_id: &str,
        query: &ItemListQuery,
    ) -> Result<(Vec<Item>, i64)> {
        let mut count_qb: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT COUNT(*) FROM items");
        Self::push_item_visibility_and_filters(&mut count_qb, user_id, query);
        let total: i64 = count_qb.build_query_scalar().fetch_one(&self.pool).await?;

        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT * FROM items");
        Self::push_item_visibility_and_filters(&mut qb, user_id, query);
        qb.push(format_args!(
            " ORDER BY {} {}",
            query.sort.column(),
            query.order.keyword()
        ));
        qb.push(" LIMIT ");
        qb.push_bind(query.limit);
        qb.push(" OFFSET ");
        qb.push_bind((query.page - 1) * query.limit);

        let items = qb.build_query_as::<Item>().fetch_all(&self.pool).await?;

        Ok((items, total))
    }

    /// Per-type usage aggregation over a user's own items
    pub async fn usage_by_type(&self, user_id: &str) -> Result<Vec<(String, i64, i64, f64)>> {
        let rows = sqlx::query_as::<_, (String, i64, i64, f64)>(
            r#"
            SELECT item_type,
                   COUNT(*),
                   COALESCE(SUM(size_bytes), 0),
                   COALESCE(AVG(size_bytes), 0.0)
            FROM items
            WHERE user_id = ?
            GROUP BY item_type
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// A user's own items created inside a time window, oldest first
    pub async fn items_created_between(
        &self,
        user_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        item_type: Option<ItemType>,
    ) -> Result<Vec<Item>> {
        let mut qb: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT * FROM items WHERE user_id = ");
        qb.push_bind(user_id.to_string());
        qb.push(" AND created_at >= ");
        qb.push_bind(from);
        qb.push(" AND created_at <= ");
        qb.push_bind(to);
        if let Some(item_type) = item_type {
            qb.push(" AND item_type = ");
            qb.push_bind(item_type.as_str());
        }
        qb.push(" ORDER BY created_at ASC");

        let items = qb.build_query_as::<Item>().fetch_all(&self.pool).await?;

        Ok(items)
    }

    // ===== Sharing grants =====
    //
    // All grant writes go through upsert_grant/remove_grant below, which
    // recompute the item's is_shared flag in the same call.

    /// Create or update a grant for (item, shared-with user)
    pub async fn upsert_grant(
        &self,
        item_id: &str,
        shared_by_user_id: &str,
        shared_with_user_id: &str,
        can_edit: bool,
        can_favorite: bool,
    ) -> Result<SharingGrant> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();

        let grant = sqlx::query_as::<_, SharingGrant>(
            r#"
            INSERT INTO shared_permissions (id, item_id, shared_by_user_id, shared_with_user_id,
                                            can_view, can_edit, can_favorite, created_at, updated_at)
            VALUES (?, ?, ?, ?, 1, ?, ?, ?, ?)
            ON CONFLICT(item_id, shared_with_user_id) DO UPDATE
                SET can_edit = excluded.can_edit,
                    can_favorite = excluded.can_favorite,
                    updated_at = excluded.updated_at
            RETURNING *
            "#,
        )
        .bind(&id)
        .bind(item_id)
        .bind(shared_by_user_id)
        .bind(shared_with_user_id)
        .bind(can_edit)
        .bind(can_favorite)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        self.refresh_shared_flag(item_id).await?;

        tracing::debug!("Granted access on item {} to user {}", item_id, shared_with_user_id);
        Ok(grant)
    }

    /// Remove one grant; NOT_FOUND if it never existed
    pub async fn remove_grant(&self, item_id: &str, shared_with_user_id: &str) -> Result<()> {
        let rows = sqlx::query(
            "DELETE FROM shared_permissions WHERE item_id = ? AND shared_with_user_id = ?",
        )
        .bind(item_id)
        .bind(shared_with_user_id)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if rows == 0 {
            return Err(AppError::NotFound("Share".to_string()));
        }

        self.refresh_shared_flag(item_id).await?;

        tracing::debug!("Revoked access on item {} from user {}", item_id, shared_with_user_id);
        Ok(())
    }

    /// Look up the grant a user holds on an item
    pub async fn find_grant(
        &self,
        item_id: &str,
        shared_with_user_id: &str,
    ) -> Result<Option<SharingGrant>> {
        let grant = sqlx::query_as::<_, SharingGrant>(
            "SELECT * FROM shared_permissions WHERE item_id = ? AND shared_with_user_id = ?",
        )
        .bind(item_id)
        .bind(shared_with_user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(grant)
    }

    /// Drop every grant referencing an item (cascade delete path).
    /// No flag refresh; the item row is about to go away.
    pub async fn remove_grants_for_item(&self, item_id: &str) -> Result<()> {
        sqlx::query("DELETE FROM shared_permissions WHERE item_id = ?")
            .bind(item_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn refresh_shared_flag(&self, item_id: &str) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE items
            SET is_shared = EXISTS(SELECT 1 FROM shared_permissions WHERE item_id = ?)
            WHERE id = ?
            "#,
        )
        .bind(item_id)
        .bind(item_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::schema::initialize_database;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn create_test_repo() -> Repository {
        let pool = SqlitePoolOptions::new()
            .connect("sqlite::memory:")
            .await
            .unwrap();

        initialize_database(&pool).await.unwrap();

        Repository::new(pool)
    }

    fn note(user_id: &str, name: &str, content: &str) -> Item {
        let now = Utc::now();
        Item {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            parent_folder_id: None,
            name: name.to_string(),
            size_bytes: content.len() as i64,
            is_favorite: false,
            is_shared: false,
            pin_protected: false,
            pin_hash: None,
            kind: ItemKind::Note {
                content: content.to_string(),
            },
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_create_and_get_user() {
        let repo = create_test_repo().await;

        let user = repo
            .create_user("alice", "alice@example.com", "hash")
            .await
            .unwrap();

        assert_eq!(user.used_storage_bytes, 0);
        assert_eq!(user.storage_quota_bytes, DEFAULT_STORAGE_QUOTA_BYTES);

        let fetched = repo.get_user(&user.id).await.unwrap();
        assert_eq!(fetched.username, "alice");
    }

    #[tokio::test]
    async fn test_duplicate_username_conflicts() {
        let repo = create_test_repo().await;

        repo.create_user("alice", "alice@example.com", "hash")
            .await
            .unwrap();
        let dup = repo.create_user("alice", "other@example.com", "hash").await;

        assert!(matches!(dup, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_storage_delta_accumulates() {
        let repo = create_test_repo().await;
        let user = repo
            .create_user("alice", "alice@example.com", "hash")
            .await
            .unwrap();

        repo.apply_storage_delta(&user.id, 100).await.unwrap();
        repo.apply_storage_delta(&user.id, 50).await.unwrap();
        repo.apply_storage_delta(&user.id, -30).await.unwrap();

        let user = repo.get_user(&user.id).await.unwrap();
        assert_eq!(user.used_storage_bytes, 120);
    }

    #[tokio::test]
    async fn test_storage_delta_enforces_quota() {
        let repo = create_test_repo().await;
        let user = repo
            .create_user("alice", "alice@example.com", "hash")
            .await
            .unwrap();

        let over = user.storage_quota_bytes + 1;
        let result = repo.apply_storage_delta(&user.id, over).await;
        assert!(matches!(result, Err(AppError::QuotaExceeded)));

        // A rejected delta leaves the ledger untouched.
        let user = repo.get_user(&user.id).await.unwrap();
        assert_eq!(user.used_storage_bytes, 0);
    }

    #[tokio::test]
    async fn test_storage_delta_unknown_user() {
        let repo = create_test_repo().await;

        let result = repo.apply_storage_delta("nope", 10).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_duplicate_sibling_folder_conflicts() {
        let repo = create_test_repo().await;
        let user = repo
            .create_user("alice", "alice@example.com", "hash")
            .await
            .unwrap();

        repo.create_folder(&user.id, "Photos", None, false, None)
            .await
            .unwrap();
        let dup = repo.create_folder(&user.id, "Photos", None, false, None).await;

        assert!(matches!(dup, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_same_name_under_different_parents_is_fine() {
        let repo = create_test_repo().await;
        let user = repo
            .create_user("alice", "alice@example.com", "hash")
            .await
            .unwrap();

        let parent = repo
            .create_folder(&user.id, "Docs", None, false, None)
            .await
            .unwrap();

        repo.create_folder(&user.id, "Photos", None, false, None)
            .await
            .unwrap();
        repo.create_folder(&user.id, "Photos", Some(&parent.id), false, None)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_item_roundtrip_preserves_variant() {
        let repo = create_test_repo().await;
        let user = repo
            .create_user("alice", "alice@example.com", "hash")
            .await
            .unwrap();

        let now = Utc::now();
        let image = Item {
            id: Uuid::new_v4().to_string(),
            user_id: user.id.clone(),
            parent_folder_id: None,
            name: "holiday".to_string(),
            size_bytes: 2048,
            is_favorite: false,
            is_shared: false,
            pin_protected: false,
            pin_hash: None,
            kind: ItemKind::Image {
                file_url: "/uploads/u/images/a.png".to_string(),
                mime_type: "image/png".to_string(),
                thumbnail_url: "/uploads/u/images/thumb-a.png".to_string(),
            },
            created_at: now,
            updated_at: now,
        };

        repo.insert_item(&image).await.unwrap();

        let fetched = repo.get_item(&image.id).await.unwrap();
        assert_eq!(fetched.kind, image.kind);
        assert_eq!(fetched.size_bytes, 2048);
    }

    #[tokio::test]
    async fn test_grant_upsert_sets_and_updates() {
        let repo = create_test_repo().await;
        let alice = repo
            .create_user("alice", "alice@example.com", "hash")
            .await
            .unwrap();
        let bob = repo
            .create_user("bob", "bob@example.com", "hash")
            .await
            .unwrap();

        let item = note(&alice.id, "n1", "hello");
        repo.insert_item(&item).await.unwrap();

        let grant = repo
            .upsert_grant(&item.id, &alice.id, &bob.id, false, true)
            .await
            .unwrap();
        assert!(grant.permissions.can_view);
        assert!(!grant.permissions.can_edit);

        // Sharing flips the denormalized flag.
        assert!(repo.get_item(&item.id).await.unwrap().is_shared);

        // Upsert in place: same pair, new bits.
        let grant = repo
            .upsert_grant(&item.id, &alice.id, &bob.id, true, false)
            .await
            .unwrap();
        assert!(grant.permissions.can_edit);
        assert!(!grant.permissions.can_favorite);
    }

    #[tokio::test]
    async fn test_last_revoke_clears_shared_flag() {
        let repo = create_test_repo().await;
        let alice = repo
            .create_user("alice", "alice@example.com", "hash")
            .await
            .unwrap();
        let bob = repo
            .create_user("bob", "bob@example.com", "hash")
            .await
            .unwrap();
        let carol = repo
            .create_user("carol", "carol@example.com", "hash")
            .await
            .unwrap();

        let item = note(&alice.id, "n1", "hello");
        repo.insert_item(&item).await.unwrap();

        repo.upsert_grant(&item.id, &alice.id, &bob.id, false, true)
            .await
            .unwrap();
        repo.upsert_grant(&item.id, &alice.id, &carol.id, false, true)
            .await
            .unwrap();

        repo.remove_grant(&item.id, &bob.id).await.unwrap();
        assert!(repo.get_item(&item.id).await.unwrap().is_shared);

        repo.remove_grant(&item.id, &carol.id).await.unwrap();
        assert!(!repo.get_item(&item.id).await.unwrap().is_shared);
    }

    #[tokio::test]
    async fn test_revoke_missing_grant() {
        let repo = create_test_repo().await;
        let alice = repo
            .create_user("alice", "alice@example.com", "hash")
            .await
            .unwrap();

        let item = note(&alice.id, "n1", "hello");
        repo.insert_item(&item).await.unwrap();

        let result = repo.remove_grant(&item.id, "nobody").await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_list_items_includes_shared_with_me() {
        let repo = create_test_repo().await;
        let alice = repo
            .create_user("alice", "alice@example.com", "hash")
            .await
            .unwrap();
        let bob = repo
            .create_user("bob", "bob@example.com", "hash")
            .await
            .unwrap();

        let mine = note(&bob.id, "bobs-note", "abc");
        repo.insert_item(&mine).await.unwrap();

        let shared = note(&alice.id, "alices-note", "def");
        repo.insert_item(&shared).await.unwrap();
        repo.upsert_grant(&shared.id, &alice.id, &bob.id, false, true)
            .await
            .unwrap();

        let hidden = note(&alice.id, "private", "ghi");
        repo.insert_item(&hidden).await.unwrap();

        let query = ItemListQuery {
            page: 1,
            limit: 20,
            ..Default::default()
        };
        let (items, total) = repo.list_items(&bob.id, &query).await.unwrap();

        assert_eq!(total, 2);
        let names: Vec<_> = items.iter().map(|i| i.name.as_str()).collect();
        assert!(names.contains(&"bobs-note"));
        assert!(names.contains(&"alices-note"));
        assert!(!names.contains(&"private"));
    }

    #[tokio::test]
    async fn test_list_items_search_and_type_filters() {
        let repo = create_test_repo().await;
        let user = repo
            .create_user("alice", "alice@example.com", "hash")
            .await
            .unwrap();

        repo.insert_item(&note(&user.id, "groceries", "buy milk"))
            .await
            .unwrap();
        repo.insert_item(&note(&user.id, "work", "quarterly report"))
            .await
            .unwrap();

        let query = ItemListQuery {
            search: Some("milk".to_string()),
            page: 1,
            limit: 20,
            ..Default::default()
        };
        let (items, total) = repo.list_items(&user.id, &query).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(items[0].name, "groceries");

        let query = ItemListQuery {
            item_type: Some(ItemType::Image),
            page: 1,
            limit: 20,
            ..Default::default()
        };
        let (_, total) = repo.list_items(&user.id, &query).await.unwrap();
        assert_eq!(total, 0);
    }

    #[tokio::test]
    async fn test_list_items_pagination() {
        let repo = create_test_repo().await;
        let user = repo
            .create_user("alice", "alice@example.com", "hash")
            .await
            .unwrap();

        for i in 0..5 {
            repo.insert_item(&note(&user.id, &format!("note-{}", i), "x"))
                .await
                .unwrap();
        }

        let query = ItemListQuery {
            page: 2,
            limit: 2,
            sort: SortKey::Name,
            order: SortOrder::Asc,
            ..Default::default()
        };
        let (items, total) = repo.list_items(&user.id, &query).await.unwrap();

        assert_eq!(total, 5);
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].name, "note-2");
        assert_eq!(items[1].name, "note-3");
    }

    #[tokio::test]
    async fn test_usage_by_type() {
        let repo = create_test_repo().await;
        let user = repo
            .create_user("alice", "alice@example.com", "hash")
            .await
            .unwrap();

        repo.insert_item(&note(&user.id, "a", "12345")).await.unwrap();
        repo.insert_item(&note(&user.id, "b", "123")).await.unwrap();

        let rows = repo.usage_by_type(&user.id).await.unwrap();
        assert_eq!(rows.len(), 1);

        let (item_type, count, total, avg) = &rows[0];
        assert_eq!(item_type, "note");
        assert_eq!(*count, 2);
        assert_eq!(*total, 8);
        assert!((avg - 4.0).abs() < f64::EPSILON);
    }
}

//! Folders service
//!
//! High-level business logic for the folder side of the tree: creation
//! with sibling-name uniqueness, rename/move with cycle prevention,
//! cascade delete and deep copy.

use std::collections::VecDeque;

use crate::config::COPY_NAME_SUFFIX;
use crate::database::{Folder, Repository, SortKey, SortOrder};
use crate::error::{AppError, Result};
use crate::services::access;
use crate::services::tree;
use crate::storage::FileStore;

/// Fields for a new folder
#[derive(Debug, Clone)]
pub struct NewFolder {
    pub name: String,
    pub parent_folder_id: Option<String>,
    pub pin_protected: bool,
    pub pin: Option<String>,
}

/// Partial update of a folder
#[derive(Debug, Clone, Default)]
pub struct FolderChanges {
    pub name: Option<String>,
    pub parent_folder_id: Option<String>,
    pub pin_protected: Option<bool>,
    pub pin: Option<String>,
}

/// Service for managing folders
#[derive(Clone)]
pub struct FoldersService {
    repo: Repository,
    files: FileStore,
}

impl FoldersService {
    pub fn new(repo: Repository, files: FileStore) -> Self {
        Self { repo, files }
    }

    /// Create a folder for a user
    pub async fn create_folder(&self, actor_id: &str, input: NewFolder) -> Result<Folder> {
        let name = tree::validate_name(&input.name)?;
        let pin_hash = tree::pin_hash_for(input.pin_protected, input.pin.as_deref())?;

        if let Some(parent_id) = &input.parent_folder_id {
            tree::ensure_owned_folder(&self.repo, actor_id, parent_id).await?;
        }

        if self
            .repo
            .sibling_folder_exists(actor_id, input.parent_folder_id.as_deref(), name, None)
            .await?
        {
            return Err(AppError::Conflict("Folder name already exists.".to_string()));
        }

        let folder = self
            .repo
            .create_folder(
                actor_id,
                name,
                input.parent_folder_id.as_deref(),
                input.pin_protected,
                pin_hash.as_deref(),
            )
            .await?;

        tracing::info!("Folder created: {} ({})", folder.name, folder.id);

        Ok(folder)
    }

    /// List a user's folders under one parent (or the root)
    pub async fn list_folders(
        &self,
        actor_id: &str,
        parent_folder_id: Option<&str>,
        page: i64,
        limit: i64,
        sort: SortKey,
        order: SortOrder,
    ) -> Result<(Vec<Folder>, i64)> {
        self.repo
            .list_folders(actor_id, parent_folder_id, page, limit, sort, order)
            .await
    }

    /// Rename, move, or toggle PIN protection on a folder.
    ///
    /// A rename is checked against siblings at the current parent; a
    /// move walks the new parent's ancestor chain and rejects anything
    /// that would place the folder inside its own subtree.
    pub async fn update_folder(
        &self,
        actor_id: &str,
        folder_id: &str,
        changes: FolderChanges,
    ) -> Result<Folder> {
        let mut folder = self.repo.get_folder(folder_id).await?;
        access::authorize_folder(actor_id, &folder)?;

        if let Some(name) = &changes.name {
            let name = tree::validate_name(name)?;
            if self
                .repo
                .sibling_folder_exists(
                    actor_id,
                    folder.parent_folder_id.as_deref(),
                    name,
                    Some(folder_id),
                )
                .await?
            {
                return Err(AppError::Conflict("Folder name already exists.".to_string()));
            }
            folder.name = name.to_string();
        }

        if let Some(parent_id) = &changes.parent_folder_id {
            tree::ensure_owned_folder(&self.repo, actor_id, parent_id).await?;
            tree::ensure_not_descendant(&self.repo, parent_id, folder_id).await?;
            folder.parent_folder_id = Some(parent_id.clone());
        }

        if let Some(protected) = changes.pin_protected {
            folder.pin_hash = tree::pin_hash_for(protected, changes.pin.as_deref())?;
            folder.pin_protected = protected;
        }

        self.repo.update_folder(&folder).await?;

        tracing::info!("Folder updated: {}", folder_id);

        self.repo.get_folder(folder_id).await
    }

    /// Delete a folder and everything beneath it.
    ///
    /// The subtree is snapshotted up front and processed bottom-up, so
    /// children are always gone before their parent. Failures are
    /// counted and reported after the traversal instead of aborting it;
    /// a folder whose contents could not be fully removed is kept so
    /// the remnants stay reachable.
    pub async fn delete_folder(&self, actor_id: &str, folder_id: &str) -> Result<()> {
        let folder = self.repo.get_folder(folder_id).await?;
        access::authorize_folder(actor_id, &folder)?;

        let ordered = tree::collect_subtree_folder_ids(&self.repo, &folder.id).await?;
        let mut errors = 0usize;

        for id in ordered.iter().rev() {
            let mut blocked = false;

            for item in self.repo.items_in_folder(id).await? {
                if let Err(e) = tree::delete_item_record(&self.repo, &self.files, &item).await {
                    tracing::warn!("Cascade delete failed for item {}: {}", item.id, e);
                    errors += 1;
                    blocked = true;
                }
            }

            // Any surviving child folder keeps this row alive too.
            if !blocked && self.repo.child_folders(id).await?.is_empty() {
                if let Err(e) = self.repo.delete_folder_row(id).await {
                    tracing::warn!("Cascade delete failed for folder {}: {}", id, e);
                    errors += 1;
                }
            }
        }

        if errors > 0 {
            return Err(AppError::Generic(format!(
                "Folder delete completed with {} errors",
                errors
            )));
        }

        tracing::info!("Folder deleted: {}", folder_id);

        Ok(())
    }

    /// Deep-copy a folder into a destination parent (or the root).
    ///
    /// Every descendant folder and item is cloned; copied items start
    /// private and unfavorited. Copying into the folder's own subtree
    /// is rejected the same way a move there would be.
    pub async fn copy_folder(
        &self,
        actor_id: &str,
        folder_id: &str,
        target_folder_id: Option<String>,
        new_name: Option<String>,
    ) -> Result<Folder> {
        let folder = self.repo.get_folder(folder_id).await?;
        access::authorize_folder(actor_id, &folder)?;

        if let Some(target_id) = &target_folder_id {
            tree::ensure_owned_folder(&self.repo, actor_id, target_id).await?;
            tree::ensure_not_descendant(&self.repo, target_id, folder_id).await?;
        }

        let root_name = match &new_name {
            Some(name) => tree::validate_name(name)?.to_string(),
            None => format!("{}{}", folder.name, COPY_NAME_SUFFIX),
        };

        let root_copy = self
            .repo
            .create_folder(
                actor_id,
                &root_name,
                target_folder_id.as_deref(),
                folder.pin_protected,
                folder.pin_hash.as_deref(),
            )
            .await?;

        // (source folder id, copied folder id) pairs still to process.
        let mut pending: VecDeque<(String, String)> = VecDeque::new();
        pending.push_back((folder.id.clone(), root_copy.id.clone()));

        while let Some((source_id, copy_id)) = pending.pop_front() {
            for item in self.repo.items_in_folder(&source_id).await? {
                let name = item.name.clone();
                tree::copy_item_record(
                    &self.repo,
                    &self.files,
                    &item,
                    actor_id,
                    Some(copy_id.clone()),
                    name,
                )
                .await?;
            }

            for child in self.repo.child_folders(&source_id).await? {
                let created = self
                    .repo
                    .create_folder(
                        actor_id,
                        &child.name,
                        Some(&copy_id),
                        child.pin_protected,
                        child.pin_hash.as_deref(),
                    )
                    .await?;
                pending.push_back((child.id, created.id));
            }
        }

        tracing::info!("Folder copied: {} -> {}", folder_id, root_copy.id);

        Ok(root_copy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{initialize_database, Item, ItemKind};
    use chrono::Utc;
    use sqlx::sqlite::SqlitePoolOptions;
    use tempfile::TempDir;
    use uuid::Uuid;

    async fn create_test_service() -> (FoldersService, Repository, TempDir) {
        let pool = SqlitePoolOptions::new()
            .connect("sqlite::memory:")
            .await
            .unwrap();

        initialize_database(&pool).await.unwrap();

        let repo = Repository::new(pool);

        let temp_dir = TempDir::new().unwrap();
        let files = FileStore::new(temp_dir.path().join("uploads"));
        files.initialize().await.unwrap();

        (FoldersService::new(repo.clone(), files), repo, temp_dir)
    }

    fn new_folder(name: &str, parent: Option<&str>) -> NewFolder {
        NewFolder {
            name: name.to_string(),
            parent_folder_id: parent.map(|s| s.to_string()),
            pin_protected: false,
            pin: None,
        }
    }

    async fn insert_note(repo: &Repository, user_id: &str, parent: &str, content: &str) -> Item {
        let now = Utc::now();
        let item = Item {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            parent_folder_id: Some(parent.to_string()),
            name: "n1".to_string(),
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
        };
        repo.apply_storage_delta(user_id, item.size_bytes)
            .await
            .unwrap();
        repo.insert_item(&item).await.unwrap();
        item
    }

    #[tokio::test]
    async fn test_create_duplicate_sibling_is_a_conflict() {
        let (service, repo, _tmp) = create_test_service().await;
        let user = repo
            .create_user("alice", "alice@example.com", "hash")
            .await
            .unwrap();

        service
            .create_folder(&user.id, new_folder("Photos", None))
            .await
            .unwrap();

        let dup = service
            .create_folder(&user.id, new_folder("Photos", None))
            .await;
        assert!(matches!(dup, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_create_with_foreign_parent_is_invalid() {
        let (service, repo, _tmp) = create_test_service().await;
        let alice = repo
            .create_user("alice", "alice@example.com", "hash")
            .await
            .unwrap();
        let bob = repo
            .create_user("bob", "bob@example.com", "hash")
            .await
            .unwrap();

        let bobs = service
            .create_folder(&bob.id, new_folder("Bobs", None))
            .await
            .unwrap();

        let result = service
            .create_folder(&alice.id, new_folder("Sneaky", Some(&bobs.id)))
            .await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_pin_required_when_enabling_protection() {
        let (service, repo, _tmp) = create_test_service().await;
        let user = repo
            .create_user("alice", "alice@example.com", "hash")
            .await
            .unwrap();

        let result = service
            .create_folder(
                &user.id,
                NewFolder {
                    name: "Vault".to_string(),
                    parent_folder_id: None,
                    pin_protected: true,
                    pin: None,
                },
            )
            .await;
        assert!(matches!(result, Err(AppError::Validation(_))));

        let folder = service
            .create_folder(
                &user.id,
                NewFolder {
                    name: "Vault".to_string(),
                    parent_folder_id: None,
                    pin_protected: true,
                    pin: Some("4711".to_string()),
                },
            )
            .await
            .unwrap();
        assert!(folder.pin_protected);
        assert!(folder.pin_hash.is_some());
        // The raw PIN must never be stored.
        assert_ne!(folder.pin_hash.as_deref(), Some("4711"));
    }

    #[tokio::test]
    async fn test_move_into_own_descendant_is_rejected() {
        let (service, repo, _tmp) = create_test_service().await;
        let user = repo
            .create_user("alice", "alice@example.com", "hash")
            .await
            .unwrap();

        let root = service
            .create_folder(&user.id, new_folder("root", None))
            .await
            .unwrap();
        let child = service
            .create_folder(&user.id, new_folder("child", Some(&root.id)))
            .await
            .unwrap();

        // root -> child would create a cycle.
        let result = service
            .update_folder(
                &user.id,
                &root.id,
                FolderChanges {
                    parent_folder_id: Some(child.id.clone()),
                    ..Default::default()
                },
            )
            .await;
        assert!(matches!(result, Err(AppError::Validation(_))));

        // Moving onto itself is equally invalid.
        let result = service
            .update_folder(
                &user.id,
                &root.id,
                FolderChanges {
                    parent_folder_id: Some(root.id.clone()),
                    ..Default::default()
                },
            )
            .await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_rename_checks_siblings_at_current_parent() {
        let (service, repo, _tmp) = create_test_service().await;
        let user = repo
            .create_user("alice", "alice@example.com", "hash")
            .await
            .unwrap();

        service
            .create_folder(&user.id, new_folder("A", None))
            .await
            .unwrap();
        let b = service
            .create_folder(&user.id, new_folder("B", None))
            .await
            .unwrap();

        let result = service
            .update_folder(
                &user.id,
                &b.id,
                FolderChanges {
                    name: Some("A".to_string()),
                    ..Default::default()
                },
            )
            .await;
        assert!(matches!(result, Err(AppError::Conflict(_))));

        // Renaming to its own current name is not a conflict with itself.
        let renamed = service
            .update_folder(
                &user.id,
                &b.id,
                FolderChanges {
                    name: Some("B".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(renamed.name, "B");
    }

    #[tokio::test]
    async fn test_cascade_delete_clears_subtree_and_ledger() {
        let (service, repo, _tmp) = create_test_service().await;
        let user = repo
            .create_user("alice", "alice@example.com", "hash")
            .await
            .unwrap();

        let docs = service
            .create_folder(&user.id, new_folder("Docs", None))
            .await
            .unwrap();
        let sub = service
            .create_folder(&user.id, new_folder("Sub", Some(&docs.id)))
            .await
            .unwrap();
        let note = insert_note(&repo, &user.id, &sub.id, "hello").await;

        assert_eq!(repo.get_user(&user.id).await.unwrap().used_storage_bytes, 5);

        service.delete_folder(&user.id, &docs.id).await.unwrap();

        assert_eq!(repo.get_user(&user.id).await.unwrap().used_storage_bytes, 0);
        assert!(matches!(
            repo.get_folder(&docs.id).await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            repo.get_folder(&sub.id).await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            repo.get_item(&note.id).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_cascade_delete_removes_grants() {
        let (service, repo, _tmp) = create_test_service().await;
        let alice = repo
            .create_user("alice", "alice@example.com", "hash")
            .await
            .unwrap();
        let bob = repo
            .create_user("bob", "bob@example.com", "hash")
            .await
            .unwrap();

        let docs = service
            .create_folder(&alice.id, new_folder("Docs", None))
            .await
            .unwrap();
        let note = insert_note(&repo, &alice.id, &docs.id, "shared content").await;
        repo.upsert_grant(&note.id, &alice.id, &bob.id, true, true)
            .await
            .unwrap();

        service.delete_folder(&alice.id, &docs.id).await.unwrap();

        assert!(repo.find_grant(&note.id, &bob.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_is_owner_only() {
        let (service, repo, _tmp) = create_test_service().await;
        let alice = repo
            .create_user("alice", "alice@example.com", "hash")
            .await
            .unwrap();
        let bob = repo
            .create_user("bob", "bob@example.com", "hash")
            .await
            .unwrap();

        let docs = service
            .create_folder(&alice.id, new_folder("Docs", None))
            .await
            .unwrap();

        let result = service.delete_folder(&bob.id, &docs.id).await;
        assert!(matches!(result, Err(AppError::Forbidden)));
    }

    #[tokio::test]
    async fn test_copy_folder_clones_subtree() {
        let (service, repo, _tmp) = create_test_service().await;
        let user = repo
            .create_user("alice", "alice@example.com", "hash")
            .await
            .unwrap();

        let docs = service
            .create_folder(&user.id, new_folder("Docs", None))
            .await
            .unwrap();
        let sub = service
            .create_folder(&user.id, new_folder("Sub", Some(&docs.id)))
            .await
            .unwrap();
        insert_note(&repo, &user.id, &sub.id, "hello").await;

        let copy = service
            .copy_folder(&user.id, &docs.id, None, None)
            .await
            .unwrap();

        assert_eq!(copy.name, "Docs (Copy)");
        assert_ne!(copy.id, docs.id);

        let children = repo.child_folders(&copy.id).await.unwrap();
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].name, "Sub");

        let items = repo.items_in_folder(&children[0].id).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].name, "n1");
        assert!(!items[0].is_shared);
        assert!(!items[0].is_favorite);

        // Original 5 bytes plus the copied 5.
        assert_eq!(
            repo.get_user(&user.id).await.unwrap().used_storage_bytes,
            10
        );
    }

    #[tokio::test]
    async fn test_copy_into_own_subtree_is_rejected() {
        let (service, repo, _tmp) = create_test_service().await;
        let user = repo
            .create_user("alice", "alice@example.com", "hash")
            .await
            .unwrap();

        let root = service
            .create_folder(&user.id, new_folder("root", None))
            .await
            .unwrap();
        let child = service
            .create_folder(&user.id, new_folder("child", Some(&root.id)))
            .await
            .unwrap();

        let result = service
            .copy_folder(&user.id, &root.id, Some(child.id), None)
            .await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }
}

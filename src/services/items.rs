//! Items service
//!
//! Lifecycle of typed items: creation (notes inline, images and PDFs
//! from uploads), metadata and content updates with ledger deltas,
//! deletion, deep copy, sharing and favorites. Every operation passes
//! through the access gate before touching the tree.

use crate::config::{
    ALLOWED_IMAGE_MIME_TYPES, COPY_NAME_SUFFIX, MAX_UPLOAD_SIZE_BYTES, PDF_MIME_TYPE,
};
use crate::database::{Item, ItemKind, ItemListQuery, Repository, SharingGrant};
use crate::error::{AppError, Result};
use crate::services::access::{self, Capability};
use crate::services::tree;
use crate::storage::{thumbnail_name, thumbnails, FileCategory, FileStore};
use chrono::Utc;
use uuid::Uuid;

/// Fields for a new note
#[derive(Debug, Clone)]
pub struct NewNote {
    pub name: String,
    pub content: String,
    pub parent_folder_id: Option<String>,
    pub pin_protected: bool,
    pub pin: Option<String>,
}

/// A received binary upload plus its metadata fields
#[derive(Debug, Clone)]
pub struct NewUpload {
    pub name: String,
    pub parent_folder_id: Option<String>,
    pub pin_protected: bool,
    pub pin: Option<String>,
    pub original_filename: String,
    pub mime_type: String,
    pub data: Vec<u8>,
}

/// Partial update of an item
#[derive(Debug, Clone, Default)]
pub struct ItemChanges {
    pub name: Option<String>,
    pub parent_folder_id: Option<String>,
    pub note_content: Option<String>,
    pub pin_protected: Option<bool>,
    pub pin: Option<String>,
}

/// Service for managing items
#[derive(Clone)]
pub struct ItemsService {
    repo: Repository,
    files: FileStore,
}

impl ItemsService {
    pub fn new(repo: Repository, files: FileStore) -> Self {
        Self { repo, files }
    }

    async fn validate_common(
        &self,
        actor_id: &str,
        name: &str,
        parent_folder_id: Option<&str>,
        pin_protected: bool,
        pin: Option<&str>,
    ) -> Result<(String, Option<String>)> {
        let name = tree::validate_name(name)?.to_string();
        let pin_hash = tree::pin_hash_for(pin_protected, pin)?;

        if let Some(parent_id) = parent_folder_id {
            tree::ensure_owned_folder(&self.repo, actor_id, parent_id).await?;
        }

        Ok((name, pin_hash))
    }

    async fn rollback_ledger(&self, user_id: &str, delta: i64) {
        if let Err(e) = self.repo.apply_storage_delta(user_id, delta).await {
            tracing::error!("Failed to roll back ledger for user {}: {}", user_id, e);
        }
    }

    /// Create a note. Its size is the UTF-8 byte length of the content.
    pub async fn create_note(&self, actor_id: &str, input: NewNote) -> Result<Item> {
        let (name, pin_hash) = self
            .validate_common(
                actor_id,
                &input.name,
                input.parent_folder_id.as_deref(),
                input.pin_protected,
                input.pin.as_deref(),
            )
            .await?;

        if input.content.is_empty() {
            return Err(AppError::Validation("Note content is required.".to_string()));
        }

        let size = input.content.len() as i64;
        self.repo.apply_storage_delta(actor_id, size).await?;

        let now = Utc::now();
        let item = Item {
            id: Uuid::new_v4().to_string(),
            user_id: actor_id.to_string(),
            parent_folder_id: input.parent_folder_id,
            name,
            size_bytes: size,
            is_favorite: false,
            is_shared: false,
            pin_protected: input.pin_protected,
            pin_hash,
            kind: ItemKind::Note {
                content: input.content,
            },
            created_at: now,
            updated_at: now,
        };

        if let Err(e) = self.repo.insert_item(&item).await {
            self.rollback_ledger(actor_id, -size).await;
            return Err(e);
        }

        tracing::info!("Note created: {} ({} bytes)", item.id, size);

        Ok(item)
    }

    fn check_upload(&self, input: &NewUpload, allowed: &[&str]) -> Result<()> {
        if !allowed.contains(&input.mime_type.as_str()) {
            return Err(AppError::UnsupportedMediaType);
        }
        if input.data.is_empty() {
            return Err(AppError::Validation("File is required.".to_string()));
        }
        if input.data.len() > MAX_UPLOAD_SIZE_BYTES {
            return Err(AppError::Validation(
                "File exceeds the maximum upload size.".to_string(),
            ));
        }
        Ok(())
    }

    /// Create an image item from an upload: stores the file, generates
    /// a thumbnail beside it, and charges the ledger.
    pub async fn create_image(&self, actor_id: &str, input: NewUpload) -> Result<Item> {
        let (name, pin_hash) = self
            .validate_common(
                actor_id,
                &input.name,
                input.parent_folder_id.as_deref(),
                input.pin_protected,
                input.pin.as_deref(),
            )
            .await?;
        self.check_upload(&input, ALLOWED_IMAGE_MIME_TYPES)?;

        let size = input.data.len() as i64;
        self.repo.apply_storage_delta(actor_id, size).await?;

        let stored = match self
            .files
            .store(
                actor_id,
                FileCategory::Images,
                &input.original_filename,
                &input.data,
            )
            .await
        {
            Ok(stored) => stored,
            Err(e) => {
                self.rollback_ledger(actor_id, -size).await;
                return Err(e);
            }
        };

        let thumb = match thumbnails::generate(&input.data, &input.mime_type) {
            Ok(bytes) => bytes,
            Err(e) => {
                let _ = self.files.remove(&stored.url).await;
                self.rollback_ledger(actor_id, -size).await;
                return Err(e);
            }
        };

        let thumb_stored = match self
            .files
            .store_named(
                actor_id,
                FileCategory::Images,
                &thumbnail_name(&stored.file_name),
                &thumb,
            )
            .await
        {
            Ok(stored) => stored,
            Err(e) => {
                let _ = self.files.remove(&stored.url).await;
                self.rollback_ledger(actor_id, -size).await;
                return Err(e);
            }
        };

        let now = Utc::now();
        let item = Item {
            id: Uuid::new_v4().to_string(),
            user_id: actor_id.to_string(),
            parent_folder_id: input.parent_folder_id,
            name,
            size_bytes: size,
            is_favorite: false,
            is_shared: false,
            pin_protected: input.pin_protected,
            pin_hash,
            kind: ItemKind::Image {
                file_url: stored.url.clone(),
                mime_type: input.mime_type,
                thumbnail_url: thumb_stored.url.clone(),
            },
            created_at: now,
            updated_at: now,
        };

        if let Err(e) = self.repo.insert_item(&item).await {
            let _ = self.files.remove(&stored.url).await;
            let _ = self.files.remove(&thumb_stored.url).await;
            self.rollback_ledger(actor_id, -size).await;
            return Err(e);
        }

        tracing::info!("Image created: {} ({} bytes)", item.id, size);

        Ok(item)
    }

    /// Create a PDF item from an upload
    pub async fn create_pdf(&self, actor_id: &str, input: NewUpload) -> Result<Item> {
        let (name, pin_hash) = self
            .validate_common(
                actor_id,
                &input.name,
                input.parent_folder_id.as_deref(),
                input.pin_protected,
                input.pin.as_deref(),
            )
            .await?;
        self.check_upload(&input, &[PDF_MIME_TYPE])?;

        let size = input.data.len() as i64;
        self.repo.apply_storage_delta(actor_id, size).await?;

        let stored = match self
            .files
            .store(
                actor_id,
                FileCategory::Pdfs,
                &input.original_filename,
                &input.data,
            )
            .await
        {
            Ok(stored) => stored,
            Err(e) => {
                self.rollback_ledger(actor_id, -size).await;
                return Err(e);
            }
        };

        let now = Utc::now();
        let item = Item {
            id: Uuid::new_v4().to_string(),
            user_id: actor_id.to_string(),
            parent_folder_id: input.parent_folder_id,
            name,
            size_bytes: size,
            is_favorite: false,
            is_shared: false,
            pin_protected: input.pin_protected,
            pin_hash,
            kind: ItemKind::Pdf {
                file_url: stored.url.clone(),
                mime_type: input.mime_type,
            },
            created_at: now,
            updated_at: now,
        };

        if let Err(e) = self.repo.insert_item(&item).await {
            let _ = self.files.remove(&stored.url).await;
            self.rollback_ledger(actor_id, -size).await;
            return Err(e);
        }

        tracing::info!("PDF created: {} ({} bytes)", item.id, size);

        Ok(item)
    }

    /// Fetch an item the actor may view
    pub async fn get_item(&self, actor_id: &str, item_id: &str) -> Result<Item> {
        let item = self.repo.get_item(item_id).await?;
        access::authorize_item(&self.repo, actor_id, &item, Capability::View).await?;
        Ok(item)
    }

    /// List items visible to the actor (owned or shared with them)
    pub async fn list_items(
        &self,
        actor_id: &str,
        query: &ItemListQuery,
    ) -> Result<(Vec<Item>, i64)> {
        self.repo.list_items(actor_id, query).await
    }

    /// Update an item's name, parent, content or PIN protection.
    ///
    /// Content changes recompute the size and apply the delta to the
    /// owner's ledger — never the absolute value, so a retried update
    /// settles on the same totals. Reparenting stays owner-only.
    pub async fn update_item(
        &self,
        actor_id: &str,
        item_id: &str,
        changes: ItemChanges,
    ) -> Result<Item> {
        let mut item = self.repo.get_item(item_id).await?;
        access::authorize_item(&self.repo, actor_id, &item, Capability::Edit).await?;

        if let Some(name) = &changes.name {
            item.name = tree::validate_name(name)?.to_string();
        }

        if let Some(parent_id) = &changes.parent_folder_id {
            access::authorize_item(&self.repo, actor_id, &item, Capability::Move).await?;
            tree::ensure_owned_folder(&self.repo, &item.user_id, parent_id).await?;
            item.parent_folder_id = Some(parent_id.clone());
        }

        let mut ledger_delta = 0i64;
        if let Some(content) = changes.note_content {
            if let ItemKind::Note { .. } = item.kind {
                let new_size = content.len() as i64;
                ledger_delta = new_size - item.size_bytes;
                item.size_bytes = new_size;
                item.kind = ItemKind::Note { content };
            }
        }

        if let Some(protected) = changes.pin_protected {
            item.pin_hash = tree::pin_hash_for(protected, changes.pin.as_deref())?;
            item.pin_protected = protected;
        }

        if ledger_delta != 0 {
            self.repo
                .apply_storage_delta(&item.user_id, ledger_delta)
                .await?;
        }

        if let Err(e) = self.repo.update_item(&item).await {
            if ledger_delta != 0 {
                self.rollback_ledger(&item.user_id, -ledger_delta).await;
            }
            return Err(e);
        }

        tracing::info!("Item updated: {}", item_id);

        self.repo.get_item(item_id).await
    }

    /// Delete an item: backing files, ledger, grants, record
    pub async fn delete_item(&self, actor_id: &str, item_id: &str) -> Result<()> {
        let item = self.repo.get_item(item_id).await?;
        access::authorize_item(&self.repo, actor_id, &item, Capability::Delete).await?;

        tree::delete_item_record(&self.repo, &self.files, &item).await?;

        tracing::info!("Item deleted: {}", item_id);

        Ok(())
    }

    /// Deep-copy an item into a destination folder (or the root).
    /// The copy belongs to the actor and starts private.
    pub async fn copy_item(
        &self,
        actor_id: &str,
        item_id: &str,
        target_folder_id: Option<String>,
        new_name: Option<String>,
    ) -> Result<Item> {
        let item = self.repo.get_item(item_id).await?;
        access::authorize_item(&self.repo, actor_id, &item, Capability::Edit).await?;

        if let Some(target_id) = &target_folder_id {
            tree::ensure_owned_folder(&self.repo, actor_id, target_id).await?;
        }

        let name = match &new_name {
            Some(name) => tree::validate_name(name)?.to_string(),
            None => format!("{}{}", item.name, COPY_NAME_SUFFIX),
        };

        let copy = tree::copy_item_record(
            &self.repo,
            &self.files,
            &item,
            actor_id,
            target_folder_id,
            name,
        )
        .await?;

        tracing::info!("Item copied: {} -> {}", item_id, copy.id);

        Ok(copy)
    }

    /// Share an item with another user, or update an existing grant's
    /// permission bits in place. Owner-only.
    pub async fn share_item(
        &self,
        actor_id: &str,
        item_id: &str,
        shared_with_user_id: &str,
        can_edit: bool,
        can_favorite: bool,
    ) -> Result<SharingGrant> {
        let item = self.repo.get_item(item_id).await?;
        access::authorize_item(&self.repo, actor_id, &item, Capability::Share).await?;

        match self.repo.get_user(shared_with_user_id).await {
            Ok(_) => {}
            Err(AppError::NotFound(_)) => {
                return Err(AppError::NotFound("User to share with".to_string()));
            }
            Err(e) => return Err(e),
        }

        let grant = self
            .repo
            .upsert_grant(item_id, actor_id, shared_with_user_id, can_edit, can_favorite)
            .await?;

        tracing::info!("Item {} shared with user {}", item_id, shared_with_user_id);

        Ok(grant)
    }

    /// Revoke a user's grant on an item. Owner-only.
    pub async fn revoke_share(
        &self,
        actor_id: &str,
        item_id: &str,
        shared_with_user_id: &str,
    ) -> Result<()> {
        let item = self.repo.get_item(item_id).await?;
        access::authorize_item(&self.repo, actor_id, &item, Capability::Share).await?;

        self.repo.remove_grant(item_id, shared_with_user_id).await?;

        tracing::info!(
            "Share on item {} revoked from user {}",
            item_id,
            shared_with_user_id
        );

        Ok(())
    }

    /// Set or toggle the favorite flag. An explicit value wins; absent
    /// means toggle.
    pub async fn set_favorite(
        &self,
        actor_id: &str,
        item_id: &str,
        favorite: Option<bool>,
    ) -> Result<Item> {
        let mut item = self.repo.get_item(item_id).await?;
        access::authorize_item(&self.repo, actor_id, &item, Capability::Favorite).await?;

        item.is_favorite = favorite.unwrap_or(!item.is_favorite);
        self.repo.update_item(&item).await?;

        self.repo.get_item(item_id).await
    }
}

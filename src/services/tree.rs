//! Shared tree machinery
//!
//! The folder/item tree has two structural operations — cascade delete
//! and deep copy — used from both the folder and item services. Both
//! traverse with an explicit worklist instead of call recursion, so
//! tree depth never translates into stack depth, and both snapshot the
//! subtree id set up front to bound the walk against concurrent
//! additions.

use crate::config::MAX_NAME_LENGTH;
use crate::crypto::{hash_pin, is_valid_pin};
use crate::database::{Folder, Item, ItemKind, Repository};
use crate::error::{AppError, Result};
use crate::storage::{thumbnail_name, FileStore};
use chrono::Utc;
use uuid::Uuid;

/// Validate a folder/item name, returning it trimmed.
pub(crate) fn validate_name(name: &str) -> Result<&str> {
    let trimmed = name.trim();

    if trimmed.is_empty() {
        return Err(AppError::Validation("Name is required.".to_string()));
    }
    if trimmed.len() > MAX_NAME_LENGTH {
        return Err(AppError::Validation(format!(
            "Name must be at most {} characters.",
            MAX_NAME_LENGTH
        )));
    }

    Ok(trimmed)
}

/// Resolve the PIN hash for a protection toggle. Enabling requires a
/// well-formed PIN; disabling clears the hash.
pub(crate) fn pin_hash_for(pin_protected: bool, pin: Option<&str>) -> Result<Option<String>> {
    if !pin_protected {
        return Ok(None);
    }

    let pin = pin.ok_or_else(|| {
        AppError::Validation("PIN required when enabling protection.".to_string())
    })?;

    if !is_valid_pin(pin) {
        return Err(AppError::Validation(
            "PIN must be 4 to 6 digits.".to_string(),
        ));
    }

    Ok(Some(hash_pin(pin)?))
}

/// Fetch a folder that must exist and belong to the given user, for use
/// as an attachment point. Anything else is invalid input, matching the
/// 400 the API contract promises for bad parent references.
pub(crate) async fn ensure_owned_folder(
    repo: &Repository,
    user_id: &str,
    folder_id: &str,
) -> Result<Folder> {
    match repo.find_folder(folder_id).await? {
        Some(folder) if folder.user_id == user_id => Ok(folder),
        _ => Err(AppError::Validation(
            "parentFolderId not valid.".to_string(),
        )),
    }
}

/// Snapshot a folder subtree's ids, root first. Reversing the result
/// yields a bottom-up processing order where children always precede
/// their parent.
pub(crate) async fn collect_subtree_folder_ids(
    repo: &Repository,
    root_id: &str,
) -> Result<Vec<String>> {
    let mut ordered = vec![root_id.to_string()];
    let mut next = 0;

    while next < ordered.len() {
        let children = repo.child_folders(&ordered[next]).await?;
        ordered.extend(children.into_iter().map(|f| f.id));
        next += 1;
    }

    Ok(ordered)
}

/// Walk the ancestor chain from `start_id` upward; error if `needle`
/// appears. Used to reject moves and copies that would place a folder
/// inside itself or its own descendants.
pub(crate) async fn ensure_not_descendant(
    repo: &Repository,
    start_id: &str,
    needle: &str,
) -> Result<()> {
    let mut current = Some(start_id.to_string());

    while let Some(id) = current {
        if id == needle {
            return Err(AppError::Validation(
                "Cannot move folder into its own descendant.".to_string(),
            ));
        }
        current = match repo.find_folder(&id).await? {
            Some(folder) => folder.parent_folder_id,
            None => None,
        };
    }

    Ok(())
}

async fn rollback_ledger(repo: &Repository, user_id: &str, delta: i64) {
    if let Err(e) = repo.apply_storage_delta(user_id, delta).await {
        tracing::error!(
            "Failed to roll back ledger delta {} for user {}: {}",
            delta,
            user_id,
            e
        );
    }
}

/// Tear down one item: backing files, ledger, grants, record.
///
/// File removal is best-effort — a disk error is logged and the record
/// still goes away, leaving at worst an orphaned file. The ledger is
/// decremented exactly once per removed record, so it never over-counts.
pub(crate) async fn delete_item_record(
    repo: &Repository,
    files: &FileStore,
    item: &Item,
) -> Result<()> {
    for url in item.kind.file_refs() {
        if let Err(e) = files.remove(url).await {
            tracing::warn!("Failed to remove backing file {}: {}", url, e);
        }
    }

    repo.apply_storage_delta(&item.user_id, -item.size_bytes)
        .await?;
    repo.remove_grants_for_item(&item.id).await?;
    repo.delete_item_row(&item.id).await?;

    Ok(())
}

/// Deep-copy one item into a destination parent for `owner_id`.
///
/// Backing files are duplicated under fresh filenames; sharing and
/// favorite state never carry over. The ledger is charged up front so
/// quota enforcement happens before any disk write, and rolled back if
/// a later step fails.
pub(crate) async fn copy_item_record(
    repo: &Repository,
    files: &FileStore,
    source: &Item,
    owner_id: &str,
    parent_folder_id: Option<String>,
    name: String,
) -> Result<Item> {
    let size = source.size_bytes;
    repo.apply_storage_delta(owner_id, size).await?;

    let kind = match &source.kind {
        ItemKind::Note { content } => ItemKind::Note {
            content: content.clone(),
        },
        ItemKind::Image {
            file_url,
            mime_type,
            thumbnail_url,
        } => {
            let stored = match files.duplicate(file_url).await {
                Ok(stored) => stored,
                Err(e) => {
                    rollback_ledger(repo, owner_id, -size).await;
                    return Err(e);
                }
            };
            let thumb = match files
                .copy_as(thumbnail_url, &thumbnail_name(&stored.file_name))
                .await
            {
                Ok(thumb) => thumb,
                Err(e) => {
                    let _ = files.remove(&stored.url).await;
                    rollback_ledger(repo, owner_id, -size).await;
                    return Err(e);
                }
            };
            ItemKind::Image {
                file_url: stored.url,
                mime_type: mime_type.clone(),
                thumbnail_url: thumb.url,
            }
        }
        ItemKind::Pdf {
            file_url,
            mime_type,
        } => {
            let stored = match files.duplicate(file_url).await {
                Ok(stored) => stored,
                Err(e) => {
                    rollback_ledger(repo, owner_id, -size).await;
                    return Err(e);
                }
            };
            ItemKind::Pdf {
                file_url: stored.url,
                mime_type: mime_type.clone(),
            }
        }
    };

    let now = Utc::now();
    let item = Item {
        id: Uuid::new_v4().to_string(),
        user_id: owner_id.to_string(),
        parent_folder_id,
        name,
        size_bytes: size,
        is_favorite: false,
        is_shared: false,
        pin_protected: source.pin_protected,
        pin_hash: source.pin_hash.clone(),
        kind,
        created_at: now,
        updated_at: now,
    };

    if let Err(e) = repo.insert_item(&item).await {
        for url in item.kind.file_refs() {
            let _ = files.remove(url).await;
        }
        rollback_ledger(repo, owner_id, -size).await;
        return Err(e);
    }

    Ok(item)
}

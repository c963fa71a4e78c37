//! Access control gate
//!
//! Resolves, for a given actor and target, whether an operation is
//! permitted. Owners hold every capability; non-owners only reach
//! items, and only through a sharing grant with the matching bit set.
//! Folders are never sharable. Delete, share and move stay owner-only
//! regardless of grants.

use crate::database::{Folder, Item, Repository};
use crate::error::{AppError, Result};

/// Operations the gate distinguishes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    View,
    Edit,
    Delete,
    Favorite,
    Share,
    Move,
}

/// Check an actor's capability on an item.
pub async fn authorize_item(
    repo: &Repository,
    actor_id: &str,
    item: &Item,
    capability: Capability,
) -> Result<()> {
    if item.user_id == actor_id {
        return Ok(());
    }

    // Owner-only capabilities never fall through to grants.
    let granted = match capability {
        Capability::Delete | Capability::Share | Capability::Move => false,
        Capability::View | Capability::Edit | Capability::Favorite => {
            match repo.find_grant(&item.id, actor_id).await? {
                Some(grant) => match capability {
                    Capability::View => grant.permissions.can_view,
                    Capability::Edit => grant.permissions.can_edit,
                    Capability::Favorite => grant.permissions.can_favorite,
                    Capability::Delete | Capability::Share | Capability::Move => false,
                },
                None => false,
            }
        }
    };

    if granted {
        Ok(())
    } else {
        Err(AppError::Forbidden)
    }
}

/// Check an actor's access to a folder. Strictly owner-only.
pub fn authorize_folder(actor_id: &str, folder: &Folder) -> Result<()> {
    if folder.user_id == actor_id {
        Ok(())
    } else {
        Err(AppError::Forbidden)
    }
}

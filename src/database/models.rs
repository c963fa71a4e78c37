//! Database models
//!
//! Rust structs representing database entities. API-facing types
//! serialize with the camelCase wire names clients expect.
//!
//! Items are a tagged union: the common envelope (id, owner, parent,
//! name, size, flags) is shared, while variant payloads live in
//! [`ItemKind`] so illegal combinations (a note with a thumbnail)
//! cannot be represented.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row};

/// An account owning folders and items
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub storage_quota_bytes: i64,
    pub used_storage_bytes: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A node in the folder tree
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Folder {
    pub id: String,
    pub user_id: String,
    pub parent_folder_id: Option<String>,
    pub name: String,
    pub pin_protected: bool,
    #[serde(skip_serializing)]
    pub pin_hash: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Item discriminator values as stored in the `item_type` column
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemType {
    Note,
    Image,
    Pdf,
}

impl ItemType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemType::Note => "note",
            ItemType::Image => "image",
            ItemType::Pdf => "pdf",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "note" => Some(ItemType::Note),
            "image" => Some(ItemType::Image),
            "pdf" => Some(ItemType::Pdf),
            _ => None,
        }
    }

    pub const ALL: [ItemType; 3] = [ItemType::Note, ItemType::Image, ItemType::Pdf];
}

/// Variant payload of an item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ItemKind {
    Note {
        #[serde(rename = "noteContent")]
        content: String,
    },
    Image {
        #[serde(rename = "fileUrl")]
        file_url: String,
        #[serde(rename = "fileMimeType")]
        mime_type: String,
        #[serde(rename = "thumbnailUrl")]
        thumbnail_url: String,
    },
    Pdf {
        #[serde(rename = "fileUrl")]
        file_url: String,
        #[serde(rename = "fileMimeType")]
        mime_type: String,
    },
}

impl ItemKind {
    pub fn item_type(&self) -> ItemType {
        match self {
            ItemKind::Note { .. } => ItemType::Note,
            ItemKind::Image { .. } => ItemType::Image,
            ItemKind::Pdf { .. } => ItemType::Pdf,
        }
    }

    /// Backing file URLs referenced by this variant, thumbnail included.
    pub fn file_refs(&self) -> Vec<&str> {
        match self {
            ItemKind::Note { .. } => Vec::new(),
            ItemKind::Image {
                file_url,
                thumbnail_url,
                ..
            } => vec![file_url.as_str(), thumbnail_url.as_str()],
            ItemKind::Pdf { file_url, .. } => vec![file_url.as_str()],
        }
    }
}

/// A typed item owned by a user
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub id: String,
    pub user_id: String,
    pub parent_folder_id: Option<String>,
    pub name: String,
    pub size_bytes: i64,
    pub is_favorite: bool,
    pub is_shared: bool,
    pub pin_protected: bool,
    #[serde(skip_serializing)]
    pub pin_hash: Option<String>,
    #[serde(flatten)]
    pub kind: ItemKind,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn missing_column(index: &str, item_type: &str) -> sqlx::Error {
    sqlx::Error::ColumnDecode {
        index: index.to_string(),
        source: format!("column required for item type '{}' is NULL", item_type).into(),
    }
}

// The variant payload spans nullable columns, so the row mapping is
// done by hand instead of derived.
impl<'r> FromRow<'r, SqliteRow> for Item {
    fn from_row(row: &'r SqliteRow) -> std::result::Result<Self, sqlx::Error> {
        let item_type: String = row.try_get("item_type")?;

        let kind = match item_type.as_str() {
            "note" => ItemKind::Note {
                content: row
                    .try_get::<Option<String>, _>("note_content")?
                    .unwrap_or_default(),
            },
            "image" => ItemKind::Image {
                file_url: row
                    .try_get::<Option<String>, _>("file_url")?
                    .ok_or_else(|| missing_column("file_url", "image"))?,
                mime_type: row
                    .try_get::<Option<String>, _>("file_mime_type")?
                    .ok_or_else(|| missing_column("file_mime_type", "image"))?,
                thumbnail_url: row
                    .try_get::<Option<String>, _>("thumbnail_url")?
                    .ok_or_else(|| missing_column("thumbnail_url", "image"))?,
            },
            "pdf" => ItemKind::Pdf {
                file_url: row
                    .try_get::<Option<String>, _>("file_url")?
                    .ok_or_else(|| missing_column("file_url", "pdf"))?,
                mime_type: row
                    .try_get::<Option<String>, _>("file_mime_type")?
                    .ok_or_else(|| missing_column("file_mime_type", "pdf"))?,
            },
            other => {
                return Err(sqlx::Error::ColumnDecode {
                    index: "item_type".to_string(),
                    source: format!("unknown item type '{}'", other).into(),
                })
            }
        };

        Ok(Item {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            parent_folder_id: row.try_get("parent_folder_id")?,
            name: row.try_get("name")?,
            size_bytes: row.try_get("size_bytes")?,
            is_favorite: row.try_get("is_favorite")?,
            is_shared: row.try_get("is_shared")?,
            pin_protected: row.try_get("pin_protected")?,
            pin_hash: row.try_get("pin_hash")?,
            kind,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

/// Permission bits of a sharing grant
#[derive(Debug, Clone, Copy, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Permissions {
    pub can_view: bool,
    pub can_edit: bool,
    pub can_favorite: bool,
}

/// A capability record giving a non-owner limited rights on one item
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct SharingGrant {
    pub id: String,
    pub item_id: String,
    pub shared_by_user_id: String,
    pub shared_with_user_id: String,
    #[sqlx(flatten)]
    pub permissions: Permissions,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Whitelisted sort keys for listings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    CreatedAt,
    UpdatedAt,
    Name,
    SizeBytes,
}

impl SortKey {
    /// Parse the camelCase wire name.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "createdAt" => Some(SortKey::CreatedAt),
            "updatedAt" => Some(SortKey::UpdatedAt),
            "name" => Some(SortKey::Name),
            "sizeBytes" => Some(SortKey::SizeBytes),
            _ => None,
        }
    }

    /// Column name interpolated into ORDER BY. Only these fixed
    /// strings ever reach the query text.
    pub fn column(&self) -> &'static str {
        match self {
            SortKey::CreatedAt => "created_at",
            SortKey::UpdatedAt => "updated_at",
            SortKey::Name => "name",
            SortKey::SizeBytes => "size_bytes",
        }
    }
}

impl Default for SortKey {
    fn default() -> Self {
        SortKey::CreatedAt
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "asc" => Some(SortOrder::Asc),
            "desc" => Some(SortOrder::Desc),
            _ => None,
        }
    }

    pub fn keyword(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

impl Default for SortOrder {
    fn default() -> Self {
        SortOrder::Desc
    }
}

/// Page, sort and filter parameters for item listings
#[derive(Debug, Clone, Default)]
pub struct ItemListQuery {
    pub parent_folder_id: Option<String>,
    pub item_type: Option<ItemType>,
    pub search: Option<String>,
    pub date_from: Option<DateTime<Utc>>,
    pub date_to: Option<DateTime<Utc>>,
    pub page: i64,
    pub limit: i64,
    pub sort: SortKey,
    pub order: SortOrder,
}

/// Per-type usage bucket for storage reports
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageBucket {
    pub count: i64,
    pub total_size_bytes: i64,
    pub average_size_bytes: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_kind_serializes_flat() {
        let kind = ItemKind::Note {
            content: "hello".to_string(),
        };
        let json = serde_json::to_value(&kind).unwrap();
        assert_eq!(json["type"], "note");
        assert_eq!(json["noteContent"], "hello");
    }

    #[test]
    fn test_image_kind_file_refs() {
        let kind = ItemKind::Image {
            file_url: "/uploads/u/images/a.png".to_string(),
            mime_type: "image/png".to_string(),
            thumbnail_url: "/uploads/u/images/thumb-a.png".to_string(),
        };
        assert_eq!(
            kind.file_refs(),
            vec!["/uploads/u/images/a.png", "/uploads/u/images/thumb-a.png"]
        );
        assert_eq!(kind.item_type(), ItemType::Image);
    }

    #[test]
    fn test_note_has_no_file_refs() {
        let kind = ItemKind::Note {
            content: String::new(),
        };
        assert!(kind.file_refs().is_empty());
    }

    #[test]
    fn test_sort_key_whitelist() {
        assert_eq!(SortKey::parse("createdAt"), Some(SortKey::CreatedAt));
        assert_eq!(SortKey::parse("sizeBytes"), Some(SortKey::SizeBytes));
        assert_eq!(SortKey::parse("created_at; DROP TABLE items"), None);
    }

    #[test]
    fn test_item_type_roundtrip() {
        for t in ItemType::ALL {
            assert_eq!(ItemType::parse(t.as_str()), Some(t));
        }
        assert_eq!(ItemType::parse("folder"), None);
    }
}

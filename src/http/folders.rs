//! Folder route handlers

use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;

use crate::app::AppState;
use crate::error::Result;
use crate::http::auth::AuthUser;
use crate::http::response::{self, PageMeta};
use crate::http::{ensure_id_format, page_params, sort_params};
use crate::services::folders::{FolderChanges, NewFolder};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateFolderBody {
    pub name: String,
    #[serde(default)]
    pub parent_folder_id: Option<String>,
    #[serde(default)]
    pub pin_protected: Option<bool>,
    #[serde(default)]
    pub pin: Option<String>,
}

/// POST /folders
pub async fn create(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(body): Json<CreateFolderBody>,
) -> Result<impl IntoResponse> {
    if let Some(parent_id) = &body.parent_folder_id {
        ensure_id_format(parent_id, "parentFolderId")?;
    }

    let folder = state
        .folders
        .create_folder(
            &user.id,
            NewFolder {
                name: body.name,
                parent_folder_id: body.parent_folder_id,
                pin_protected: body.pin_protected.unwrap_or(false),
                pin: body.pin,
            },
        )
        .await?;

    Ok(response::created(folder))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListFoldersQuery {
    pub parent_folder_id: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub sort_by: Option<String>,
    pub order: Option<String>,
}

/// GET /folders
pub async fn list(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Query(query): Query<ListFoldersQuery>,
) -> Result<impl IntoResponse> {
    if let Some(parent_id) = &query.parent_folder_id {
        ensure_id_format(parent_id, "parentFolderId")?;
    }
    let (page, limit) = page_params(query.page, query.limit)?;
    let (sort, order) = sort_params(query.sort_by.as_deref(), query.order.as_deref())?;

    let (folders, total) = state
        .folders
        .list_folders(
            &user.id,
            query.parent_folder_id.as_deref(),
            page,
            limit,
            sort,
            order,
        )
        .await?;

    Ok(response::page(folders, PageMeta::new(page, limit, total)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateFolderBody {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub parent_folder_id: Option<String>,
    #[serde(default)]
    pub pin_protected: Option<bool>,
    #[serde(default)]
    pub pin: Option<String>,
}

/// PATCH /folders/{id}
pub async fn update(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(folder_id): Path<String>,
    Json(body): Json<UpdateFolderBody>,
) -> Result<impl IntoResponse> {
    ensure_id_format(&folder_id, "folderId")?;
    if let Some(parent_id) = &body.parent_folder_id {
        ensure_id_format(parent_id, "parentFolderId")?;
    }

    let folder = state
        .folders
        .update_folder(
            &user.id,
            &folder_id,
            FolderChanges {
                name: body.name,
                parent_folder_id: body.parent_folder_id,
                pin_protected: body.pin_protected,
                pin: body.pin,
            },
        )
        .await?;

    Ok(response::ok(folder))
}

/// DELETE /folders/{id}
pub async fn remove(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(folder_id): Path<String>,
) -> Result<impl IntoResponse> {
    ensure_id_format(&folder_id, "folderId")?;

    state.folders.delete_folder(&user.id, &folder_id).await?;

    Ok(response::no_content())
}

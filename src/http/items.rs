//! Item route handlers
//!
//! Notes arrive as JSON; images and PDFs as multipart uploads with the
//! metadata fields beside the file part.

use axum::extract::{Multipart, Path, Query, State};
use axum::response::IntoResponse;
use axum::Json;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;

use crate::app::AppState;
use crate::database::{ItemListQuery, ItemType};
use crate::error::{AppError, Result};
use crate::http::auth::AuthUser;
use crate::http::response::{self, PageMeta};
use crate::http::{ensure_id_format, page_params, sort_params};
use crate::services::items::{ItemChanges, NewNote, NewUpload};
use crate::services::reports::CalendarPeriod;

fn parse_item_type(raw: &str) -> Result<ItemType> {
    ItemType::parse(raw).ok_or_else(|| AppError::Validation("Invalid type.".to_string()))
}

/// Accept an RFC 3339 timestamp or a plain date. A plain date expands
/// to the start or end of that day depending on which bound it is.
fn parse_date_bound(raw: &str, end: bool) -> Result<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }

    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        let time = if end {
            date.and_hms_milli_opt(23, 59, 59, 999)
        } else {
            date.and_hms_opt(0, 0, 0)
        };
        if let Some(naive) = time {
            return Ok(DateTime::from_naive_utc_and_offset(naive, Utc));
        }
    }

    Err(AppError::Validation(format!("Invalid date: {}", raw)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListItemsQuery {
    pub parent_folder_id: Option<String>,
    #[serde(rename = "type")]
    pub item_type: Option<String>,
    pub search: Option<String>,
    pub date_from: Option<String>,
    pub date_to: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub sort_by: Option<String>,
    pub order: Option<String>,
}

/// GET /items
pub async fn list(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Query(query): Query<ListItemsQuery>,
) -> Result<impl IntoResponse> {
    if let Some(parent_id) = &query.parent_folder_id {
        ensure_id_format(parent_id, "parentFolderId")?;
    }
    let (page, limit) = page_params(query.page, query.limit)?;
    let (sort, order) = sort_params(query.sort_by.as_deref(), query.order.as_deref())?;

    let list_query = ItemListQuery {
        parent_folder_id: query.parent_folder_id,
        item_type: query.item_type.as_deref().map(parse_item_type).transpose()?,
        search: query.search,
        date_from: query
            .date_from
            .as_deref()
            .map(|raw| parse_date_bound(raw, false))
            .transpose()?,
        date_to: query
            .date_to
            .as_deref()
            .map(|raw| parse_date_bound(raw, true))
            .transpose()?,
        page,
        limit,
        sort,
        order,
    };

    let (items, total) = state.items.list_items(&user.id, &list_query).await?;

    Ok(response::page(items, PageMeta::new(page, limit, total)))
}

/// GET /items/count-usage
pub async fn count_usage(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<impl IntoResponse> {
    let usage = state.reports.count_usage(&user.id).await?;
    Ok(response::ok(usage))
}

#[derive(Debug, Deserialize)]
pub struct CalendarQuery {
    pub period: Option<String>,
    pub date: Option<String>,
    #[serde(rename = "type")]
    pub item_type: Option<String>,
}

/// GET /items/calendar
pub async fn calendar(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Query(query): Query<CalendarQuery>,
) -> Result<impl IntoResponse> {
    let period = query
        .period
        .as_deref()
        .and_then(CalendarPeriod::parse)
        .ok_or_else(|| AppError::Validation("Invalid period.".to_string()))?;

    let anchor = query
        .date
        .as_deref()
        .map(|raw| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .map_err(|_| AppError::Validation(format!("Invalid date: {}", raw)))
        })
        .transpose()?;

    let item_type = query.item_type.as_deref().map(parse_item_type).transpose()?;

    let report = state
        .reports
        .calendar(&user.id, period, anchor, item_type)
        .await?;

    Ok(response::ok(report))
}

/// GET /items/{id}
pub async fn get(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(item_id): Path<String>,
) -> Result<impl IntoResponse> {
    ensure_id_format(&item_id, "itemId")?;

    let item = state.items.get_item(&user.id, &item_id).await?;

    Ok(response::ok(item))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateNoteBody {
    pub name: String,
    pub note_content: String,
    #[serde(default)]
    pub parent_folder_id: Option<String>,
    #[serde(default)]
    pub pin_protected: Option<bool>,
    #[serde(default)]
    pub pin: Option<String>,
}

/// POST /items/note
pub async fn create_note(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(body): Json<CreateNoteBody>,
) -> Result<impl IntoResponse> {
    if let Some(parent_id) = &body.parent_folder_id {
        ensure_id_format(parent_id, "parentFolderId")?;
    }

    let item = state
        .items
        .create_note(
            &user.id,
            NewNote {
                name: body.name,
                content: body.note_content,
                parent_folder_id: body.parent_folder_id,
                pin_protected: body.pin_protected.unwrap_or(false),
                pin: body.pin,
            },
        )
        .await?;

    Ok(response::created(item))
}

struct FilePart {
    original_filename: String,
    mime_type: String,
    data: Vec<u8>,
}

#[derive(Default)]
struct UploadForm {
    name: Option<String>,
    parent_folder_id: Option<String>,
    pin_protected: bool,
    pin: Option<String>,
    file: Option<FilePart>,
}

fn form_error(e: axum::extract::multipart::MultipartError) -> AppError {
    AppError::Validation(format!("Invalid form data: {}", e))
}

async fn read_upload_form(mut multipart: Multipart) -> Result<UploadForm> {
    let mut form = UploadForm::default();

    while let Some(field) = multipart.next_field().await.map_err(form_error)? {
        let field_name = field.name().unwrap_or_default().to_string();

        match field_name.as_str() {
            "name" => form.name = Some(field.text().await.map_err(form_error)?),
            "parentFolderId" => {
                let value = field.text().await.map_err(form_error)?;
                if !value.is_empty() {
                    form.parent_folder_id = Some(value);
                }
            }
            "pinProtected" => {
                let value = field.text().await.map_err(form_error)?;
                form.pin_protected = matches!(value.as_str(), "true" | "1");
            }
            "pin" => {
                let value = field.text().await.map_err(form_error)?;
                if !value.is_empty() {
                    form.pin = Some(value);
                }
            }
            "file" => {
                let original_filename = field.file_name().unwrap_or("upload").to_string();
                let mime_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let data = field.bytes().await.map_err(form_error)?.to_vec();
                form.file = Some(FilePart {
                    original_filename,
                    mime_type,
                    data,
                });
            }
            _ => {}
        }
    }

    Ok(form)
}

fn upload_from_form(form: UploadForm) -> Result<NewUpload> {
    let file = form
        .file
        .ok_or_else(|| AppError::Validation("File is required.".to_string()))?;
    let name = form
        .name
        .ok_or_else(|| AppError::Validation("Name is required.".to_string()))?;

    if let Some(parent_id) = &form.parent_folder_id {
        ensure_id_format(parent_id, "parentFolderId")?;
    }

    Ok(NewUpload {
        name,
        parent_folder_id: form.parent_folder_id,
        pin_protected: form.pin_protected,
        pin: form.pin,
        original_filename: file.original_filename,
        mime_type: file.mime_type,
        data: file.data,
    })
}

/// POST /items/image
pub async fn upload_image(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    multipart: Multipart,
) -> Result<impl IntoResponse> {
    let upload = upload_from_form(read_upload_form(multipart).await?)?;

    let item = state.items.create_image(&user.id, upload).await?;

    Ok(response::created(item))
}

/// POST /items/pdf
pub async fn upload_pdf(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    multipart: Multipart,
) -> Result<impl IntoResponse> {
    let upload = upload_from_form(read_upload_form(multipart).await?)?;

    let item = state.items.create_pdf(&user.id, upload).await?;

    Ok(response::created(item))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateItemBody {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub parent_folder_id: Option<String>,
    #[serde(default)]
    pub note_content: Option<String>,
    #[serde(default)]
    pub pin_protected: Option<bool>,
    #[serde(default)]
    pub pin: Option<String>,
}

/// PUT /items/{id}
pub async fn update(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(item_id): Path<String>,
    Json(body): Json<UpdateItemBody>,
) -> Result<impl IntoResponse> {
    ensure_id_format(&item_id, "itemId")?;
    if let Some(parent_id) = &body.parent_folder_id {
        ensure_id_format(parent_id, "parentFolderId")?;
    }

    let item = state
        .items
        .update_item(
            &user.id,
            &item_id,
            ItemChanges {
                name: body.name,
                parent_folder_id: body.parent_folder_id,
                note_content: body.note_content,
                pin_protected: body.pin_protected,
                pin: body.pin,
            },
        )
        .await?;

    Ok(response::ok(item))
}

/// DELETE /items/{id}
pub async fn remove(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(item_id): Path<String>,
) -> Result<impl IntoResponse> {
    ensure_id_format(&item_id, "itemId")?;

    state.items.delete_item(&user.id, &item_id).await?;

    Ok(response::no_content())
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CopyBody {
    #[serde(default)]
    pub target_folder_id: Option<String>,
    #[serde(default)]
    pub new_name: Option<String>,
}

/// POST /items/{id}/copy
pub async fn copy(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(item_id): Path<String>,
    body: Option<Json<CopyBody>>,
) -> Result<impl IntoResponse> {
    let body = body.map(|Json(b)| b).unwrap_or_default();
    ensure_id_format(&item_id, "itemId")?;
    if let Some(target_id) = &body.target_folder_id {
        ensure_id_format(target_id, "targetFolderId")?;
    }

    let item = state
        .items
        .copy_item(&user.id, &item_id, body.target_folder_id, body.new_name)
        .await?;

    Ok(response::created(serde_json::json!({
        "copiedItemId": item.id,
        "message": "Item copied successfully.",
    })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareBody {
    pub shared_with_user_id: String,
    #[serde(default)]
    pub can_edit: Option<bool>,
    #[serde(default)]
    pub can_favorite: Option<bool>,
}

/// POST /items/{id}/share
pub async fn share(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(item_id): Path<String>,
    Json(body): Json<ShareBody>,
) -> Result<impl IntoResponse> {
    ensure_id_format(&item_id, "itemId")?;
    ensure_id_format(&body.shared_with_user_id, "sharedWithUserId")?;

    state
        .items
        .share_item(
            &user.id,
            &item_id,
            &body.shared_with_user_id,
            body.can_edit.unwrap_or(false),
            body.can_favorite.unwrap_or(false),
        )
        .await?;

    Ok(response::ok(serde_json::json!({
        "message": format!("Item shared with user {}", body.shared_with_user_id),
    })))
}

/// DELETE /items/{id}/share/{shared_with_user_id}
pub async fn revoke_share(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path((item_id, shared_with_user_id)): Path<(String, String)>,
) -> Result<impl IntoResponse> {
    ensure_id_format(&item_id, "itemId")?;
    ensure_id_format(&shared_with_user_id, "sharedWithUserId")?;

    state
        .items
        .revoke_share(&user.id, &item_id, &shared_with_user_id)
        .await?;

    Ok(response::no_content())
}

#[derive(Debug, Default, Deserialize)]
pub struct FavoriteBody {
    #[serde(default)]
    pub favorite: Option<bool>,
}

/// POST /items/{id}/favorite
pub async fn favorite(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(item_id): Path<String>,
    body: Option<Json<FavoriteBody>>,
) -> Result<impl IntoResponse> {
    let body = body.map(|Json(b)| b).unwrap_or_default();
    ensure_id_format(&item_id, "itemId")?;

    let item = state
        .items
        .set_favorite(&user.id, &item_id, body.favorite)
        .await?;

    Ok(response::ok(serde_json::json!({
        "id": item.id,
        "type": item.kind.item_type().as_str(),
        "name": item.name,
        "isFavorite": item.is_favorite,
    })))
}

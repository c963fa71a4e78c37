//! HTTP layer
//!
//! Axum routing, the response envelope, the authenticated-user
//! extractor, and one handler module per resource:
//! - `folders`: folder CRUD
//! - `items`: item CRUD, uploads, copy, sharing, favorites, calendar
//! - `storage`: quota and usage overview
//!
//! The uploads directory is served statically under `/uploads`.

pub mod auth;
pub mod folders;
pub mod items;
pub mod response;
pub mod storage;

use axum::extract::DefaultBodyLimit;
use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use uuid::Uuid;

use crate::app::AppState;
use crate::config::{DEFAULT_PAGE_LIMIT, MAX_PAGE_LIMIT, MAX_UPLOAD_SIZE_BYTES};
use crate::database::{SortKey, SortOrder};
use crate::error::{AppError, Result};

/// Build the application router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/folders", post(folders::create).get(folders::list))
        .route(
            "/folders/{id}",
            axum::routing::patch(folders::update).delete(folders::remove),
        )
        .route("/items", get(items::list))
        .route("/items/count-usage", get(items::count_usage))
        .route("/items/calendar", get(items::calendar))
        .route("/items/note", post(items::create_note))
        .route("/items/image", post(items::upload_image))
        .route("/items/pdf", post(items::upload_pdf))
        .route(
            "/items/{id}",
            get(items::get).put(items::update).delete(items::remove),
        )
        .route("/items/{id}/copy", post(items::copy))
        .route("/items/{id}/share", post(items::share))
        .route(
            "/items/{id}/share/{shared_with_user_id}",
            delete(items::revoke_share),
        )
        .route("/items/{id}/favorite", post(items::favorite))
        .route("/storage/quota", get(storage::quota))
        .route("/storage/overview", get(storage::overview))
        .nest_service("/uploads", ServeDir::new(&state.uploads_dir))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_SIZE_BYTES + 64 * 1024))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Reject ids that are not well-formed UUIDs before they reach the
/// store, keeping the 400-vs-404 distinction the API promises.
pub(crate) fn ensure_id_format(raw: &str, label: &str) -> Result<()> {
    Uuid::parse_str(raw)
        .map(|_| ())
        .map_err(|_| AppError::Validation(format!("Invalid {}.", label)))
}

/// Resolve page/limit query parameters with defaults and bounds
pub(crate) fn page_params(page: Option<i64>, limit: Option<i64>) -> Result<(i64, i64)> {
    let page = page.unwrap_or(1);
    let limit = limit.unwrap_or(DEFAULT_PAGE_LIMIT);

    if page < 1 {
        return Err(AppError::Validation("page must be at least 1.".to_string()));
    }
    if !(1..=MAX_PAGE_LIMIT).contains(&limit) {
        return Err(AppError::Validation(format!(
            "limit must be between 1 and {}.",
            MAX_PAGE_LIMIT
        )));
    }

    Ok((page, limit))
}

/// Resolve sortBy/order query parameters against the whitelist
pub(crate) fn sort_params(
    sort_by: Option<&str>,
    order: Option<&str>,
) -> Result<(SortKey, SortOrder)> {
    let sort = match sort_by {
        Some(raw) => {
            SortKey::parse(raw).ok_or_else(|| AppError::Validation("Invalid sortBy.".to_string()))?
        }
        None => SortKey::default(),
    };
    let order = match order {
        Some(raw) => SortOrder::parse(raw)
            .ok_or_else(|| AppError::Validation("Invalid order.".to_string()))?,
        None => SortOrder::default(),
    };

    Ok((sort, order))
}

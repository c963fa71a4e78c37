//! Response envelope
//!
//! Every success response is `{status: "success", data, meta?}`;
//! paginated listings carry `meta: {page, limit, totalItems,
//! totalPages}`. Errors are produced by AppError's IntoResponse.

use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

/// Pagination metadata for list responses
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMeta {
    pub page: i64,
    pub limit: i64,
    pub total_items: i64,
    pub total_pages: i64,
}

impl PageMeta {
    pub fn new(page: i64, limit: i64, total_items: i64) -> Self {
        let total_pages = if limit > 0 {
            (total_items + limit - 1) / limit
        } else {
            0
        };

        Self {
            page,
            limit,
            total_items,
            total_pages,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct Envelope<T: Serialize> {
    pub status: &'static str,
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<PageMeta>,
}

/// 200 with data
pub fn ok<T: Serialize>(data: T) -> (StatusCode, Json<Envelope<T>>) {
    (
        StatusCode::OK,
        Json(Envelope {
            status: "success",
            data,
            meta: None,
        }),
    )
}

/// 201 with data
pub fn created<T: Serialize>(data: T) -> (StatusCode, Json<Envelope<T>>) {
    (
        StatusCode::CREATED,
        Json(Envelope {
            status: "success",
            data,
            meta: None,
        }),
    )
}

/// 200 with data and pagination meta
pub fn page<T: Serialize>(data: T, meta: PageMeta) -> (StatusCode, Json<Envelope<T>>) {
    (
        StatusCode::OK,
        Json(Envelope {
            status: "success",
            data,
            meta: Some(meta),
        }),
    )
}

/// 204, no body
pub fn no_content() -> StatusCode {
    StatusCode::NO_CONTENT
}

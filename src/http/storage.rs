//! Storage route handlers

use axum::extract::State;
use axum::response::IntoResponse;

use crate::app::AppState;
use crate::error::Result;
use crate::http::auth::AuthUser;
use crate::http::response;

/// GET /storage/quota
pub async fn quota(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<impl IntoResponse> {
    let report = state.reports.quota_report(&user);
    Ok(response::ok(report))
}

/// GET /storage/overview
pub async fn overview(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<impl IntoResponse> {
    let report = state.reports.overview(&user.id).await?;
    Ok(response::ok(report))
}

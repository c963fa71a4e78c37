//! Authenticated-user extractor
//!
//! Credential verification and token issuance happen upstream; the
//! backend trusts the `x-user-id` header the gateway injects. A missing
//! header is UNAUTHORIZED, a malformed id or an id matching no user is
//! INVALID_TOKEN — both 401, mirroring the split between "no credential"
//! and "bad credential".

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use uuid::Uuid;

use crate::app::AppState;
use crate::database::User;
use crate::error::AppError;

pub const USER_ID_HEADER: &str = "x-user-id";

/// The authenticated requester, loaded fresh per request
pub struct AuthUser(pub User);

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(USER_ID_HEADER)
            .ok_or(AppError::Unauthorized)?
            .to_str()
            .map_err(|_| AppError::InvalidToken)?;

        let id = Uuid::parse_str(raw).map_err(|_| AppError::InvalidToken)?;

        match state.repo.get_user(&id.to_string()).await {
            Ok(user) => Ok(AuthUser(user)),
            Err(AppError::NotFound(_)) => Err(AppError::InvalidToken),
            Err(e) => Err(e),
        }
    }
}

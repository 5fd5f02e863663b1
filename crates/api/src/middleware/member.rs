//! Calling member extractor.
//!
//! Authentication happens upstream; the gateway forwards the authenticated
//! member as `x-member-id` and `x-member-name` headers.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use beacon_core::error::CoreError;
use beacon_core::types::DbId;

use crate::error::AppError;
use crate::state::AppState;

pub const MEMBER_ID_HEADER: &str = "x-member-id";
pub const MEMBER_NAME_HEADER: &str = "x-member-name";

/// The member performing the request. Used for audit fields.
///
/// ```ignore
/// async fn my_handler(member: Member) -> AppResult<Json<()>> {
///     tracing::info!(member_id = member.id, "handling request");
///     Ok(Json(()))
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    pub id: DbId,
    pub name: String,
}

impl FromRequestParts<AppState> for Member {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let id = parts
            .headers
            .get(MEMBER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                AppError::Core(CoreError::Unauthorized(format!(
                    "Missing {MEMBER_ID_HEADER} header"
                )))
            })?
            .trim()
            .parse::<DbId>()
            .map_err(|_| {
                AppError::Core(CoreError::Unauthorized(format!(
                    "Invalid {MEMBER_ID_HEADER} header"
                )))
            })?;

        let name = parts
            .headers
            .get(MEMBER_NAME_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or("unknown")
            .to_string();

        Ok(Member { id, name })
    }
}

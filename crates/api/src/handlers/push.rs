//! Handlers for push campaign messages.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use beacon_core::types::DbId;

use crate::campaign::test_send::PollSettings;
use crate::campaign;
use crate::campaign::input::{EstimateInput, ListQuery, MessageInput, ToggleInput};
use crate::error::AppResult;
use crate::middleware::member::Member;
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

/// POST /api/v1/push/messages
///
/// Create a draft, or create and schedule a message.
pub async fn create_message(
    member: Member,
    State(state): State<AppState>,
    Json(input): Json<MessageInput>,
) -> AppResult<impl IntoResponse> {
    let msg = campaign::create(&state.pool, &input, &member).await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: msg })))
}

/// GET /api/v1/push/messages?app_id={id}
pub async fn list_messages(
    _member: Member,
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> AppResult<impl IntoResponse> {
    let page = campaign::all(&state.pool, &query).await?;
    Ok(Json(DataResponse { data: page }))
}

/// GET /api/v1/push/messages/{id}
pub async fn get_message(
    _member: Member,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let msg = campaign::one(&state.pool, id).await?;
    Ok(Json(DataResponse { data: msg }))
}

/// PUT /api/v1/push/messages/{id}
pub async fn update_message(
    member: Member,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Json(input): Json<MessageInput>,
) -> AppResult<impl IntoResponse> {
    let msg = campaign::update(&state.pool, id, &input, &member).await?;
    Ok(Json(DataResponse { data: msg }))
}

/// DELETE /api/v1/push/messages/{id}
pub async fn delete_message(
    member: Member,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<StatusCode> {
    campaign::remove(&state.pool, id, &member).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/push/messages/{id}/toggle
///
/// Start (`active: true`) or stop an auto or API message.
pub async fn toggle_message(
    member: Member,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Json(input): Json<ToggleInput>,
) -> AppResult<impl IntoResponse> {
    let msg = campaign::toggle(&state.pool, id, input.active, &member).await?;
    Ok(Json(DataResponse { data: msg }))
}

// ---------------------------------------------------------------------------
// Audience
// ---------------------------------------------------------------------------

/// POST /api/v1/push/estimate
pub async fn estimate_audience(
    _member: Member,
    State(state): State<AppState>,
    Json(input): Json<EstimateInput>,
) -> AppResult<impl IntoResponse> {
    let estimate = campaign::estimate(&state.pool, &input).await?;
    Ok(Json(DataResponse { data: estimate }))
}

/// POST /api/v1/push/test
///
/// Send the message to the app's test users and wait for the outcome.
/// The throwaway message is removed before the response is sent.
pub async fn test_message(
    member: Member,
    State(state): State<AppState>,
    Json(input): Json<MessageInput>,
) -> AppResult<impl IntoResponse> {
    let poll = PollSettings {
        interval: state.config.test_poll_interval,
        timeout: state.config.test_timeout,
    };
    let result = campaign::test(&state.pool, &input, &member, poll).await?;
    Ok(Json(DataResponse { data: result }))
}

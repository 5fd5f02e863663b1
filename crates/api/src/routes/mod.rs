pub mod health;
pub mod push;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /push/messages                   list, create
/// /push/messages/{id}              get, update, delete
/// /push/messages/{id}/toggle       start or stop (POST)
/// /push/estimate                   audience estimate (POST)
/// /push/test                       test send (POST)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new().nest("/push", push::router())
}

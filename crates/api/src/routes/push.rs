//! Route definitions for push campaigns, mounted at `/push`.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::push;
use crate::state::AppState;

/// ```text
/// GET    /messages              -> list_messages
/// POST   /messages              -> create_message
/// GET    /messages/{id}         -> get_message
/// PUT    /messages/{id}         -> update_message
/// DELETE /messages/{id}         -> delete_message
/// POST   /messages/{id}/toggle  -> toggle_message
/// POST   /estimate              -> estimate_audience
/// POST   /test                  -> test_message
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/messages",
            get(push::list_messages).post(push::create_message),
        )
        .route(
            "/messages/{id}",
            get(push::get_message)
                .put(push::update_message)
                .delete(push::delete_message),
        )
        .route("/messages/{id}/toggle", post(push::toggle_message))
        .route("/estimate", post(push::estimate_audience))
        .route("/test", post(push::test_message))
}

//! Analytics events consulted by drill filters and written by demo data.

use beacon_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `app_events` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct AppEvent {
    pub id: DbId,
    pub app_id: DbId,
    pub uid: Option<String>,
    pub event_key: String,
    pub segmentation: serde_json::Value,
    pub count: i64,
    pub occurred_at: Timestamp,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for recording an event.
#[derive(Debug, Clone, Deserialize)]
pub struct NewAppEvent {
    pub uid: Option<String>,
    pub event_key: String,
    pub segmentation: serde_json::Value,
    pub count: i64,
    pub occurred_at: Timestamp,
}

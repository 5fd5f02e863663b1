//! Delivery work items handed to the external worker.

use beacon_core::platform::Platform;
use beacon_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `push_queue` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct QueueItem {
    pub id: DbId,
    pub message_id: DbId,
    pub app_user_id: DbId,
    pub platform: String,
    pub token: String,
    pub locale: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// One recipient token to enqueue.
#[derive(Debug, Clone)]
pub struct NewQueueItem {
    pub app_user_id: DbId,
    pub platform: Platform,
    pub token: String,
    pub locale: Option<String>,
}

//! Push message entity and its write DTOs.

use beacon_core::content::{Content, Info};
use beacon_core::filter::Filter;
use beacon_core::lifecycle::Lifecycle;
use beacon_core::platform::Platform;
use beacon_core::result::DeliveryResult;
use beacon_core::state::{MessageState, MessageStatus};
use beacon_core::trigger::Trigger;
use beacon_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::types::Json;
use sqlx::FromRow;

/// A row from the `push_messages` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct PushMessage {
    pub id: DbId,
    pub app_id: DbId,
    pub platforms: Json<Vec<Platform>>,
    pub filter: Json<Filter>,
    pub triggers: Json<Vec<Trigger>>,
    pub contents: Json<Vec<Content>>,
    pub info: Json<Info>,
    #[sqlx(try_from = "i32")]
    pub state: MessageState,
    #[sqlx(try_from = "String")]
    pub status: MessageStatus,
    pub result: Json<DeliveryResult>,
    pub is_test: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl PushMessage {
    pub fn lifecycle(&self) -> Lifecycle {
        Lifecycle::new(self.state, self.status)
    }
}

/// DTO for inserting a message.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub app_id: DbId,
    pub platforms: Vec<Platform>,
    pub filter: Filter,
    pub triggers: Vec<Trigger>,
    pub contents: Vec<Content>,
    pub info: Info,
    pub state: MessageState,
    pub status: MessageStatus,
    pub is_test: bool,
}

/// Fields a conditional write may set. `None` leaves the column as is.
///
/// `result` replaces the stored result document; `result_patch` is merged
/// into it key by key afterwards, so a removal audit patch never clobbers
/// counters written by the delivery worker.
#[derive(Debug, Clone, Default)]
pub struct MessageChange {
    pub state: Option<MessageState>,
    pub status: Option<MessageStatus>,
    pub filter: Option<Filter>,
    pub triggers: Option<Vec<Trigger>>,
    pub contents: Option<Vec<Content>>,
    pub info: Option<Info>,
    pub result: Option<DeliveryResult>,
    pub result_patch: Option<serde_json::Value>,
    pub is_test: Option<bool>,
}

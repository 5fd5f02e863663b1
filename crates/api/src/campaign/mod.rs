//! Campaign service operations.
//!
//! Handlers stay thin and call into here. Every write that can race with
//! the delivery worker goes through `MessageRepo::update_if_state`; a lost
//! race surfaces as [`CoreError::Conflict`] and is never retried silently,
//! except by the test-send cleanup which must always finish.

pub mod demo;
pub mod input;
pub mod ops;
pub mod test_send;
pub mod validate;

use beacon_core::error::CoreError;
use beacon_core::lifecycle::{transition, LifecycleEvent, TriggerCaps};
use beacon_core::types::DbId;
use beacon_db::models::message::{MessageChange, PushMessage};
use beacon_db::repositories::MessageRepo;
use sqlx::PgPool;

use crate::error::{AppError, AppResult};

pub use ops::{all, create, estimate, one, remove, toggle, update, MessagePage};
pub use test_send::test;

/// Load a message that has not been soft-deleted.
pub(crate) async fn find_message(pool: &PgPool, id: DbId) -> AppResult<PushMessage> {
    MessageRepo::find_by_id(pool, id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Message",
            id,
        }))
}

pub(crate) fn lost_race(id: DbId, action: &str) -> AppError {
    tracing::warn!(message_id = id, action, "Conditional write lost the race");
    AppError::Core(CoreError::Conflict(format!(
        "Message {id} was changed concurrently, {action} failed. Please try again"
    )))
}

/// Move `msg` through `event` with a conditional write on its current state.
pub(crate) async fn apply(
    pool: &PgPool,
    msg: &PushMessage,
    event: LifecycleEvent,
    extra: MessageChange,
) -> AppResult<Option<PushMessage>> {
    let next = transition(
        Some(msg.lifecycle()),
        event,
        TriggerCaps::of(&msg.triggers.0),
    )?;
    let change = MessageChange {
        state: Some(next.state),
        status: Some(next.status),
        ..extra
    };
    Ok(MessageRepo::update_if_state(pool, msg.id, msg.state, &change).await?)
}

/// Hand a created message to the delivery worker.
pub(crate) async fn schedule(pool: &PgPool, msg: &PushMessage) -> AppResult<PushMessage> {
    let scheduled = apply(pool, msg, LifecycleEvent::Schedule, MessageChange::default())
        .await?
        .ok_or_else(|| lost_race(msg.id, "scheduling"))?;
    tracing::info!(message_id = msg.id, state = %scheduled.state, "Message scheduled");
    Ok(scheduled)
}

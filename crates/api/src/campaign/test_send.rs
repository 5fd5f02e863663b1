//! Throwaway test sends to the app's configured test audience.
//!
//! The test message is queued for the delivery worker and watched until it
//! completes, fails, disappears or the ceiling elapses. Whatever happens, the
//! message is soft-deleted afterwards. The watch and the cleanup run in a
//! spawned task so a dropped request cannot skip the cleanup.
//!
//! The body is validated before the test audience is looked up, so a bad
//! body reports its own reasons even when the app has no test users.

use std::time::Duration;

use beacon_core::audience::compile;
use beacon_core::error::CoreError;
use beacon_core::filter::Filter;
use beacon_core::lifecycle::LifecycleEvent;
use beacon_core::result::{removal_patch, Counter, DeliveryResult};
use beacon_core::test_send::{
    initial_lifecycle, poll_outcome, triggers, PollOutcome, CLEANUP_FAILED, DELIVERY_FAILED,
    NO_TOKENS,
};
use beacon_db::models::message::{MessageChange, NewMessage, PushMessage};
use beacon_db::models::queue::NewQueueItem;
use beacon_db::repositories::audience_repo::RESOLVE_BATCH;
use beacon_db::repositories::{AudienceRepo, MessageRepo, QueueRepo};
use chrono::Utc;
use sqlx::PgPool;

use crate::campaign::apply;
use crate::campaign::input::MessageInput;
use crate::campaign::validate::validate_message;
use crate::error::{AppError, AppResult};
use crate::middleware::member::Member;

/// How many times the cleanup re-reads and retries a lost soft-delete.
const CLEANUP_ATTEMPTS: usize = 3;

/// Poll pacing for one test send.
#[derive(Debug, Clone, Copy)]
pub struct PollSettings {
    pub interval: Duration,
    pub timeout: Duration,
}

/// Send `input` to the test audience and report the final result snapshot.
pub async fn test(
    pool: &PgPool,
    input: &MessageInput,
    member: &Member,
    poll: PollSettings,
) -> AppResult<DeliveryResult> {
    let now = Utc::now();
    let mut test_input = input.clone();
    test_input.filter = Filter::default();
    test_input.triggers = triggers(now)
        .iter()
        .map(serde_json::to_value)
        .collect::<Result<_, _>>()
        .map_err(|e| AppError::InternalError(e.to_string()))?;
    test_input.status = None;
    test_input.demo = serde_json::Value::Null;

    let mut valid = validate_message(pool, &test_input, false, None).await?;
    let app = valid.app.clone();

    let audience = app.push_config()?.test_audience()?;
    valid.filter = audience.filter();
    CoreError::check(AudienceRepo::missing_references(pool, app.id, &valid.filter).await?)?;

    let stages = compile(&valid.filter, &valid.platforms)?;
    let mut items = Vec::new();
    let mut after = 0;
    loop {
        let page = AudienceRepo::resolve_page(pool, app.id, &stages, after, RESOLVE_BATCH).await?;
        let Some(last) = page.last() else { break };
        after = last.id;
        for user in &page {
            for (platform, token) in user.tokens.0.iter() {
                items.push(NewQueueItem {
                    app_user_id: user.id,
                    platform: *platform,
                    token: token.clone(),
                    locale: user.locale.clone(),
                });
            }
        }
        if (page.len() as i64) < RESOLVE_BATCH {
            break;
        }
    }
    if items.is_empty() {
        return Err(CoreError::validation(NO_TOKENS).into());
    }

    let lifecycle = initial_lifecycle();
    let mut info = valid.info;
    info.stamp_created(now, member.id, &member.name);
    info.app_name = Some(app.name.clone());

    let msg = MessageRepo::insert(
        pool,
        &NewMessage {
            app_id: app.id,
            platforms: valid.platforms,
            filter: valid.filter,
            triggers: valid.triggers,
            contents: valid.contents,
            info,
            state: lifecycle.state,
            status: lifecycle.status,
            is_test: true,
        },
    )
    .await?;

    tracing::info!(
        message_id = msg.id,
        app_id = app.id,
        recipients = items.len(),
        "Test message created",
    );

    let task = tokio::spawn(deliver_then_cleanup(pool.clone(), msg, items, member.clone(), poll));
    task.await
        .map_err(|e| AppError::InternalError(format!("Test send task failed: {e}")))?
}

/// Queue, watch, and always clean up.
async fn deliver_then_cleanup(
    pool: PgPool,
    msg: PushMessage,
    items: Vec<NewQueueItem>,
    member: Member,
    poll: PollSettings,
) -> AppResult<DeliveryResult> {
    let outcome = deliver(&pool, &msg, &items, poll).await;
    let cleanup = cleanup(&pool, msg.id, &member).await;

    match (outcome, cleanup) {
        (Ok(result), Ok(())) => Ok(result),
        (Ok(_), Err(e)) => Err(e),
        (Err(e), cleanup) => {
            if let Err(cleanup_err) = cleanup {
                tracing::error!(message_id = msg.id, error = %cleanup_err, "Test message cleanup failed");
            }
            Err(e)
        }
    }
}

async fn deliver(
    pool: &PgPool,
    msg: &PushMessage,
    items: &[NewQueueItem],
    poll: PollSettings,
) -> AppResult<DeliveryResult> {
    let mut totals = DeliveryResult::default();
    for item in items {
        totals.add(Some(item.platform), Counter::Total, 1);
    }
    let mut last = match MessageRepo::record_progress(pool, msg.id, msg.state, &totals).await? {
        Some(m) => m.result.0,
        None => return Err(CoreError::validation(DELIVERY_FAILED).into()),
    };

    QueueRepo::enqueue(pool, msg.id, items).await?;

    let watched = tokio::time::timeout(poll.timeout, watch(pool, msg.id, poll.interval, &mut last)).await;
    match watched {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!(
                message_id = msg.id,
                processed = last.counters.processed,
                total = last.counters.total,
                "Test send timed out, returning last snapshot",
            );
            Ok(last)
        }
    }
}

/// Poll until a stop condition holds. `last` tracks the latest snapshot.
async fn watch(
    pool: &PgPool,
    id: beacon_core::types::DbId,
    interval: Duration,
    last: &mut DeliveryResult,
) -> AppResult<DeliveryResult> {
    loop {
        tokio::time::sleep(interval).await;

        let current = MessageRepo::find_any(pool, id).await?;
        let outcome = poll_outcome(current.as_ref().map(|m| (m.state, &m.result.0)));
        if let Some(m) = &current {
            last.clone_from(&m.result.0);
        }

        match outcome {
            PollOutcome::Continue => continue,
            PollOutcome::Complete => {
                tracing::info!(message_id = id, sent = last.counters.sent, "Test send complete");
                return Ok(last.clone());
            }
            PollOutcome::Errored | PollOutcome::Gone => {
                tracing::warn!(message_id = id, ?outcome, "Test send failed");
                return Err(CoreError::validation(DELIVERY_FAILED).into());
            }
        }
    }
}

/// Soft-delete the test message, re-reading and retrying lost races.
async fn cleanup(pool: &PgPool, id: beacon_core::types::DbId, member: &Member) -> AppResult<()> {
    for attempt in 1..=CLEANUP_ATTEMPTS {
        let Some(mut msg) = MessageRepo::find_any(pool, id).await? else {
            return Ok(());
        };
        if msg.state.is_deleted() {
            return Ok(());
        }

        if msg.state.is_streamable() {
            match apply(pool, &msg, LifecycleEvent::Stop, MessageChange::default()).await? {
                Some(stopped) => msg = stopped,
                None => {
                    tracing::debug!(message_id = id, attempt, "Test message stop lost the race");
                    continue;
                }
            }
        }

        let audit = MessageChange {
            result_patch: Some(removal_patch(Utc::now(), member.id, &member.name)),
            ..MessageChange::default()
        };
        if apply(pool, &msg, LifecycleEvent::Remove, audit).await?.is_some() {
            tracing::debug!(message_id = id, "Test message removed");
            return Ok(());
        }
        tracing::debug!(message_id = id, attempt, "Test message removal lost the race");
    }

    Err(CoreError::Conflict(CLEANUP_FAILED.to_string()).into())
}

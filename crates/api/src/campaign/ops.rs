//! Create, update, remove, toggle, lookup, listing and estimation.

use std::collections::BTreeSet;

use beacon_core::audience::AudienceEstimate;
use beacon_core::error::CoreError;
use beacon_core::lifecycle::{ensure_editable, transition, LifecycleEvent, TriggerCaps};
use beacon_core::listing::ListParams;
use beacon_core::result::removal_patch;
use beacon_core::state::{MessageState, MessageStatus};
use beacon_core::trigger::{Trigger, TriggerKind};
use beacon_core::types::DbId;
use beacon_db::models::message::{MessageChange, NewMessage, PushMessage};
use beacon_db::repositories::{AudienceRepo, MessageRepo};
use chrono::Utc;
use serde::Serialize;
use sqlx::PgPool;
use validator::Validate;

use crate::campaign::input::{EstimateInput, ListQuery, MessageInput};
use crate::campaign::validate::{validate_audience, validate_message};
use crate::campaign::{apply, demo, find_message, lost_race, schedule};
use crate::error::{AppError, AppResult};
use crate::middleware::member::Member;

/// Reason given when a finished message is re-triggered with other trigger kinds.
pub const KIND_LOCKED: &str = "Trigger kinds of a finished message cannot be changed";

// ---------------------------------------------------------------------------
// Create
// ---------------------------------------------------------------------------

/// Persist a new message as a draft, or create and schedule it.
///
/// Demo messages get synthetic delivery data instead of being scheduled.
pub async fn create(pool: &PgPool, input: &MessageInput, member: &Member) -> AppResult<PushMessage> {
    let draft = input.is_draft();
    let valid = validate_message(pool, input, draft, None).await?;
    let demo_mode = valid.demo.filter(|_| !draft);

    let event = if draft {
        LifecycleEvent::CreateDraft
    } else {
        LifecycleEvent::CreateToSend
    };
    let lifecycle = transition(None, event, TriggerCaps::of(&valid.triggers))?;

    let mut info = valid.info;
    info.stamp_created(Utc::now(), member.id, &member.name);
    info.app_name = Some(valid.app.name.clone());
    info.demo = demo_mode.is_some();

    let msg = MessageRepo::insert(
        pool,
        &NewMessage {
            app_id: valid.app.id,
            platforms: valid.platforms,
            filter: valid.filter,
            triggers: valid.triggers,
            contents: valid.contents,
            info,
            state: lifecycle.state,
            status: lifecycle.status,
            is_test: false,
        },
    )
    .await?;

    tracing::info!(
        message_id = msg.id,
        app_id = msg.app_id,
        member_id = member.id,
        state = %msg.state,
        "Message created",
    );

    match demo_mode {
        Some(mode) => demo::generate(pool, &valid.app, msg, mode).await,
        None if draft => Ok(msg),
        None => schedule(pool, &msg).await,
    }
}

// ---------------------------------------------------------------------------
// Update
// ---------------------------------------------------------------------------

/// Edit a message.
///
/// A finished message is re-triggered when it has an auto or API trigger
/// and rejected otherwise; its trigger kinds stay fixed. A draft submitted without the draft status is
/// promoted and scheduled.
pub async fn update(
    pool: &PgPool,
    id: DbId,
    input: &MessageInput,
    member: &Member,
) -> AppResult<PushMessage> {
    let existing = find_message(pool, id).await?;
    ensure_editable(existing.state)?;

    let draft = input.is_draft() && existing.status == MessageStatus::Draft;
    let valid = validate_message(pool, input, draft, Some(&existing)).await?;

    let current = existing.lifecycle();
    let (next, reschedule) = if current.state.is(MessageState::DONE) {
        // A finished message keeps the trigger kinds it ran with.
        let next = transition(
            Some(current),
            LifecycleEvent::Retrigger,
            TriggerCaps::of(&existing.triggers.0),
        )?;
        if trigger_kinds(&existing.triggers.0) != trigger_kinds(&valid.triggers) {
            return Err(CoreError::validation(KIND_LOCKED).into());
        }
        (next, true)
    } else if current.status == MessageStatus::Draft && !draft {
        let caps = TriggerCaps::of(&valid.triggers);
        (transition(Some(current), LifecycleEvent::Submit, caps)?, true)
    } else {
        (current, false)
    };

    let mut info = valid.info.editable_onto(&existing.info.0);
    info.clear_rejection();
    info.stamp_updated(Utc::now(), member.id, &member.name);

    let change = MessageChange {
        state: Some(next.state),
        status: Some(next.status),
        filter: Some(valid.filter),
        triggers: Some(valid.triggers),
        contents: Some(valid.contents),
        info: Some(info),
        ..MessageChange::default()
    };
    let updated = MessageRepo::update_if_state(pool, id, existing.state, &change)
        .await?
        .ok_or_else(|| lost_race(id, "update"))?;

    tracing::info!(
        message_id = id,
        member_id = member.id,
        from = %existing.state,
        to = %updated.state,
        "Message updated",
    );

    if reschedule && !updated.info.0.demo {
        schedule(pool, &updated).await
    } else {
        Ok(updated)
    }
}

fn trigger_kinds(triggers: &[Trigger]) -> BTreeSet<TriggerKind> {
    triggers.iter().map(Trigger::kind).collect()
}

// ---------------------------------------------------------------------------
// Remove
// ---------------------------------------------------------------------------

/// Stop delivery if needed, then soft-delete with removal audit.
pub async fn remove(pool: &PgPool, id: DbId, member: &Member) -> AppResult<()> {
    let mut msg = find_message(pool, id).await?;

    if msg.state.is_streamable() {
        match apply(pool, &msg, LifecycleEvent::Stop, MessageChange::default()).await? {
            Some(stopped) => msg = stopped,
            None => {
                tracing::warn!(message_id = id, "Stop before removal lost the race");
                msg = find_message(pool, id).await?;
            }
        }
        if msg.state.is_streamable() {
            return Err(lost_race(id, "removal"));
        }
    }

    let audit = MessageChange {
        result_patch: Some(removal_patch(Utc::now(), member.id, &member.name)),
        ..MessageChange::default()
    };
    apply(pool, &msg, LifecycleEvent::Remove, audit)
        .await?
        .ok_or_else(|| {
            AppError::Core(CoreError::Conflict(
                "Message couldn't be deleted, please try again".to_string(),
            ))
        })?;

    tracing::info!(message_id = id, member_id = member.id, "Message removed");
    Ok(())
}

// ---------------------------------------------------------------------------
// Toggle
// ---------------------------------------------------------------------------

/// Start or stop an auto/API message.
pub async fn toggle(pool: &PgPool, id: DbId, active: bool, member: &Member) -> AppResult<PushMessage> {
    let msg = find_message(pool, id).await?;
    let event = if active {
        LifecycleEvent::ToggleOn
    } else {
        LifecycleEvent::ToggleOff
    };

    let updated = apply(pool, &msg, event, MessageChange::default())
        .await?
        .ok_or_else(|| lost_race(id, "toggle"))?;

    tracing::info!(
        message_id = id,
        member_id = member.id,
        active,
        state = %updated.state,
        "Message toggled",
    );
    Ok(updated)
}

// ---------------------------------------------------------------------------
// Read
// ---------------------------------------------------------------------------

pub async fn one(pool: &PgPool, id: DbId) -> AppResult<PushMessage> {
    find_message(pool, id).await
}

/// One page of messages plus totals.
#[derive(Debug, Serialize)]
pub struct MessagePage {
    pub echo: Option<String>,
    pub total_records: i64,
    pub total_display_records: i64,
    pub items: Vec<PushMessage>,
}

pub async fn all(pool: &PgPool, query: &ListQuery) -> AppResult<MessagePage> {
    query.validate()?;
    let params = ListParams::new(
        query.auto,
        query.api,
        query.search.as_deref(),
        query.offset,
        query.limit,
        query.sort.as_deref(),
        query.sort_dir.as_deref(),
    )?;

    let items = MessageRepo::list(pool, query.app_id, &params).await?;
    let total_records = MessageRepo::count(pool, query.app_id, params.kind, None).await?;
    let total_display_records = match params.search.as_deref() {
        Some(search) => MessageRepo::count(pool, query.app_id, params.kind, Some(search)).await?,
        None => total_records,
    };

    Ok(MessagePage {
        echo: query.echo.clone(),
        total_records,
        total_display_records,
        items,
    })
}

// ---------------------------------------------------------------------------
// Estimate
// ---------------------------------------------------------------------------

/// Count the audience of a filter without touching any message.
pub async fn estimate(pool: &PgPool, input: &EstimateInput) -> AppResult<AudienceEstimate> {
    input.validate()?;
    let (app, stages) = validate_audience(pool, input.app_id, &input.platforms, &input.filter).await?;

    let estimate = AudienceRepo::estimate(pool, app.id, &stages).await?;
    tracing::debug!(
        app_id = app.id,
        count = estimate.count,
        stages = ?stages.iter().map(|s| s.name()).collect::<Vec<_>>(),
        "Audience estimated",
    );
    Ok(estimate)
}

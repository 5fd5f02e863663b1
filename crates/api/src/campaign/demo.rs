//! Demo data for onboarding apps.

use beacon_core::demo::{synthesize, DemoInput, DemoMode};
use beacon_db::models::app::App;
use beacon_db::models::event::NewAppEvent;
use beacon_db::models::message::{MessageChange, PushMessage};
use beacon_db::repositories::{AppEventRepo, AppRepo, MessageRepo};
use chrono::Utc;
use sqlx::PgPool;

use crate::campaign::lost_race;
use crate::error::AppResult;

/// Mark the app's missing credentials as demo and, unless `mode` asks for
/// no data, write synthetic counters and analytics events for `msg`.
///
/// The message is never scheduled for real delivery.
pub async fn generate(
    pool: &PgPool,
    app: &App,
    msg: PushMessage,
    mode: DemoMode,
) -> AppResult<PushMessage> {
    let mut config = app.push_config()?;
    if config.mark_demo_credentials() {
        AppRepo::update_push_config(pool, app.id, &config.to_value()).await?;
        tracing::debug!(app_id = app.id, "Marked demo push credentials");
    }

    if !mode.generates_data() {
        return Ok(msg);
    }

    let user_count = u64::try_from(AppRepo::count_users(pool, app.id).await?).unwrap_or(0);
    let plan = {
        let mut rng = rand::rng();
        synthesize(
            &DemoInput {
                message_id: msg.id,
                platforms: &msg.platforms.0,
                triggers: &msg.triggers.0,
                user_count,
                mode,
                now: Utc::now(),
                utc_offset_minutes: app.utc_offset_minutes,
            },
            &mut rng,
        )?
    };

    let change = MessageChange {
        state: Some(plan.lifecycle.state),
        status: Some(plan.lifecycle.status),
        result: Some(plan.result),
        ..MessageChange::default()
    };
    let updated = MessageRepo::update_if_state(pool, msg.id, msg.state, &change)
        .await?
        .ok_or_else(|| lost_race(msg.id, "demo data"))?;

    let events: Vec<NewAppEvent> = plan
        .events
        .into_iter()
        .filter(|e| e.count > 0)
        .map(|e| NewAppEvent {
            uid: None,
            event_key: e.key.to_string(),
            segmentation: e.segmentation,
            count: i64::try_from(e.count).unwrap_or(i64::MAX),
            occurred_at: e.occurred_at,
        })
        .collect();
    let written = AppEventRepo::insert_many(pool, app.id, &events).await?;

    tracing::info!(
        message_id = msg.id,
        app_id = app.id,
        user_count,
        events = written,
        sent = updated.result.0.counters.sent,
        "Demo data generated",
    );
    Ok(updated)
}

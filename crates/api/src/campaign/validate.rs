//! Input validation shared by create, update, estimate and test.
//!
//! Shape problems are collected into one reason list. Only when the shape is
//! sound do the storage-backed checks run (app, credentials, geos, cohorts),
//! so no query is issued for a request that is already known to be invalid.

use beacon_core::audience::{compile, AudienceStage};
use beacon_core::content::{validate_contents, Content, Info};
use beacon_core::demo::DemoMode;
use beacon_core::error::CoreError;
use beacon_core::filter::Filter;
use beacon_core::platform::{same_platforms, validate_platforms, Platform};
use beacon_core::trigger::{validate_triggers, Trigger};
use beacon_core::types::DbId;
use beacon_db::models::app::App;
use beacon_db::models::message::PushMessage;
use beacon_db::repositories::{AppRepo, AudienceRepo, CredentialRepo};
use sqlx::PgPool;
use validator::Validate;

use crate::campaign::input::MessageInput;
use crate::error::{AppError, AppResult};

/// A message input that passed every check.
#[derive(Debug, Clone)]
pub struct ValidMessage {
    pub app: App,
    pub platforms: Vec<Platform>,
    pub filter: Filter,
    pub triggers: Vec<Trigger>,
    pub contents: Vec<Content>,
    pub info: Info,
    pub demo: Option<DemoMode>,
}

/// Validate a create/update/test body.
///
/// `existing` is the stored message when updating; its `app` and
/// `platforms` must not change.
pub async fn validate_message(
    pool: &PgPool,
    input: &MessageInput,
    draft: bool,
    existing: Option<&PushMessage>,
) -> AppResult<ValidMessage> {
    input.validate()?;

    let mut errors = validate_platforms(&input.platforms);

    let mut triggers = Vec::with_capacity(input.triggers.len());
    for (i, raw) in input.triggers.iter().enumerate() {
        match Trigger::from_value(raw.clone()) {
            Ok(t) => triggers.push(t),
            Err(e) => errors.extend(e.reasons().into_iter().map(|r| format!("triggers[{i}]: {r}"))),
        }
    }
    if triggers.len() == input.triggers.len() {
        errors.extend(validate_triggers(&triggers));
    }

    errors.extend(validate_contents(
        &input.contents,
        &input.platforms,
        input.info.silent,
        draft,
    ));
    errors.extend(input.info.validate());
    errors.extend(input.filter.validate());

    let demo = match DemoMode::from_value(&input.demo) {
        Ok(mode) => mode,
        Err(e) => {
            errors.extend(e.reasons());
            None
        }
    };

    if let Some(existing) = existing {
        if existing.app_id != input.app_id {
            errors.push("Message app cannot be changed".to_string());
        }
        if !same_platforms(&existing.platforms.0, &input.platforms) {
            errors.push("Message platforms cannot be changed".to_string());
        }
    }

    CoreError::check(errors)?;

    let app = find_app(pool, input.app_id).await?;

    let mut errors = Vec::new();
    if demo.is_none() && !existing.is_some_and(|m| m.info.0.demo) {
        errors.extend(check_credentials(pool, &app, &input.platforms).await?);
    }
    errors.extend(AudienceRepo::missing_references(pool, app.id, &input.filter).await?);
    CoreError::check(errors)?;

    Ok(ValidMessage {
        app,
        platforms: input.platforms.clone(),
        filter: input.filter.clone(),
        triggers,
        contents: input.contents.clone(),
        info: input.info.clone(),
        demo,
    })
}

/// Validate an estimate and compile its audience stages.
///
/// Geo and cohort existence is verified before the stages are returned, so
/// callers never count against a filter with dangling references.
pub async fn validate_audience(
    pool: &PgPool,
    app_id: DbId,
    platforms: &[Platform],
    filter: &Filter,
) -> AppResult<(App, Vec<AudienceStage>)> {
    let mut errors = validate_platforms(platforms);
    errors.extend(filter.validate());
    CoreError::check(errors)?;
    let stages = compile(filter, platforms)?;

    let app = find_app(pool, app_id).await?;

    let mut errors = check_credentials(pool, &app, platforms).await?;
    errors.extend(AudienceRepo::missing_references(pool, app.id, filter).await?);
    CoreError::check(errors)?;

    Ok((app, stages))
}

async fn find_app(pool: &PgPool, app_id: DbId) -> AppResult<App> {
    AppRepo::find_by_id(pool, app_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "App",
            id: app_id,
        }))
}

/// Reasons the app cannot deliver to `platforms`. Empty when it can.
async fn check_credentials(
    pool: &PgPool,
    app: &App,
    platforms: &[Platform],
) -> AppResult<Vec<String>> {
    let ids = match app.push_config()?.credential_ids(platforms) {
        Ok(ids) => ids,
        Err(e) => return Ok(e.reasons()),
    };

    let mut unique = ids.clone();
    unique.sort_unstable();
    unique.dedup();
    let found = CredentialRepo::count_existing(pool, &unique).await?;
    if found != unique.len() as i64 {
        return Ok(vec!["Push credentials are missing or were removed".to_string()]);
    }
    Ok(Vec::new())
}

//! End users, their push tokens, and the groups they belong to.

use std::collections::BTreeMap;

use beacon_core::platform::Platform;
use beacon_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;

/// A row from the `app_users` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct AppUser {
    pub id: DbId,
    pub app_id: DbId,
    pub uid: String,
    pub locale: Option<String>,
    pub props: serde_json::Value,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for creating an app user.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateAppUser {
    pub app_id: DbId,
    pub uid: String,
    pub locale: Option<String>,
    pub props: Option<serde_json::Value>,
}

/// A row from the `geos` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Geo {
    pub id: DbId,
    pub app_id: Option<DbId>,
    pub name: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// A row from the `cohorts` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Cohort {
    pub id: DbId,
    pub app_id: DbId,
    pub cohort_key: String,
    pub name: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// One resolved recipient: a user with their usable tokens.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct AudienceUser {
    pub id: DbId,
    pub uid: String,
    pub locale: Option<String>,
    /// Non-demo token per requested platform the user has.
    pub tokens: Json<BTreeMap<Platform, String>>,
}

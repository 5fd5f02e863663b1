//! Applications and their push credentials.

use beacon_core::app_config::AppPushConfig;
use beacon_core::error::CoreError;
use beacon_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `apps` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct App {
    pub id: DbId,
    pub name: String,
    pub utc_offset_minutes: i32,
    pub push_config: serde_json::Value,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl App {
    pub fn push_config(&self) -> Result<AppPushConfig, CoreError> {
        AppPushConfig::from_value(&self.push_config)
    }
}

/// DTO for creating an app.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateApp {
    pub name: String,
    pub utc_offset_minutes: Option<i32>,
    pub push_config: Option<serde_json::Value>,
}

/// A row from the `push_credentials` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct PushCredential {
    pub id: DbId,
    pub platform: String,
    pub settings: serde_json::Value,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

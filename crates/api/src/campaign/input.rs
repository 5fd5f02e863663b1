//! Request bodies and query strings accepted by the campaign service.

use beacon_core::content::{Content, Info};
use beacon_core::filter::Filter;
use beacon_core::platform::Platform;
use beacon_core::state::MessageStatus;
use beacon_core::types::DbId;
use serde::Deserialize;
use serde_json::Value;
use validator::Validate;

/// Body of create, update and test requests.
///
/// Triggers stay raw JSON until validation so every bad trigger is
/// reported at once instead of failing on the first.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct MessageInput {
    pub app_id: DbId,
    #[validate(length(min = 1, message = "At least one platform is required"))]
    pub platforms: Vec<Platform>,
    #[serde(default)]
    pub filter: Filter,
    #[serde(default)]
    pub triggers: Vec<Value>,
    #[serde(default)]
    pub contents: Vec<Content>,
    #[serde(default)]
    pub info: Info,
    /// `draft` keeps the message unscheduled; anything else sends it.
    #[serde(default)]
    pub status: Option<MessageStatus>,
    /// Demo flavour: `1`, `2` or `"no-data"`.
    #[serde(default)]
    pub demo: Value,
}

impl MessageInput {
    pub fn is_draft(&self) -> bool {
        self.status == Some(MessageStatus::Draft)
    }
}

/// Body of an audience estimate request.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct EstimateInput {
    pub app_id: DbId,
    #[validate(length(min = 1, message = "At least one platform is required"))]
    pub platforms: Vec<Platform>,
    #[serde(default)]
    pub filter: Filter,
}

/// Body of a toggle request.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ToggleInput {
    pub active: bool,
}

/// Query string of the message listing.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct ListQuery {
    pub app_id: DbId,
    #[serde(default)]
    pub auto: bool,
    #[serde(default)]
    pub api: bool,
    pub search: Option<String>,
    #[validate(range(min = 0, message = "Offset cannot be negative"))]
    pub offset: Option<i64>,
    #[validate(range(min = 1, max = 100, message = "Limit must be between 1 and 100"))]
    pub limit: Option<i64>,
    pub sort: Option<String>,
    pub sort_dir: Option<String>,
    pub echo: Option<String>,
}

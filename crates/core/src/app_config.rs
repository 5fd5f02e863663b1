//! Per-application push configuration stored in `apps.push_config`.
//!
//! ```json
//! {
//!   "credentials": { "i": { "credential_id": 4 }, "a": { "demo": true } },
//!   "test": { "uids": "u1,u2", "cohorts": "" }
//! }
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::filter::Filter;
use crate::platform::{Platform, ALL_PLATFORMS};
use crate::types::DbId;

pub const NO_TEST_USERS: &str = "Please define test users in Push plugin configuration";

/// Credential reference for one platform.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformCredentials {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential_id: Option<DbId>,
    /// Placeholder set by demo data generation; never usable for delivery.
    #[serde(default)]
    pub demo: bool,
}

/// Raw test audience settings. Both fields are comma-separated lists.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestAudienceConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uids: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cohorts: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppPushConfig {
    #[serde(default)]
    pub credentials: BTreeMap<Platform, PlatformCredentials>,
    #[serde(default)]
    pub test: TestAudienceConfig,
}

/// Who receives a test send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TestAudience {
    Uids(Vec<String>),
    Cohorts(Vec<String>),
}

impl TestAudience {
    pub fn filter(&self) -> Filter {
        match self {
            Self::Uids(uids) => Filter::for_uids(uids),
            Self::Cohorts(cohorts) => Filter::for_cohorts(cohorts),
        }
    }
}

fn split_list(raw: Option<&str>) -> Vec<String> {
    raw.unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

impl AppPushConfig {
    /// Parse the stored document; a null or missing document is an empty config.
    pub fn from_value(value: &serde_json::Value) -> Result<Self, CoreError> {
        if value.is_null() {
            return Ok(Self::default());
        }
        serde_json::from_value(value.clone())
            .map_err(|e| CoreError::Internal(format!("Malformed push configuration: {e}")))
    }

    pub fn to_value(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }

    /// Real credential ids for `platforms`, in order.
    ///
    /// A missing or demo placeholder credential fails with the platform title.
    pub fn credential_ids(&self, platforms: &[Platform]) -> Result<Vec<DbId>, CoreError> {
        platforms
            .iter()
            .map(|p| {
                self.credentials
                    .get(p)
                    .filter(|c| !c.demo)
                    .and_then(|c| c.credential_id)
                    .ok_or_else(|| {
                        CoreError::validation(format!(
                            "No push credentials for {} platform",
                            p.title()
                        ))
                    })
            })
            .collect()
    }

    /// Put a demo placeholder on every platform without credentials.
    ///
    /// Returns whether anything changed.
    pub fn mark_demo_credentials(&mut self) -> bool {
        let mut changed = false;
        for p in ALL_PLATFORMS {
            self.credentials.entry(p).or_insert_with(|| {
                changed = true;
                PlatformCredentials {
                    credential_id: None,
                    demo: true,
                }
            });
        }
        changed
    }

    /// Configured test audience: explicit uids first, then cohorts.
    pub fn test_audience(&self) -> Result<TestAudience, CoreError> {
        let uids = split_list(self.test.uids.as_deref());
        if !uids.is_empty() {
            return Ok(TestAudience::Uids(uids));
        }
        let cohorts = split_list(self.test.cohorts.as_deref());
        if !cohorts.is_empty() {
            return Ok(TestAudience::Cohorts(cohorts));
        }
        Err(CoreError::validation(NO_TEST_USERS))
    }
}

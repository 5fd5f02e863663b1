//! Delivery platform codes.
//!
//! Platforms are stored and transmitted as their one-letter code (`"i"`,
//! `"a"`, `"h"`), matching the keys used for per-platform push tokens,
//! credentials and result sub-counters.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// A push delivery platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Platform {
    /// Apple Push Notification service.
    #[serde(rename = "i")]
    Ios,
    /// Firebase Cloud Messaging.
    #[serde(rename = "a")]
    Android,
    /// Huawei Push Kit.
    #[serde(rename = "h")]
    Huawei,
}

/// Every supported platform, in display order.
pub const ALL_PLATFORMS: [Platform; 3] = [Platform::Ios, Platform::Android, Platform::Huawei];

impl Platform {
    /// One-letter storage code.
    pub fn code(self) -> &'static str {
        match self {
            Self::Ios => "i",
            Self::Android => "a",
            Self::Huawei => "h",
        }
    }

    /// Human-readable platform name for error messages.
    pub fn title(self) -> &'static str {
        match self {
            Self::Ios => "iOS",
            Self::Android => "Android",
            Self::Huawei => "Huawei",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Platform {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ALL_PLATFORMS
            .into_iter()
            .find(|p| p.code() == s)
            .ok_or_else(|| CoreError::validation(format!("Unknown platform '{s}'")))
    }
}

/// Validate a target platform list: non-empty and without duplicates.
pub fn validate_platforms(platforms: &[Platform]) -> Vec<String> {
    let mut errors = Vec::new();
    if platforms.is_empty() {
        errors.push("At least one platform is required".to_string());
    }
    for (i, p) in platforms.iter().enumerate() {
        if platforms[..i].contains(p) {
            errors.push(format!("Duplicate platform '{p}'"));
        }
    }
    errors
}

/// Whether two platform lists hold the same set, ignoring order.
pub fn same_platforms(a: &[Platform], b: &[Platform]) -> bool {
    a.iter().collect::<BTreeSet<_>>() == b.iter().collect::<BTreeSet<_>>()
}

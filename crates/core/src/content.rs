//! Notification payloads and message metadata.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::platform::Platform;
use crate::types::{DbId, Timestamp};

/// Maximum number of action buttons per notification.
pub const MAX_BUTTONS: usize = 2;

/// Maximum length of the message display title.
pub const MAX_TITLE_LEN: usize = 200;

// ---------------------------------------------------------------------------
// Content
// ---------------------------------------------------------------------------

/// An action button shown with the notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Button {
    pub title: String,
    pub url: String,
}

/// Notification payload, optionally scoped to one platform and/or locale.
///
/// The content with neither `p` nor `la` is the default; scoped contents
/// override its fields for their platform or locale.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub p: Option<Platform>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub la: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_mime: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sound: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub badge: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Custom key/value payload delivered with the notification.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub buttons: Vec<Button>,
}

impl Content {
    pub fn is_default(&self) -> bool {
        self.p.is_none() && self.la.is_none()
    }
}

/// Validate the content list of a message.
///
/// Non-draft, non-silent messages need a default content with a message body.
pub fn validate_contents(contents: &[Content], platforms: &[Platform], silent: bool, draft: bool) -> Vec<String> {
    let mut errors = Vec::new();

    if contents.is_empty() {
        errors.push("At least one content is required".to_string());
        return errors;
    }

    for (i, c) in contents.iter().enumerate() {
        if let Some(p) = c.p {
            if !platforms.contains(&p) {
                errors.push(format!("contents[{i}]: platform '{p}' is not targeted"));
            }
        }
        if c.la.as_deref().is_some_and(|la| la.trim().is_empty()) {
            errors.push(format!("contents[{i}]: locale cannot be empty"));
        }
        if c.buttons.len() > MAX_BUTTONS {
            errors.push(format!("contents[{i}]: at most {MAX_BUTTONS} buttons are allowed"));
        }
        if c.buttons.iter().any(|b| b.title.trim().is_empty() || b.url.trim().is_empty()) {
            errors.push(format!("contents[{i}]: buttons need a title and a url"));
        }
        if c.media.is_some() && c.media_mime.is_none() {
            errors.push(format!("contents[{i}]: media_mime is required with media"));
        }
        if c.data.as_ref().is_some_and(|d| !d.is_object()) {
            errors.push(format!("contents[{i}]: data must be a JSON object"));
        }
        if contents[..i].iter().any(|o| o.p == c.p && o.la == c.la) {
            errors.push(format!("contents[{i}]: duplicate platform/locale combination"));
        }
    }

    if !draft && !silent {
        let has_body = contents
            .iter()
            .find(|c| c.is_default())
            .and_then(|c| c.message.as_deref())
            .is_some_and(|m| !m.trim().is_empty());
        if !has_body {
            errors.push("Default content must have a message".to_string());
        }
    }

    errors
}

// ---------------------------------------------------------------------------
// Info
// ---------------------------------------------------------------------------

/// Message metadata: display fields plus create/update/reject audit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Info {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_name: Option<String>,
    #[serde(default)]
    pub silent: bool,
    /// The message was scheduled for a later time by the user.
    #[serde(default)]
    pub scheduled: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub locales: Vec<String>,
    #[serde(default)]
    pub demo: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<DbId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_by: Option<DbId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_by_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejected: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejected_at: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejected_by: Option<DbId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejected_by_name: Option<String>,
}

impl Info {
    /// Keep `existing` and take only the user-editable fields from `self`.
    pub fn editable_onto(&self, existing: &Info) -> Info {
        Info {
            title: self.title.clone(),
            silent: self.silent,
            scheduled: self.scheduled,
            locales: self.locales.clone(),
            ..existing.clone()
        }
    }

    pub fn stamp_created(&mut self, at: Timestamp, by: DbId, by_name: &str) {
        self.created = Some(at);
        self.created_by = Some(by);
        self.created_by_name = Some(by_name.to_string());
        self.stamp_updated(at, by, by_name);
    }

    pub fn stamp_updated(&mut self, at: Timestamp, by: DbId, by_name: &str) {
        self.updated = Some(at);
        self.updated_by = Some(by);
        self.updated_by_name = Some(by_name.to_string());
    }

    /// Drop a previous rejection once the message is edited.
    pub fn clear_rejection(&mut self) {
        self.rejected = None;
        self.rejected_at = None;
        self.rejected_by = None;
        self.rejected_by_name = None;
    }

    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.title.as_deref().is_some_and(|t| t.chars().count() > MAX_TITLE_LEN) {
            errors.push(format!("Title cannot exceed {MAX_TITLE_LEN} characters"));
        }
        if self.locales.iter().any(|l| l.trim().is_empty()) {
            errors.push("Locales cannot be empty".to_string());
        }
        errors
    }
}

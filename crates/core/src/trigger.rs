//! Campaign activation rules.
//!
//! A message carries an ordered list of triggers. Only two capabilities
//! matter to the rest of the system: whether a trigger is a one-shot
//! [`Trigger::Plain`] and whether it is re-triggerable
//! ([`Trigger::is_auto_or_api`]: Event, Cohort or API).

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::Timestamp;

/// Milliseconds in a day; upper bound (exclusive) for time-of-day fields.
pub const DAY_MS: i64 = 86_400_000;

/// Discriminant of a [`Trigger`], as stored in the `kind` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerKind {
    Plain,
    Api,
    Event,
    Cohort,
}

impl TriggerKind {
    /// Storage string for the kind.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Plain => "plain",
            Self::Api => "api",
            Self::Event => "event",
            Self::Cohort => "cohort",
        }
    }
}

/// One-shot send at a fixed time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlainTrigger {
    pub start: Timestamp,
    /// Deliver at `start` in each user's own timezone.
    #[serde(default)]
    pub tz: bool,
    /// Scheduler timezone offset in minutes, required when `tz` is set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sctz: Option<i32>,
    /// Resolve the audience right before sending instead of at scheduling.
    #[serde(default)]
    pub delayed: bool,
}

/// Sent whenever an external API call asks for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiTrigger {
    pub start: Timestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<Timestamp>,
}

/// Sent when a user performs one of the named events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventTrigger {
    pub start: Timestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<Timestamp>,
    pub events: Vec<String>,
    /// Use the event's own timestamp instead of arrival time.
    #[serde(default)]
    pub actuals: bool,
    /// Maximum number of messages per user.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cap: Option<u32>,
    /// Minimum pause between two messages to the same user, in ms.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sleep: Option<i64>,
    /// Fixed time of day to deliver at, in ms since midnight.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<i64>,
}

/// Sent when a user enters (or exits) one of the named cohorts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CohortTrigger {
    pub start: Timestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<Timestamp>,
    pub cohorts: Vec<String>,
    /// `true` fires on cohort entry, `false` on exit.
    #[serde(default = "default_entry")]
    pub entry: bool,
    /// Cancel pending notifications when the user leaves the cohort again.
    #[serde(default)]
    pub cancels: bool,
    #[serde(default)]
    pub actuals: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cap: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sleep: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<i64>,
}

fn default_entry() -> bool {
    true
}

/// A campaign activation rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Trigger {
    Plain(PlainTrigger),
    Api(ApiTrigger),
    Event(EventTrigger),
    Cohort(CohortTrigger),
}

impl Trigger {
    /// Parse a trigger from raw JSON. Field rules are checked by
    /// [`validate_triggers`].
    pub fn from_value(value: serde_json::Value) -> Result<Self, CoreError> {
        serde_json::from_value(value)
            .map_err(|e| CoreError::validation(format!("Invalid trigger: {e}")))
    }

    pub fn kind(&self) -> TriggerKind {
        match self {
            Self::Plain(_) => TriggerKind::Plain,
            Self::Api(_) => TriggerKind::Api,
            Self::Event(_) => TriggerKind::Event,
            Self::Cohort(_) => TriggerKind::Cohort,
        }
    }

    pub fn start(&self) -> Timestamp {
        match self {
            Self::Plain(t) => t.start,
            Self::Api(t) => t.start,
            Self::Event(t) => t.start,
            Self::Cohort(t) => t.start,
        }
    }

    fn end(&self) -> Option<Timestamp> {
        match self {
            Self::Plain(_) => None,
            Self::Api(t) => t.end,
            Self::Event(t) => t.end,
            Self::Cohort(t) => t.end,
        }
    }

    pub fn is_plain(&self) -> bool {
        matches!(self, Self::Plain(_))
    }

    /// Event or Cohort: fired automatically by user activity.
    pub fn is_auto(&self) -> bool {
        matches!(self, Self::Event(_) | Self::Cohort(_))
    }

    /// Re-triggerable kinds that support toggling and rescheduling.
    pub fn is_auto_or_api(&self) -> bool {
        matches!(self, Self::Api(_) | Self::Event(_) | Self::Cohort(_))
    }

    /// Field-level problems with this trigger. Empty when valid.
    pub fn validate(&self) -> Vec<String> {
        let kind = self.kind().as_str();
        let mut errors = Vec::new();

        if let Some(end) = self.end() {
            if end <= self.start() {
                errors.push(format!("{kind} trigger: end must be after start"));
            }
        }

        match self {
            Self::Plain(t) => {
                if t.tz && t.sctz.is_none() {
                    errors.push("plain trigger: sctz is required when tz is set".to_string());
                }
            }
            Self::Api(_) => {}
            Self::Event(t) => {
                if t.events.is_empty() || t.events.iter().any(|e| e.trim().is_empty()) {
                    errors.push("event trigger: events must be a non-empty list of keys".to_string());
                }
                check_pacing(kind, t.cap, t.sleep, t.time, &mut errors);
            }
            Self::Cohort(t) => {
                if t.cohorts.is_empty() || t.cohorts.iter().any(|c| c.trim().is_empty()) {
                    errors.push("cohort trigger: cohorts must be a non-empty list of ids".to_string());
                }
                check_pacing(kind, t.cap, t.sleep, t.time, &mut errors);
            }
        }

        errors
    }
}

fn check_pacing(
    kind: &str,
    cap: Option<u32>,
    sleep: Option<i64>,
    time: Option<i64>,
    errors: &mut Vec<String>,
) {
    if cap == Some(0) {
        errors.push(format!("{kind} trigger: cap must be positive"));
    }
    if sleep.is_some_and(|s| s < 0) {
        errors.push(format!("{kind} trigger: sleep cannot be negative"));
    }
    if time.is_some_and(|t| !(0..DAY_MS).contains(&t)) {
        errors.push(format!("{kind} trigger: time must be within a day"));
    }
}

/// Validate a message's trigger list: non-empty, every trigger valid.
pub fn validate_triggers(triggers: &[Trigger]) -> Vec<String> {
    if triggers.is_empty() {
        return vec!["At least one trigger is required".to_string()];
    }
    triggers.iter().flat_map(Trigger::validate).collect()
}

/// The first plain trigger, if any.
pub fn trigger_plain(triggers: &[Trigger]) -> Option<&PlainTrigger> {
    triggers.iter().find_map(|t| match t {
        Trigger::Plain(p) => Some(p),
        _ => None,
    })
}

/// The first Event, Cohort or API trigger, if any.
pub fn trigger_auto_or_api(triggers: &[Trigger]) -> Option<&Trigger> {
    triggers.iter().find(|t| t.is_auto_or_api())
}

/// The first Event or Cohort trigger, if any.
pub fn trigger_auto(triggers: &[Trigger]) -> Option<&Trigger> {
    triggers.iter().find(|t| t.is_auto())
}

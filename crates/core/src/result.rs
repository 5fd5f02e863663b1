//! Delivery result counters.
//!
//! A pure counter tree: root counters plus one sub-counter set per platform,
//! created lazily on first write. Every platform increment also increments
//! the root, so per-platform sums never exceed the root totals.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::platform::Platform;
use crate::types::{DbId, Timestamp};

/// A single counter field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Counter {
    Total,
    Processed,
    Sent,
    Actioned,
}

/// The four delivery counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counters {
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub processed: u64,
    #[serde(default)]
    pub sent: u64,
    #[serde(default)]
    pub actioned: u64,
}

impl Counters {
    pub fn get(&self, counter: Counter) -> u64 {
        match counter {
            Counter::Total => self.total,
            Counter::Processed => self.processed,
            Counter::Sent => self.sent,
            Counter::Actioned => self.actioned,
        }
    }

    fn slot(&mut self, counter: Counter) -> &mut u64 {
        match counter {
            Counter::Total => &mut self.total,
            Counter::Processed => &mut self.processed,
            Counter::Sent => &mut self.sent,
            Counter::Actioned => &mut self.actioned,
        }
    }

    fn absorb(&mut self, other: &Counters) {
        self.total += other.total;
        self.processed += other.processed;
        self.sent += other.sent;
        self.actioned += other.actioned;
    }
}

/// Result snapshot of a message: counters plus removal audit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeliveryResult {
    #[serde(flatten)]
    pub counters: Counters,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub removed: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub removed_by: Option<DbId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub removed_by_name: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    subs: BTreeMap<Platform, Counters>,
}

impl DeliveryResult {
    /// Add `delta` to a root counter and, when given, to the platform's
    /// sub-counter (created at zero if unseen).
    pub fn add(&mut self, platform: Option<Platform>, counter: Counter, delta: u64) {
        *self.counters.slot(counter) += delta;
        if let Some(p) = platform {
            *self.subs.entry(p).or_default().slot(counter) += delta;
        }
    }

    /// Add every counter of `other` to this result, sub-counters included.
    ///
    /// Removal audit is kept from `self` when present.
    pub fn merge(&mut self, other: &DeliveryResult) {
        self.counters.absorb(&other.counters);
        for (p, counters) in &other.subs {
            self.subs.entry(*p).or_default().absorb(counters);
        }
        if self.removed.is_none() {
            self.removed = other.removed;
            self.removed_by = other.removed_by;
            self.removed_by_name.clone_from(&other.removed_by_name);
        }
    }

    /// Sub-counters of one platform, if it was ever written.
    pub fn sub(&self, platform: Platform) -> Option<&Counters> {
        self.subs.get(&platform)
    }

    pub fn subs(&self) -> impl Iterator<Item = (Platform, &Counters)> {
        self.subs.iter().map(|(p, c)| (*p, c))
    }

    /// Every resolved recipient has been processed.
    pub fn is_complete(&self) -> bool {
        self.counters.processed >= self.counters.total
    }

    /// Per-platform sums never exceed the matching root counter.
    pub fn subs_within_root(&self) -> bool {
        [Counter::Total, Counter::Processed, Counter::Sent, Counter::Actioned]
            .into_iter()
            .all(|c| self.subs.values().map(|s| s.get(c)).sum::<u64>() <= self.counters.get(c))
    }

    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// JSON patch setting removal audit fields on a stored result document.
pub fn removal_patch(at: Timestamp, by: DbId, by_name: &str) -> Value {
    json!({
        "removed": at,
        "removed_by": by,
        "removed_by_name": by_name,
    })
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    #[test]
    fn add_to_unseen_platform_creates_sub_counter() {
        let mut r = DeliveryResult::default();
        assert!(r.sub(Platform::Ios).is_none());
        r.add(Some(Platform::Ios), Counter::Sent, 3);
        assert_eq!(r.sub(Platform::Ios).unwrap().sent, 3);
        assert_eq!(r.sub(Platform::Ios).unwrap().total, 0);
        assert_eq!(r.counters.sent, 3);
    }

    #[test]
    fn root_only_add_leaves_subs_untouched() {
        let mut r = DeliveryResult::default();
        r.add(None, Counter::Total, 5);
        assert_eq!(r.counters.total, 5);
        assert_eq!(r.subs().count(), 0);
    }

    #[test]
    fn subs_never_exceed_root_for_any_add_sequence() {
        let mut r = DeliveryResult::default();
        let seq = [
            (Some(Platform::Ios), Counter::Total, 10),
            (Some(Platform::Android), Counter::Total, 4),
            (None, Counter::Total, 2),
            (Some(Platform::Ios), Counter::Processed, 7),
            (Some(Platform::Android), Counter::Sent, 3),
            (Some(Platform::Huawei), Counter::Actioned, 1),
        ];
        for (p, c, d) in seq {
            r.add(p, c, d);
            assert!(r.subs_within_root());
        }
        assert_eq!(r.counters.total, 16);
    }

    #[test]
    fn merge_is_additive() {
        let mut a = DeliveryResult::default();
        a.add(Some(Platform::Ios), Counter::Total, 2);
        let mut b = DeliveryResult::default();
        b.add(Some(Platform::Ios), Counter::Total, 3);
        b.add(Some(Platform::Android), Counter::Sent, 1);

        a.merge(&b);
        assert_eq!(a.counters.total, 5);
        assert_eq!(a.sub(Platform::Ios).unwrap().total, 5);
        assert_eq!(a.sub(Platform::Android).unwrap().sent, 1);
        assert!(a.subs_within_root());
    }

    #[test]
    fn json_round_trip_preserves_state() {
        let mut r = DeliveryResult::default();
        r.add(Some(Platform::Ios), Counter::Total, 2);
        r.add(Some(Platform::Android), Counter::Actioned, 1);
        r.removed = Some(Utc::now());
        r.removed_by = Some(4);
        r.removed_by_name = Some("Ann".into());

        let json = r.to_json();
        assert_eq!(json["total"], 2);
        assert_eq!(json["subs"]["i"]["total"], 2);
        let back: DeliveryResult = serde_json::from_value(json).unwrap();
        assert_eq!(back, r);
    }

    #[test]
    fn empty_json_object_deserializes_to_zero() {
        let r: DeliveryResult = serde_json::from_value(json!({})).unwrap();
        assert_eq!(r, DeliveryResult::default());
    }

    #[test]
    fn completion_tracks_processed_vs_total() {
        let mut r = DeliveryResult::default();
        r.add(None, Counter::Total, 2);
        assert!(!r.is_complete());
        r.add(None, Counter::Processed, 2);
        assert!(r.is_complete());
    }

    #[test]
    fn removal_patch_uses_stored_field_names() {
        let patch = removal_patch(Utc::now(), 3, "Ann");
        assert_eq!(patch["removed_by"], 3);
        assert_eq!(patch["removed_by_name"], "Ann");
        assert!(patch["removed"].is_string());
    }
}

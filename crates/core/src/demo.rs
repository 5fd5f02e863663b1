//! Synthetic delivery data for demo apps.
//!
//! Produces counters and analytics events that look like a real campaign
//! history, scaled to the app's user count. Demo messages never go through
//! real delivery, so the generated result is written once and left alone.

use chrono::Duration;
use rand::Rng;
use serde_json::{json, Value};

use crate::error::CoreError;
use crate::lifecycle::Lifecycle;
use crate::platform::Platform;
use crate::result::{Counter, DeliveryResult};
use crate::state::{MessageState, MessageStatus};
use crate::trigger::Trigger;
use crate::types::{DbId, Timestamp};

pub const SENT_EVENT: &str = "[CLY]_push_sent";
pub const ACTION_EVENT: &str = "[CLY]_push_action";

/// Days of history spread over for auto/API demo messages.
const HISTORY_DAYS: i64 = 19;

/// Demo flavour requested on create.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DemoMode {
    /// `1`: higher delivery and action rates.
    Primary,
    /// `2`: lower action rate, every targeted user reached.
    Secondary,
    /// Mark the message as demo without generating data.
    NoData,
}

impl DemoMode {
    /// Parse the `demo` request field. Absent, `false` and `0` mean no demo.
    pub fn from_value(value: &Value) -> Result<Option<Self>, CoreError> {
        match value {
            Value::Null | Value::Bool(false) => Ok(None),
            Value::Bool(true) => Ok(Some(Self::Primary)),
            Value::Number(n) => match n.as_i64() {
                Some(0) => Ok(None),
                Some(1) => Ok(Some(Self::Primary)),
                Some(2) => Ok(Some(Self::Secondary)),
                _ => Err(CoreError::validation(format!("Invalid demo mode {n}"))),
            },
            Value::String(s) => match s.as_str() {
                "" | "0" | "false" => Ok(None),
                "1" | "true" => Ok(Some(Self::Primary)),
                "2" => Ok(Some(Self::Secondary)),
                "no-data" => Ok(Some(Self::NoData)),
                other => Err(CoreError::validation(format!("Invalid demo mode '{other}'"))),
            },
            other => Err(CoreError::validation(format!("Invalid demo mode {other}"))),
        }
    }

    pub fn generates_data(self) -> bool {
        self != Self::NoData
    }
}

/// One synthetic analytics event.
#[derive(Debug, Clone, PartialEq)]
pub struct DemoEvent {
    pub key: &'static str,
    pub count: u64,
    pub occurred_at: Timestamp,
    pub segmentation: Value,
}

/// Everything needed to synthesize demo data for one message.
#[derive(Debug, Clone)]
pub struct DemoInput<'a> {
    pub message_id: DbId,
    pub platforms: &'a [Platform],
    pub triggers: &'a [Trigger],
    pub user_count: u64,
    pub mode: DemoMode,
    pub now: Timestamp,
    /// App timezone offset from UTC.
    pub utc_offset_minutes: i32,
}

/// Generated lifecycle, counters and events.
#[derive(Debug, Clone, PartialEq)]
pub struct DemoPlan {
    pub lifecycle: Lifecycle,
    pub result: DeliveryResult,
    pub events: Vec<DemoEvent>,
}

fn share(n: u64, ratio: f64) -> u64 {
    (n as f64 * ratio).floor() as u64
}

/// Accumulates counters and matching events per platform.
struct Recorder {
    message_id: DbId,
    auto: bool,
    result: DeliveryResult,
    events: Vec<DemoEvent>,
}

impl Recorder {
    fn segmentation(&self, platform: Platform, button: Option<u8>) -> Value {
        let (a, t) = (self.auto, !self.auto);
        let mut seg = json!({
            "i": self.message_id,
            "a": a,
            "t": t,
            "p": platform.code(),
            "ap": format!("{a}{}", platform.code()),
            "tp": format!("{t}{}", platform.code()),
        });
        if let Some(b) = button {
            seg["b"] = json!(b);
        }
        seg
    }

    fn sent(&mut self, platform: Platform, count: u64, at: Timestamp) {
        if count == 0 {
            return;
        }
        for counter in [Counter::Total, Counter::Processed, Counter::Sent] {
            self.result.add(Some(platform), counter, count);
        }
        self.events.push(DemoEvent {
            key: SENT_EVENT,
            count,
            occurred_at: at,
            segmentation: self.segmentation(platform, None),
        });
    }

    fn actioned(&mut self, platform: Platform, count: u64, at: Timestamp, button: Option<u8>) {
        if count == 0 {
            return;
        }
        self.result.add(Some(platform), Counter::Actioned, count);
        self.events.push(DemoEvent {
            key: ACTION_EVENT,
            count,
            occurred_at: at,
            segmentation: self.segmentation(platform, button),
        });
    }
}

/// Build demo data for a message.
///
/// Auto/API messages get a 19-day history and end up streaming; plain
/// messages get a single finished send split across the first two platforms.
pub fn synthesize<R: Rng>(input: &DemoInput<'_>, rng: &mut R) -> Result<DemoPlan, CoreError> {
    let Some(&p) = input.platforms.first() else {
        return Err(CoreError::validation("At least one platform is required"));
    };
    let p1 = input.platforms.get(1).copied();

    let auto_or_api = input.triggers.iter().any(Trigger::is_auto_or_api);
    let mut rec = Recorder {
        message_id: input.message_id,
        auto: input.triggers.iter().any(Trigger::is_auto),
        result: DeliveryResult::default(),
        events: Vec::new(),
    };

    let lifecycle = if auto_or_api {
        let offset = Duration::minutes(i64::from(input.utc_offset_minutes));
        let now = input.now - Duration::hours(1);

        let total = share(input.user_count, 0.72);
        let mut sent = share(total, 0.92);
        let mut actioned = share(sent, 0.17);

        for i in 0..HISTORY_DAYS {
            let date = now - Duration::days(i + 1) - offset;
            let left = (HISTORY_DAYS - i) as f64;
            let es = share(sent, (rng.random::<f64>() + 0.5) / left).min(sent);
            let ea = share(actioned, (rng.random::<f64>() + 0.5) / left)
                .min(es / 2)
                .min(actioned);
            sent -= es;
            actioned -= ea;

            let (es0, es1) = (es * 2 / 3, es - es * 2 / 3);
            match p1 {
                Some(p1) if es0 > 0 && es1 > 0 => {
                    rec.sent(p, es0, date);
                    rec.sent(p1, es1, date);
                }
                _ => rec.sent(p, es, date),
            }

            let (ea0, ea1) = (ea * 2 / 3, ea - ea * 2 / 3);
            match p1 {
                Some(p1) if ea0 > 0 && ea1 > 0 => {
                    rec.actioned(p, ea0, date, Some(1));
                    rec.actioned(p1, ea1, date, Some(1));
                }
                _ => rec.actioned(p, ea, date, Some(1)),
            }
        }

        let yesterday = now - Duration::days(1) - offset;
        let (st, at) = (sent / 3, actioned / 3);
        rec.sent(p, st, yesterday);
        rec.actioned(p, at, yesterday, None);

        rec.sent(p, sent - st, now - offset);
        rec.actioned(p, actioned - at, now - offset, None);

        Lifecycle::new(
            MessageState::CREATED.with(MessageState::STREAMABLE),
            MessageStatus::Scheduled,
        )
    } else {
        let (sent, actioned) = match input.mode {
            DemoMode::Secondary => {
                let total = share(share(input.user_count, 0.92), 0.87);
                (total, share(total, 0.21))
            }
            _ => {
                let total = share(input.user_count, 0.92);
                let sent = share(total, 0.87);
                (sent, share(sent, 0.38))
            }
        };

        let s_p0 = sent / 3;
        let a_p0 = actioned / 3;
        let splits = [(p, s_p0, a_p0), (p1.unwrap_or(p), sent - s_p0, actioned - a_p0)];

        for (platform, s, a) in splits {
            let b0 = a * 2 / 3;
            let b1 = (a - b0) * 2 / 3;
            let b2 = a - b0 - b1;
            rec.sent(platform, s, input.now);
            rec.actioned(platform, b0, input.now, Some(0));
            rec.actioned(platform, b1, input.now, Some(1));
            rec.actioned(platform, b2, input.now, Some(2));
        }

        Lifecycle::new(
            MessageState::CREATED.with(MessageState::DONE),
            MessageStatus::Sent,
        )
    };

    Ok(DemoPlan {
        lifecycle,
        result: rec.result,
        events: rec.events,
    })
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;
    use crate::trigger::{EventTrigger, PlainTrigger};

    fn plain() -> Vec<Trigger> {
        vec![Trigger::Plain(PlainTrigger {
            start: Utc::now(),
            tz: false,
            sctz: None,
            delayed: false,
        })]
    }

    fn event() -> Vec<Trigger> {
        vec![Trigger::Event(EventTrigger {
            start: Utc::now(),
            end: None,
            events: vec!["purchase".into()],
            actuals: false,
            cap: None,
            sleep: None,
            time: None,
        })]
    }

    fn run(platforms: &[Platform], triggers: &[Trigger], users: u64, mode: DemoMode, seed: u64) -> DemoPlan {
        let input = DemoInput {
            message_id: 7,
            platforms,
            triggers,
            user_count: users,
            mode,
            now: Utc::now(),
            utc_offset_minutes: 120,
        };
        synthesize(&input, &mut StdRng::seed_from_u64(seed)).unwrap()
    }

    fn event_sum(plan: &DemoPlan, key: &str) -> u64 {
        plan.events.iter().filter(|e| e.key == key).map(|e| e.count).sum()
    }

    #[test]
    fn mode_parsing() {
        assert_eq!(DemoMode::from_value(&Value::Null).unwrap(), None);
        assert_eq!(DemoMode::from_value(&json!(0)).unwrap(), None);
        assert_eq!(DemoMode::from_value(&json!(1)).unwrap(), Some(DemoMode::Primary));
        assert_eq!(DemoMode::from_value(&json!("2")).unwrap(), Some(DemoMode::Secondary));
        assert_eq!(DemoMode::from_value(&json!("no-data")).unwrap(), Some(DemoMode::NoData));
        assert!(DemoMode::from_value(&json!(5)).is_err());
        assert!(!DemoMode::NoData.generates_data());
    }

    #[test]
    fn plain_primary_counters() {
        let plan = run(&[Platform::Ios, Platform::Android], &plain(), 100, DemoMode::Primary, 1);
        assert_eq!(
            plan.lifecycle,
            Lifecycle::new(MessageState::CREATED.with(MessageState::DONE), MessageStatus::Sent)
        );
        assert_eq!(plan.result.counters.sent, 80);
        assert_eq!(plan.result.counters.total, 80);
        assert_eq!(plan.result.counters.actioned, 30);
        assert_eq!(plan.result.sub(Platform::Ios).unwrap().sent, 26);
        assert_eq!(plan.result.sub(Platform::Android).unwrap().sent, 54);
        assert!(plan.result.subs_within_root());
    }

    #[test]
    fn plain_secondary_counters() {
        let plan = run(&[Platform::Ios, Platform::Android], &plain(), 100, DemoMode::Secondary, 1);
        assert_eq!(plan.result.counters.sent, 80);
        assert_eq!(plan.result.counters.actioned, 16);
    }

    #[test]
    fn single_platform_gets_everything() {
        let plan = run(&[Platform::Android], &plain(), 100, DemoMode::Primary, 1);
        assert_eq!(plan.result.sub(Platform::Android).unwrap().sent, 80);
        assert!(plan.result.sub(Platform::Ios).is_none());
    }

    #[test]
    fn auto_distributes_full_budget() {
        for seed in 0..20 {
            let plan = run(&[Platform::Ios, Platform::Android], &event(), 1000, DemoMode::Primary, seed);
            assert!(plan.lifecycle.state.is_streamable());
            assert_eq!(plan.lifecycle.status, MessageStatus::Scheduled);
            assert_eq!(plan.result.counters.sent, share(share(1000, 0.72), 0.92));
            assert_eq!(plan.result.counters.total, plan.result.counters.sent);
            assert_eq!(plan.result.counters.processed, plan.result.counters.sent);
            assert!(plan.result.counters.actioned <= share(plan.result.counters.sent, 0.17));
            assert!(plan.result.subs_within_root());
        }
    }

    #[test]
    fn events_mirror_counters() {
        for (triggers, seed) in [(plain(), 3), (event(), 4)] {
            let plan = run(&[Platform::Ios, Platform::Huawei], &triggers, 500, DemoMode::Primary, seed);
            assert_eq!(event_sum(&plan, SENT_EVENT), plan.result.counters.sent);
            assert_eq!(event_sum(&plan, ACTION_EVENT), plan.result.counters.actioned);
            assert!(plan.events.iter().all(|e| e.count > 0));
            assert!(plan.events.iter().all(|e| e.segmentation["i"] == 7));
        }
    }

    #[test]
    fn auto_history_is_in_the_past() {
        let now = Utc::now();
        let plan = run(&[Platform::Ios], &event(), 1000, DemoMode::Primary, 9);
        assert!(plan.events.iter().all(|e| e.occurred_at < now));
    }

    #[test]
    fn zero_users_produce_no_events() {
        let plan = run(&[Platform::Ios], &event(), 0, DemoMode::Primary, 1);
        assert!(plan.events.is_empty());
        assert_eq!(plan.result, DeliveryResult::default());
    }

    #[test]
    fn no_platforms_is_rejected() {
        let input = DemoInput {
            message_id: 1,
            platforms: &[],
            triggers: &plain(),
            user_count: 10,
            mode: DemoMode::Primary,
            now: Utc::now(),
            utc_offset_minutes: 0,
        };
        assert!(synthesize(&input, &mut StdRng::seed_from_u64(0)).is_err());
    }
}

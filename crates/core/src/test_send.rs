//! Rules for the throwaway test send.
//!
//! A test message is created already streaming, with a single plain trigger
//! starting now. The caller then polls it until one of the stop conditions in
//! [`poll_outcome`] holds or the ceiling elapses, and always soft-deletes it
//! afterwards.

use std::time::Duration;

use crate::lifecycle::Lifecycle;
use crate::result::DeliveryResult;
use crate::state::{MessageState, MessageStatus};
use crate::trigger::{PlainTrigger, Trigger};
use crate::types::Timestamp;

/// Pause between two progress checks.
pub const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Hard ceiling on how long a test send is watched.
pub const POLL_TIMEOUT: Duration = Duration::from_secs(90);

pub const NO_TOKENS: &str = "No users with push tokens found in test users";
pub const DELIVERY_FAILED: &str = "Failed to send test message";
pub const CLEANUP_FAILED: &str = "Message couldn't be deleted";

/// What the poll loop should do after looking at the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    Continue,
    /// Every resolved recipient was processed.
    Complete,
    /// The delivery worker flagged the message as failed.
    Errored,
    /// The message disappeared (deleted concurrently).
    Gone,
}

/// Decide the next poll step from the latest stored snapshot.
pub fn poll_outcome(snapshot: Option<(MessageState, &DeliveryResult)>) -> PollOutcome {
    match snapshot {
        None => PollOutcome::Gone,
        Some((state, _)) if state.is_deleted() => PollOutcome::Gone,
        Some((state, _)) if state.is(MessageState::ERROR) => PollOutcome::Errored,
        Some((_, result)) if result.counters.processed >= result.counters.total => PollOutcome::Complete,
        Some(_) => PollOutcome::Continue,
    }
}

/// Lifecycle a test message is created with.
pub const fn initial_lifecycle() -> Lifecycle {
    Lifecycle::new(
        MessageState::CREATED.with(MessageState::STREAMABLE),
        MessageStatus::Scheduled,
    )
}

/// The single immediate plain trigger of a test message.
pub fn triggers(now: Timestamp) -> Vec<Trigger> {
    vec![Trigger::Plain(PlainTrigger {
        start: now,
        tz: false,
        sctz: None,
        delayed: false,
    })]
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::result::Counter;

    fn result(total: u64, processed: u64) -> DeliveryResult {
        let mut r = DeliveryResult::default();
        r.add(None, Counter::Total, total);
        r.add(None, Counter::Processed, processed);
        r
    }

    const STREAMING: MessageState = MessageState::CREATED.with(MessageState::STREAMABLE);

    #[test]
    fn missing_message_is_gone() {
        assert_eq!(poll_outcome(None), PollOutcome::Gone);
    }

    #[test]
    fn deleted_message_is_gone() {
        let r = result(2, 0);
        let state = STREAMING.with(MessageState::DELETED);
        assert_eq!(poll_outcome(Some((state, &r))), PollOutcome::Gone);
    }

    #[test]
    fn error_bit_stops_polling() {
        let r = result(2, 1);
        let state = MessageState::CREATED.with(MessageState::ERROR);
        assert_eq!(poll_outcome(Some((state, &r))), PollOutcome::Errored);
    }

    #[test]
    fn processed_equal_total_completes() {
        let r = result(3, 3);
        assert_eq!(poll_outcome(Some((STREAMING, &r))), PollOutcome::Complete);
    }

    #[test]
    fn in_progress_continues() {
        let r = result(3, 1);
        assert_eq!(poll_outcome(Some((STREAMING, &r))), PollOutcome::Continue);
    }

    #[test]
    fn test_message_starts_streaming_with_plain_trigger() {
        let l = initial_lifecycle();
        assert!(l.state.is_streamable());
        assert_eq!(l.status, MessageStatus::Scheduled);

        let now = Utc::now();
        let t = triggers(now);
        assert_eq!(t.len(), 1);
        assert!(t[0].is_plain());
        assert_eq!(t[0].start(), now);
    }
}

//! Message state machine.
//!
//! Every legal `(state, status)` change lives in [`transition`]. Service
//! operations compute the target here and then persist it with a conditional
//! write keyed on the state they observed, so the table below is both the
//! documentation and the single point of enforcement.
//!
//! ```text
//! (new)              CreateDraft   -> Inactive / Draft
//! (new)              CreateToSend  -> Created / Created
//! Draft              Submit        -> Created / Created
//! Created            Schedule      -> +Streamable / Scheduled
//! Created|Streamable Stop          -> -Streamable / Created
//! Created|*          ToggleOn      -> +Streamable / Scheduled   (auto/API only)
//! Created|Streamable ToggleOff     -> -Streamable / Created     (auto/API only)
//! Created|Done       Retrigger     -> Created / Created         (auto/API only)
//! not Streamable     Remove        -> +Deleted
//! Streamable         Finish        -> -Streamable +Done         (delivery worker)
//! Streamable         Fail          -> -Streamable +Error        (delivery worker)
//! ```

use crate::error::CoreError;
use crate::state::{MessageState, MessageStatus};
use crate::trigger::Trigger;

/// A message's persisted lifecycle fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lifecycle {
    pub state: MessageState,
    pub status: MessageStatus,
}

impl Lifecycle {
    pub const fn new(state: MessageState, status: MessageStatus) -> Self {
        Self { state, status }
    }
}

/// Something that wants to move a message through its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    CreateDraft,
    CreateToSend,
    Submit,
    Schedule,
    Stop,
    ToggleOn,
    ToggleOff,
    Retrigger,
    Remove,
    Finish,
    Fail,
}

/// Trigger capabilities that gate lifecycle decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TriggerCaps {
    pub plain: bool,
    pub auto_or_api: bool,
}

impl TriggerCaps {
    pub fn of(triggers: &[Trigger]) -> Self {
        Self {
            plain: triggers.iter().any(Trigger::is_plain),
            auto_or_api: triggers.iter().any(Trigger::is_auto_or_api),
        }
    }
}

fn reject(reason: &str) -> CoreError {
    CoreError::validation(reason)
}

/// Compute the lifecycle after `event`, or explain why it is not allowed.
///
/// `current` is `None` only for the two creation events.
pub fn transition(
    current: Option<Lifecycle>,
    event: LifecycleEvent,
    caps: TriggerCaps,
) -> Result<Lifecycle, CoreError> {
    use LifecycleEvent::*;

    let Some(current) = current else {
        return match event {
            CreateDraft => Ok(Lifecycle::new(MessageState::INACTIVE, MessageStatus::Draft)),
            CreateToSend => Ok(Lifecycle::new(MessageState::CREATED, MessageStatus::Created)),
            _ => Err(CoreError::Internal(format!("{event:?} requires an existing message"))),
        };
    };

    let state = current.state;
    if state.is_deleted() {
        return Err(reject("Message is deleted"));
    }

    match event {
        CreateDraft | CreateToSend => Err(CoreError::Internal("Message already exists".to_string())),

        Submit => {
            if current.status != MessageStatus::Draft {
                return Err(reject("Only draft messages can be submitted"));
            }
            Ok(Lifecycle::new(MessageState::CREATED, MessageStatus::Created))
        }

        Schedule => {
            if !state.is(MessageState::CREATED) {
                return Err(reject("Draft messages cannot be scheduled"));
            }
            if state.is_streamable() {
                return Err(reject("The message is already scheduled"));
            }
            if state.is(MessageState::DONE) && !caps.auto_or_api {
                return Err(reject("Finished plain messages cannot be changed"));
            }
            Ok(Lifecycle::new(
                state.with(MessageState::STREAMABLE),
                MessageStatus::Scheduled,
            ))
        }

        Stop => {
            if !state.is_streamable() {
                return Err(reject("The message is already stopped"));
            }
            Ok(Lifecycle::new(
                state.without(MessageState::STREAMABLE),
                MessageStatus::Created,
            ))
        }

        ToggleOn => {
            if !caps.auto_or_api {
                return Err(reject("The message doesn't have Cohort or Event trigger"));
            }
            if state.is_streamable() {
                return Err(reject("The message is already active"));
            }
            if !state.is(MessageState::CREATED) {
                return Err(reject("Draft messages cannot be started"));
            }
            Ok(Lifecycle::new(
                state.with(MessageState::STREAMABLE),
                MessageStatus::Scheduled,
            ))
        }

        ToggleOff => {
            if !caps.auto_or_api {
                return Err(reject("The message doesn't have Cohort or Event trigger"));
            }
            transition(Some(current), Stop, caps)
        }

        Retrigger => {
            if !state.is(MessageState::DONE) {
                return Err(reject("Only finished messages can be re-triggered"));
            }
            if caps.auto_or_api {
                Ok(Lifecycle::new(MessageState::CREATED, MessageStatus::Created))
            } else if caps.plain {
                Err(reject("Finished plain messages cannot be changed"))
            } else {
                Err(reject("Wrong trigger kind"))
            }
        }

        Remove => {
            if state.is_streamable() {
                return Err(reject("The message must be stopped before removal"));
            }
            Ok(Lifecycle::new(state.with(MessageState::DELETED), current.status))
        }

        Finish => {
            if !state.is_streamable() {
                return Err(reject("Only streaming messages can finish"));
            }
            Ok(Lifecycle::new(
                state.without(MessageState::STREAMABLE).with(MessageState::DONE),
                current.status,
            ))
        }

        Fail => Ok(Lifecycle::new(
            state.without(MessageState::STREAMABLE).with(MessageState::ERROR),
            current.status,
        )),
    }
}

/// Reject any edit of a soft-deleted message.
pub fn ensure_editable(state: MessageState) -> Result<(), CoreError> {
    if state.is_deleted() {
        Err(reject("Deleted messages cannot be changed"))
    } else {
        Ok(())
    }
}

//! Message lifecycle flags and the user-facing status label.
//!
//! `state` is a composable bitmask written by both the API and the delivery
//! worker; `status` is a mutually exclusive label only the API advances.
//! The two are stored independently (`INTEGER` and `TEXT` columns).

use std::fmt;
use std::ops::{BitAnd, BitOr, Not};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Bitmask of lifecycle flags. `0` is a draft that was never scheduled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "i32")]
pub struct MessageState(i32);

impl MessageState {
    pub const INACTIVE: Self = Self(0);
    pub const CREATED: Self = Self(1);
    pub const STREAMABLE: Self = Self(1 << 1);
    pub const DONE: Self = Self(1 << 2);
    pub const ERROR: Self = Self(1 << 3);
    pub const DELETED: Self = Self(1 << 4);

    const ALL: i32 = 0b1_1111;

    pub const fn bits(self) -> i32 {
        self.0
    }

    /// Whether every flag of `flags` is set.
    pub const fn is(self, flags: Self) -> bool {
        self.0 & flags.0 == flags.0
    }

    pub const fn is_deleted(self) -> bool {
        self.is(Self::DELETED)
    }

    pub const fn is_streamable(self) -> bool {
        self.is(Self::STREAMABLE)
    }

    pub const fn with(self, flags: Self) -> Self {
        Self(self.0 | flags.0)
    }

    pub const fn without(self, flags: Self) -> Self {
        Self(self.0 & !flags.0)
    }
}

impl From<MessageState> for i32 {
    fn from(value: MessageState) -> Self {
        value.0
    }
}

impl TryFrom<i32> for MessageState {
    type Error = CoreError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        if value & !Self::ALL != 0 || value < 0 {
            return Err(CoreError::Internal(format!("Unknown message state bits {value:#b}")));
        }
        Ok(Self(value))
    }
}

impl BitOr for MessageState {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.with(rhs)
    }
}

impl BitAnd for MessageState {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

impl Not for MessageState {
    type Output = Self;

    fn not(self) -> Self {
        Self(!self.0 & Self::ALL)
    }
}

impl fmt::Display for MessageState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 == 0 {
            return f.write_str("Inactive");
        }
        let names = [
            (Self::CREATED, "Created"),
            (Self::STREAMABLE, "Streamable"),
            (Self::DONE, "Done"),
            (Self::ERROR, "Error"),
            (Self::DELETED, "Deleted"),
        ];
        let set: Vec<&str> = names
            .iter()
            .filter(|(flag, _)| self.is(*flag))
            .map(|(_, name)| *name)
            .collect();
        f.write_str(&set.join("|"))
    }
}

/// User-facing message status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    Draft,
    Created,
    Scheduled,
    Sent,
}

impl MessageStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Created => "created",
            Self::Scheduled => "scheduled",
            Self::Sent => "sent",
        }
    }
}

impl fmt::Display for MessageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(Self::Draft),
            "created" => Ok(Self::Created),
            "scheduled" => Ok(Self::Scheduled),
            "sent" => Ok(Self::Sent),
            other => Err(CoreError::validation(format!("Unknown message status '{other}'"))),
        }
    }
}

impl TryFrom<String> for MessageStatus {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

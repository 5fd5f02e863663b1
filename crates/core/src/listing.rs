//! Message listing rules: kind filter, sort whitelist, paging bounds.

use std::str::FromStr;

use serde::Deserialize;

use crate::error::CoreError;
use crate::trigger::{Trigger, TriggerKind};
use crate::types::Timestamp;

/// Maximum page size for message listing.
pub const MAX_PAGE_SIZE: i64 = 100;

/// Default page size for message listing.
pub const DEFAULT_PAGE_SIZE: i64 = 50;

/// Which family of messages a listing shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListKind {
    Plain,
    /// Event- and cohort-triggered messages.
    Auto,
    Api,
}

impl ListKind {
    /// `auto` wins over `api`; neither means plain.
    pub fn from_flags(auto: bool, api: bool) -> Self {
        if auto {
            Self::Auto
        } else if api {
            Self::Api
        } else {
            Self::Plain
        }
    }

    pub fn trigger_kinds(self) -> &'static [TriggerKind] {
        match self {
            Self::Plain => &[TriggerKind::Plain],
            Self::Auto => &[TriggerKind::Event, TriggerKind::Cohort],
            Self::Api => &[TriggerKind::Api],
        }
    }

    /// Kind tags as stored in the trigger documents.
    pub fn kind_tags(self) -> Vec<String> {
        self.trigger_kinds()
            .iter()
            .map(|k| k.as_str().to_string())
            .collect()
    }

    pub fn matches(self, trigger: &Trigger) -> bool {
        self.trigger_kinds().contains(&trigger.kind())
    }

    /// Start of the first trigger of this kind, the default sort key.
    pub fn first_start(self, triggers: &[Trigger]) -> Option<Timestamp> {
        triggers.iter().find(|t| self.matches(t)).map(Trigger::start)
    }
}

/// Whitelisted sort columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortColumn {
    /// First trigger start of the listed kind.
    Start,
    Created,
    Title,
    Status,
    Sent,
    Actioned,
}

impl FromStr for SortColumn {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "start" | "triggers.start" => Ok(Self::Start),
            "created" | "info.created" => Ok(Self::Created),
            "title" | "info.title" => Ok(Self::Title),
            "status" => Ok(Self::Status),
            "sent" | "result.sent" => Ok(Self::Sent),
            "actioned" | "result.actioned" => Ok(Self::Actioned),
            other => Err(CoreError::validation(format!("Cannot sort by '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDir {
    Asc,
    Desc,
}

impl SortDir {
    pub fn sql(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

impl FromStr for SortDir {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "asc" => Ok(Self::Asc),
            "desc" => Ok(Self::Desc),
            other => Err(CoreError::validation(format!(
                "Sort direction must be 'asc' or 'desc', got '{other}'"
            ))),
        }
    }
}

/// Normalized listing parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct ListParams {
    pub kind: ListKind,
    /// Case-insensitive substring over content titles and messages.
    pub search: Option<String>,
    pub offset: i64,
    pub limit: i64,
    pub sort: SortColumn,
    pub dir: SortDir,
}

impl ListParams {
    /// Validate raw listing inputs.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        auto: bool,
        api: bool,
        search: Option<&str>,
        offset: Option<i64>,
        limit: Option<i64>,
        sort: Option<&str>,
        dir: Option<&str>,
    ) -> Result<Self, CoreError> {
        let mut errors = Vec::new();

        let offset = offset.unwrap_or(0);
        if offset < 0 {
            errors.push("Offset cannot be negative".to_string());
        }

        let limit = limit.unwrap_or(DEFAULT_PAGE_SIZE);
        if !(1..=MAX_PAGE_SIZE).contains(&limit) {
            errors.push(format!("Limit must be between 1 and {MAX_PAGE_SIZE}"));
        }

        let sort = match sort.filter(|s| !s.is_empty()).map(str::parse) {
            None => SortColumn::Start,
            Some(Ok(col)) => col,
            Some(Err(e)) => {
                errors.extend(e.reasons());
                SortColumn::Start
            }
        };

        let dir = match dir.filter(|s| !s.is_empty()).map(str::parse) {
            None => SortDir::Desc,
            Some(Ok(d)) => d,
            Some(Err(e)) => {
                errors.extend(e.reasons());
                SortDir::Desc
            }
        };

        CoreError::check(errors)?;

        Ok(Self {
            kind: ListKind::from_flags(auto, api),
            search: search
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string),
            offset,
            limit,
            sort,
            dir,
        })
    }
}

/// Escape `%`, `_` and `\` so user input matches literally inside `ILIKE`.
pub fn like_pattern(search: &str) -> String {
    let mut escaped = String::with_capacity(search.len() + 2);
    escaped.push('%');
    for c in search.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

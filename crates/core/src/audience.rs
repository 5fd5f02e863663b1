//! Audience stage compiler.
//!
//! Turns a [`Filter`] plus target platforms into an ordered list of stage
//! descriptors. The same list drives both counting (estimate) and iteration
//! (resolve), so the two can never disagree about who is in the audience.
//!
//! Stage order is fixed: push token, geo, cohort, user properties, events.
//! A stage whose criterion is empty is omitted entirely rather than rendered
//! as a pass-through.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::filter::{parse_drill_query, parse_user_query, DrillClause, Filter, UserCondition};
use crate::platform::Platform;
use crate::types::DbId;

/// Locale bucket for users without a locale.
pub const DEFAULT_LOCALE: &str = "default";

/// One step of the audience pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum AudienceStage {
    /// User holds a non-demo push token for at least one of the platforms.
    PushToken { platforms: Vec<Platform> },
    /// User belongs to at least one of the geos.
    Geo { geos: Vec<DbId> },
    /// User belongs to at least one of the cohorts.
    Cohort { cohorts: Vec<String> },
    /// All user-property conditions hold.
    UserQuery(Vec<UserCondition>),
    /// All event requirements hold.
    Drill(Vec<DrillClause>),
}

impl AudienceStage {
    /// Short stage name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Self::PushToken { .. } => "push_token",
            Self::Geo { .. } => "geo",
            Self::Cohort { .. } => "cohort",
            Self::UserQuery(_) => "user",
            Self::Drill(_) => "drill",
        }
    }
}

/// Compile targeting criteria into audience stages.
pub fn compile(filter: &Filter, platforms: &[Platform]) -> Result<Vec<AudienceStage>, CoreError> {
    if platforms.is_empty() {
        return Err(CoreError::validation("At least one platform is required"));
    }

    let mut stages = vec![AudienceStage::PushToken {
        platforms: platforms.to_vec(),
    }];

    if !filter.geos.is_empty() {
        stages.push(AudienceStage::Geo {
            geos: filter.geos.clone(),
        });
    }

    if !filter.cohorts.is_empty() {
        stages.push(AudienceStage::Cohort {
            cohorts: filter.cohorts.clone(),
        });
    }

    if let Some(user) = &filter.user {
        let conditions = parse_user_query(user)?;
        if !conditions.is_empty() {
            stages.push(AudienceStage::UserQuery(conditions));
        }
    }

    if let Some(drill) = &filter.drill {
        let clauses = parse_drill_query(drill)?;
        if !clauses.is_empty() {
            stages.push(AudienceStage::Drill(clauses));
        }
    }

    Ok(stages)
}

/// Result of counting an audience.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudienceEstimate {
    pub count: i64,
    /// Matching users per locale; users without a locale fall into
    /// [`DEFAULT_LOCALE`], which is always present.
    pub locales: BTreeMap<String, i64>,
}

impl AudienceEstimate {
    /// Assemble an estimate from a total and `(locale, count)` groups.
    pub fn new(count: i64, groups: impl IntoIterator<Item = (Option<String>, i64)>) -> Self {
        Self {
            count,
            locales: locale_breakdown(groups),
        }
    }
}

/// Fold `(locale, count)` groups into a map with a guaranteed default bucket.
pub fn locale_breakdown(
    groups: impl IntoIterator<Item = (Option<String>, i64)>,
) -> BTreeMap<String, i64> {
    let mut locales = BTreeMap::from([(DEFAULT_LOCALE.to_string(), 0)]);
    for (locale, count) in groups {
        let key = match locale {
            Some(l) if !l.is_empty() => l,
            _ => DEFAULT_LOCALE.to_string(),
        };
        *locales.entry(key).or_insert(0) += count;
    }
    locales
}

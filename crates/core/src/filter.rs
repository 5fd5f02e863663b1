//! Campaign targeting criteria and the small query languages inside them.
//!
//! `filter.user` and `filter.drill` arrive as free-form JSON. They are parsed
//! here into typed conditions so the persistence layer only ever renders a
//! closed set of shapes, never raw input.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::CoreError;
use crate::types::{DbId, Timestamp};

/// Dotted property path: `plan`, `custom.tier`, `geo.city_2`.
const PROPERTY_PATH_PATTERN: &str = r"^[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z0-9_]+)*$";

static PROPERTY_PATH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(PROPERTY_PATH_PATTERN).expect("valid regex"));

/// Maximum number of values accepted by `$in` / `$nin`.
pub const MAX_IN_VALUES: usize = 10_000;

// ---------------------------------------------------------------------------
// Filter
// ---------------------------------------------------------------------------

/// Targeting criteria of a message.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    /// User-property query, see [`parse_user_query`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<Value>,
    /// Event query, see [`parse_drill_query`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub drill: Option<Value>,
    #[serde(default)]
    pub geos: Vec<DbId>,
    #[serde(default)]
    pub cohorts: Vec<String>,
}

impl Filter {
    /// Filter restricting the audience to an explicit list of user ids.
    pub fn for_uids(uids: &[String]) -> Self {
        Self {
            user: Some(serde_json::json!({ "uid": { "$in": uids } })),
            ..Self::default()
        }
    }

    /// Filter restricting the audience to members of the given cohorts.
    pub fn for_cohorts(cohorts: &[String]) -> Self {
        Self {
            cohorts: cohorts.to_vec(),
            ..Self::default()
        }
    }

    /// Problems with the filter's shape. Existence of referenced geos and
    /// cohorts is checked against storage separately.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        for (i, g) in self.geos.iter().enumerate() {
            if self.geos[..i].contains(g) {
                errors.push(format!("Duplicate geo {g}"));
            }
        }
        for (i, c) in self.cohorts.iter().enumerate() {
            if c.trim().is_empty() {
                errors.push("Cohort id cannot be empty".to_string());
            } else if self.cohorts[..i].contains(c) {
                errors.push(format!("Duplicate cohort '{c}'"));
            }
        }
        if let Some(user) = &self.user {
            if let Err(e) = parse_user_query(user) {
                errors.extend(e.reasons());
            }
        }
        if let Some(drill) = &self.drill {
            if let Err(e) = parse_drill_query(drill) {
                errors.extend(e.reasons());
            }
        }

        errors
    }
}

// ---------------------------------------------------------------------------
// User property query
// ---------------------------------------------------------------------------

/// Which user attribute a condition addresses.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyPath {
    /// The user's id column.
    Uid,
    /// The user's locale column.
    Locale,
    /// A path into the custom property document.
    Custom(Vec<String>),
}

impl PropertyPath {
    fn parse(path: &str) -> Result<Self, String> {
        match path {
            "uid" => Ok(Self::Uid),
            "la" => Ok(Self::Locale),
            _ if PROPERTY_PATH_RE.is_match(path) => {
                Ok(Self::Custom(path.split('.').map(String::from).collect()))
            }
            _ => Err(format!("Invalid property path '{path}'")),
        }
    }

    fn is_column(&self) -> bool {
        matches!(self, Self::Uid | Self::Locale)
    }
}

/// Numeric comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Gt,
    Gte,
    Lt,
    Lte,
}

impl CmpOp {
    /// SQL spelling of the operator.
    pub fn sql(self) -> &'static str {
        match self {
            Self::Gt => ">",
            Self::Gte => ">=",
            Self::Lt => "<",
            Self::Lte => "<=",
        }
    }
}

/// A single predicate on a property.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Eq(Value),
    In(Vec<Value>),
    NotIn(Vec<Value>),
    Cmp(CmpOp, f64),
    Exists(bool),
}

/// A predicate bound to the property it tests.
#[derive(Debug, Clone, PartialEq)]
pub struct UserCondition {
    pub path: PropertyPath,
    pub condition: Condition,
}

/// Accept the query either as a JSON object or as a string holding one.
fn unwrap_json_string(value: &Value) -> Result<Value, CoreError> {
    match value {
        Value::String(s) => serde_json::from_str(s)
            .map_err(|e| CoreError::validation(format!("Invalid JSON in filter: {e}"))),
        other => Ok(other.clone()),
    }
}

/// Parse a user-property query into conditions, all of which must hold.
///
/// An empty object parses to an empty list.
pub fn parse_user_query(value: &Value) -> Result<Vec<UserCondition>, CoreError> {
    let value = unwrap_json_string(value)?;
    let Value::Object(map) = value else {
        return Err(CoreError::validation("User filter must be a JSON object"));
    };

    let mut conditions = Vec::new();
    let mut errors = Vec::new();

    for (key, spec) in map {
        let path = match PropertyPath::parse(&key) {
            Ok(p) => p,
            Err(e) => {
                errors.push(e);
                continue;
            }
        };
        match parse_conditions(&key, &path, spec) {
            Ok(parsed) => conditions.extend(parsed.into_iter().map(|condition| UserCondition {
                path: path.clone(),
                condition,
            })),
            Err(mut e) => errors.append(&mut e),
        }
    }

    CoreError::check(errors)?;
    Ok(conditions)
}

fn parse_conditions(key: &str, path: &PropertyPath, spec: Value) -> Result<Vec<Condition>, Vec<String>> {
    let ops = match spec {
        Value::Object(ops) if ops.keys().any(|k| k.starts_with('$')) => ops,
        Value::Object(_) | Value::Array(_) => {
            return Err(vec![format!("'{key}': nested documents are not supported")]);
        }
        scalar => {
            check_column_value(key, path, &scalar).map_err(|e| vec![e])?;
            return Ok(vec![Condition::Eq(scalar)]);
        }
    };

    let mut out = Vec::new();
    let mut errors = Vec::new();

    for (op, arg) in ops {
        let parsed = match op.as_str() {
            "$in" | "$nin" => parse_list(key, path, arg).map(|values| {
                if op == "$in" {
                    Condition::In(values)
                } else {
                    Condition::NotIn(values)
                }
            }),
            "$gt" | "$gte" | "$lt" | "$lte" => {
                let cmp = match op.as_str() {
                    "$gt" => CmpOp::Gt,
                    "$gte" => CmpOp::Gte,
                    "$lt" => CmpOp::Lt,
                    _ => CmpOp::Lte,
                };
                if path.is_column() {
                    Err(format!("'{key}': {op} is not supported"))
                } else {
                    arg.as_f64()
                        .map(|n| Condition::Cmp(cmp, n))
                        .ok_or_else(|| format!("'{key}': {op} expects a number"))
                }
            }
            "$exists" => arg
                .as_bool()
                .map(Condition::Exists)
                .ok_or_else(|| format!("'{key}': $exists expects a boolean")),
            other => Err(format!("'{key}': unsupported operator {other}")),
        };
        match parsed {
            Ok(c) => out.push(c),
            Err(e) => errors.push(e),
        }
    }

    if errors.is_empty() {
        Ok(out)
    } else {
        Err(errors)
    }
}

fn parse_list(key: &str, path: &PropertyPath, arg: Value) -> Result<Vec<Value>, String> {
    let Value::Array(values) = arg else {
        return Err(format!("'{key}': expected an array"));
    };
    if values.len() > MAX_IN_VALUES {
        return Err(format!("'{key}': at most {MAX_IN_VALUES} values are allowed"));
    }
    for v in &values {
        if v.is_object() || v.is_array() {
            return Err(format!("'{key}': list values must be scalars"));
        }
        check_column_value(key, path, v)?;
    }
    Ok(values)
}

/// Column-backed paths (`uid`, `la`) only compare against strings.
fn check_column_value(key: &str, path: &PropertyPath, value: &Value) -> Result<(), String> {
    if path.is_column() && !value.is_string() {
        return Err(format!("'{key}': expected a string value"));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Drill (event) query
// ---------------------------------------------------------------------------

/// Requirement that the user performed an event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrillClause {
    pub key: String,
    /// The event's segmentation must contain these key/value pairs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub segmentation: Option<Map<String, Value>>,
    /// Only count occurrences at or after this time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub since: Option<Timestamp>,
    /// Minimum number of occurrences; defaults to one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_count: Option<i64>,
}

/// Parse a drill query: a single clause object or an array of clauses.
pub fn parse_drill_query(value: &Value) -> Result<Vec<DrillClause>, CoreError> {
    let value = unwrap_json_string(value)?;
    let items = match value {
        Value::Array(items) => items,
        obj @ Value::Object(_) => vec![obj],
        _ => return Err(CoreError::validation("Drill filter must be an object or an array")),
    };

    let mut clauses = Vec::with_capacity(items.len());
    let mut errors = Vec::new();

    for (i, item) in items.into_iter().enumerate() {
        match serde_json::from_value::<DrillClause>(item) {
            Ok(clause) => {
                if clause.key.trim().is_empty() {
                    errors.push(format!("drill[{i}]: key cannot be empty"));
                } else if clause.min_count.is_some_and(|n| n < 1) {
                    errors.push(format!("drill[{i}]: min_count must be positive"));
                } else {
                    clauses.push(clause);
                }
            }
            Err(e) => errors.push(format!("drill[{i}]: {e}")),
        }
    }

    CoreError::check(errors)?;
    Ok(clauses)
}

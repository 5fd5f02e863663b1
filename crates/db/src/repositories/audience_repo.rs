//! Audience counting and iteration.
//!
//! Renders compiled [`AudienceStage`]s into one `WHERE` clause over
//! `app_users u`. Each stage becomes a single predicate; every value is a
//! bind parameter, never spliced into the SQL text.

use std::collections::BTreeSet;

use beacon_core::audience::{AudienceEstimate, AudienceStage};
use beacon_core::filter::{Condition, DrillClause, Filter, PropertyPath, UserCondition};
use beacon_core::platform::{Platform, ALL_PLATFORMS};
use beacon_core::types::{DbId, Timestamp};
use serde_json::Value;
use sqlx::postgres::{PgArguments, Postgres};
use sqlx::query::QueryAs;
use sqlx::PgPool;

use crate::models::audience::AudienceUser;
use crate::repositories::{CohortRepo, GeoRepo};

/// Default batch size for [`AudienceRepo::resolve_page`].
pub const RESOLVE_BATCH: i64 = 1000;

/// A bind parameter collected while rendering stages.
#[derive(Debug, Clone)]
enum Arg {
    BigInt(i64),
    Text(String),
    Texts(Vec<String>),
    BigInts(Vec<i64>),
    Json(Value),
    Float(f64),
    Time(Timestamp),
}

/// Predicates plus their bind parameters, numbered from `$1`.
#[derive(Debug, Default)]
struct StageSql {
    conditions: Vec<String>,
    args: Vec<Arg>,
}

impl StageSql {
    fn new(app_id: DbId) -> Self {
        let mut sql = Self::default();
        let p = sql.arg(Arg::BigInt(app_id));
        sql.conditions.push(format!("u.app_id = {p}"));
        sql
    }

    /// Register a bind parameter and return its placeholder.
    fn arg(&mut self, arg: Arg) -> String {
        self.args.push(arg);
        format!("${}", self.args.len())
    }

    fn render(app_id: DbId, stages: &[AudienceStage]) -> Self {
        let mut sql = Self::new(app_id);
        for stage in stages {
            let predicate = sql.stage(stage);
            sql.conditions.push(predicate);
        }
        sql
    }

    fn where_clause(&self) -> String {
        self.conditions.join(" AND ")
    }

    fn stage(&mut self, stage: &AudienceStage) -> String {
        match stage {
            AudienceStage::PushToken { platforms } => {
                let p = self.arg(Arg::Texts(platform_codes(platforms)));
                format!(
                    "EXISTS (SELECT 1 FROM push_tokens t \
                     WHERE t.app_user_id = u.id AND NOT t.is_demo AND t.platform = ANY({p}))"
                )
            }
            AudienceStage::Geo { geos } => {
                let p = self.arg(Arg::BigInts(geos.clone()));
                format!(
                    "EXISTS (SELECT 1 FROM geo_members gm \
                     WHERE gm.app_user_id = u.id AND gm.geo_id = ANY({p}))"
                )
            }
            AudienceStage::Cohort { cohorts } => {
                let p = self.arg(Arg::Texts(cohorts.clone()));
                format!(
                    "EXISTS (SELECT 1 FROM cohort_members cm JOIN cohorts c ON c.id = cm.cohort_id \
                     WHERE cm.app_user_id = u.id AND c.app_id = u.app_id AND c.cohort_key = ANY({p}))"
                )
            }
            AudienceStage::UserQuery(conditions) => {
                let parts: Vec<String> = conditions.iter().map(|c| self.user_condition(c)).collect();
                format!("({})", parts.join(" AND "))
            }
            AudienceStage::Drill(clauses) => {
                let parts: Vec<String> = clauses.iter().map(|c| self.drill_clause(c)).collect();
                format!("({})", parts.join(" AND "))
            }
        }
    }

    fn user_condition(&mut self, uc: &UserCondition) -> String {
        match (&uc.path, &uc.condition) {
            (PropertyPath::Custom(path), condition) => {
                let p = self.arg(Arg::Texts(path.clone()));
                let prop = format!("(u.props #> {p})");
                match condition {
                    Condition::Eq(v) => {
                        let v = self.arg(Arg::Json(v.clone()));
                        format!("{prop} = {v}::jsonb")
                    }
                    Condition::In(values) => {
                        let v = self.arg(Arg::Json(Value::Array(values.clone())));
                        format!("{v}::jsonb @> jsonb_build_array({prop})")
                    }
                    Condition::NotIn(values) => {
                        let v = self.arg(Arg::Json(Value::Array(values.clone())));
                        format!("NOT ({v}::jsonb @> jsonb_build_array({prop}))")
                    }
                    Condition::Cmp(op, n) => {
                        let v = self.arg(Arg::Float(*n));
                        format!(
                            "(CASE WHEN jsonb_typeof({prop}) = 'number' \
                             THEN (u.props #>> {p})::float8 {} {v} ELSE FALSE END)",
                            op.sql()
                        )
                    }
                    Condition::Exists(true) => format!("{prop} IS NOT NULL"),
                    Condition::Exists(false) => format!("{prop} IS NULL"),
                }
            }
            (path, condition) => {
                let nullable = matches!(path, PropertyPath::Locale);
                let col = if nullable { "u.locale" } else { "u.uid" };
                match condition {
                    Condition::Eq(v) => {
                        let v = self.arg(Arg::Text(value_text(v)));
                        format!("{col} = {v}")
                    }
                    Condition::In(values) => {
                        let v = self.arg(Arg::Texts(values.iter().map(value_text).collect()));
                        format!("{col} = ANY({v})")
                    }
                    Condition::NotIn(values) => {
                        let v = self.arg(Arg::Texts(values.iter().map(value_text).collect()));
                        if nullable {
                            format!("({col} IS NULL OR {col} <> ALL({v}))")
                        } else {
                            format!("{col} <> ALL({v})")
                        }
                    }
                    // Rejected at parse time for column paths.
                    Condition::Cmp(..) => "FALSE".to_string(),
                    Condition::Exists(exists) => match (nullable, exists) {
                        (true, true) => format!("{col} IS NOT NULL"),
                        (true, false) => format!("{col} IS NULL"),
                        (false, true) => "TRUE".to_string(),
                        (false, false) => "FALSE".to_string(),
                    },
                }
            }
        }
    }

    fn drill_clause(&mut self, clause: &DrillClause) -> String {
        let key = self.arg(Arg::Text(clause.key.clone()));
        let mut filters = vec![
            "e.app_id = u.app_id".to_string(),
            "e.uid = u.uid".to_string(),
            format!("e.event_key = {key}"),
        ];
        if let Some(seg) = &clause.segmentation {
            let s = self.arg(Arg::Json(Value::Object(seg.clone())));
            filters.push(format!("e.segmentation @> {s}::jsonb"));
        }
        if let Some(since) = clause.since {
            let t = self.arg(Arg::Time(since));
            filters.push(format!("e.occurred_at >= {t}"));
        }
        let min = self.arg(Arg::BigInt(clause.min_count.unwrap_or(1)));
        format!(
            "(SELECT COALESCE(SUM(e.count), 0) FROM app_events e WHERE {}) >= {min}",
            filters.join(" AND ")
        )
    }
}

fn value_text(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn platform_codes(platforms: &[Platform]) -> Vec<String> {
    platforms.iter().map(|p| p.code().to_string()).collect()
}

fn bind_args<'q, O>(
    mut q: QueryAs<'q, Postgres, O, PgArguments>,
    args: Vec<Arg>,
) -> QueryAs<'q, Postgres, O, PgArguments> {
    for arg in args {
        q = match arg {
            Arg::BigInt(v) => q.bind(v),
            Arg::Text(v) => q.bind(v),
            Arg::Texts(v) => q.bind(v),
            Arg::BigInts(v) => q.bind(v),
            Arg::Json(v) => q.bind(v),
            Arg::Float(v) => q.bind(v),
            Arg::Time(v) => q.bind(v),
        };
    }
    q
}

/// Counts and iterates the users matching compiled audience stages.
pub struct AudienceRepo;

impl AudienceRepo {
    /// Reasons the filter references geos or cohorts that do not exist.
    ///
    /// Runs before any audience query so a typo never silently shrinks the
    /// audience.
    pub async fn missing_references(
        pool: &PgPool,
        app_id: DbId,
        filter: &Filter,
    ) -> Result<Vec<String>, sqlx::Error> {
        let mut errors = Vec::new();

        let geos: BTreeSet<DbId> = filter.geos.iter().copied().collect();
        if !geos.is_empty() {
            let ids: Vec<DbId> = geos.into_iter().collect();
            let found = GeoRepo::count_existing(pool, &ids).await?;
            if found != ids.len() as i64 {
                errors.push("No such geo".to_string());
            }
        }

        let cohorts: BTreeSet<&String> = filter.cohorts.iter().collect();
        if !cohorts.is_empty() {
            let keys: Vec<String> = cohorts.into_iter().cloned().collect();
            let found = CohortRepo::count_existing(pool, app_id, &keys).await?;
            if found != keys.len() as i64 {
                errors.push("No such cohort".to_string());
            }
        }

        Ok(errors)
    }

    /// Count matching users, grouped by locale.
    pub async fn estimate(
        pool: &PgPool,
        app_id: DbId,
        stages: &[AudienceStage],
    ) -> Result<AudienceEstimate, sqlx::Error> {
        let sql = StageSql::render(app_id, stages);
        let query = format!(
            "SELECT u.locale, COUNT(*) FROM app_users u \
             WHERE {} \
             GROUP BY u.locale",
            sql.where_clause()
        );
        let groups: Vec<(Option<String>, i64)> =
            bind_args(sqlx::query_as(&query), sql.args).fetch_all(pool).await?;

        let count = groups.iter().map(|(_, n)| n).sum();
        Ok(AudienceEstimate::new(count, groups))
    }

    /// One keyset page of matching users with ids greater than `after`.
    ///
    /// Tokens are limited to the platforms of the push token stage.
    pub async fn resolve_page(
        pool: &PgPool,
        app_id: DbId,
        stages: &[AudienceStage],
        after: DbId,
        limit: i64,
    ) -> Result<Vec<AudienceUser>, sqlx::Error> {
        let platforms = stages
            .iter()
            .find_map(|s| match s {
                AudienceStage::PushToken { platforms } => Some(platforms.as_slice()),
                _ => None,
            })
            .unwrap_or(&ALL_PLATFORMS[..]);

        let mut sql = StageSql::render(app_id, stages);
        let codes = sql.arg(Arg::Texts(platform_codes(platforms)));
        let after = sql.arg(Arg::BigInt(after));
        let limit = sql.arg(Arg::BigInt(limit));

        let query = format!(
            "SELECT u.id, u.uid, u.locale, \
                 COALESCE((SELECT jsonb_object_agg(t.platform, t.token) FROM push_tokens t \
                           WHERE t.app_user_id = u.id AND NOT t.is_demo AND t.platform = ANY({codes})), \
                          '{{}}'::jsonb) AS tokens \
             FROM app_users u \
             WHERE {} AND u.id > {after} \
             ORDER BY u.id \
             LIMIT {limit}",
            sql.where_clause()
        );
        bind_args(sqlx::query_as::<_, AudienceUser>(&query), sql.args)
            .fetch_all(pool)
            .await
    }
}

//! Repository for `cohorts` and `cohort_members`.

use beacon_core::types::DbId;
use sqlx::PgPool;

use crate::models::audience::Cohort;

const COLUMNS: &str = "id, app_id, cohort_key, name, created_at, updated_at";

pub struct CohortRepo;

impl CohortRepo {
    pub async fn create(
        pool: &PgPool,
        app_id: DbId,
        cohort_key: &str,
        name: &str,
    ) -> Result<Cohort, sqlx::Error> {
        let query = format!(
            "INSERT INTO cohorts (app_id, cohort_key, name) VALUES ($1, $2, $3) RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Cohort>(&query)
            .bind(app_id)
            .bind(cohort_key)
            .bind(name)
            .fetch_one(pool)
            .await
    }

    /// Add a user to a cohort. Adding twice is a no-op.
    pub async fn add_member(pool: &PgPool, cohort_id: DbId, app_user_id: DbId) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO cohort_members (cohort_id, app_user_id) VALUES ($1, $2) \
             ON CONFLICT ON CONSTRAINT uq_cohort_members_cohort_user DO NOTHING",
        )
        .bind(cohort_id)
        .bind(app_user_id)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// How many distinct cohort keys among `keys` exist for the app.
    pub async fn count_existing(pool: &PgPool, app_id: DbId, keys: &[String]) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM cohorts WHERE app_id = $1 AND cohort_key = ANY($2)")
            .bind(app_id)
            .bind(keys)
            .fetch_one(pool)
            .await
    }
}

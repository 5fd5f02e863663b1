//! Repository for the `apps` table.

use sqlx::PgPool;
use beacon_core::types::DbId;

use crate::models::app::{App, CreateApp};

/// Column list for `apps` queries.
const COLUMNS: &str = "id, name, utc_offset_minutes, push_config, created_at, updated_at";

/// Provides access to applications and their push configuration.
pub struct AppRepo;

impl AppRepo {
    pub async fn create(pool: &PgPool, input: &CreateApp) -> Result<App, sqlx::Error> {
        let query = format!(
            "INSERT INTO apps (name, utc_offset_minutes, push_config) \
             VALUES ($1, COALESCE($2, 0), COALESCE($3, '{{}}'::jsonb)) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, App>(&query)
            .bind(&input.name)
            .bind(input.utc_offset_minutes)
            .bind(&input.push_config)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<App>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM apps WHERE id = $1");
        sqlx::query_as::<_, App>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Replace the app's push configuration document.
    pub async fn update_push_config(
        pool: &PgPool,
        id: DbId,
        config: &serde_json::Value,
    ) -> Result<Option<App>, sqlx::Error> {
        let query = format!(
            "UPDATE apps SET push_config = $2 WHERE id = $1 RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, App>(&query)
            .bind(id)
            .bind(config)
            .fetch_optional(pool)
            .await
    }

    /// Number of end users the app has.
    pub async fn count_users(pool: &PgPool, id: DbId) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM app_users WHERE app_id = $1")
            .bind(id)
            .fetch_one(pool)
            .await
    }
}

//! Repository for the `push_credentials` table.

use beacon_core::platform::Platform;
use beacon_core::types::DbId;
use sqlx::PgPool;

use crate::models::app::PushCredential;

const COLUMNS: &str = "id, platform, settings, created_at, updated_at";

pub struct CredentialRepo;

impl CredentialRepo {
    pub async fn create(
        pool: &PgPool,
        platform: Platform,
        settings: &serde_json::Value,
    ) -> Result<PushCredential, sqlx::Error> {
        let query = format!(
            "INSERT INTO push_credentials (platform, settings) VALUES ($1, $2) RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, PushCredential>(&query)
            .bind(platform.code())
            .bind(settings)
            .fetch_one(pool)
            .await
    }

    /// How many of `ids` exist. Duplicates in `ids` count once.
    pub async fn count_existing(pool: &PgPool, ids: &[DbId]) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM push_credentials WHERE id = ANY($1)")
            .bind(ids)
            .fetch_one(pool)
            .await
    }
}

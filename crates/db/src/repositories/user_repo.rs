//! Repository for `app_users` and `push_tokens`.

use beacon_core::platform::Platform;
use beacon_core::types::DbId;
use sqlx::PgPool;

use crate::models::audience::{AppUser, CreateAppUser};

const COLUMNS: &str = "id, app_id, uid, locale, props, created_at, updated_at";

pub struct UserRepo;

impl UserRepo {
    pub async fn create(pool: &PgPool, input: &CreateAppUser) -> Result<AppUser, sqlx::Error> {
        let query = format!(
            "INSERT INTO app_users (app_id, uid, locale, props) \
             VALUES ($1, $2, $3, COALESCE($4, '{{}}'::jsonb)) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, AppUser>(&query)
            .bind(input.app_id)
            .bind(&input.uid)
            .bind(&input.locale)
            .bind(&input.props)
            .fetch_one(pool)
            .await
    }

    /// Set the user's token for a platform, replacing any previous one.
    pub async fn set_token(
        pool: &PgPool,
        app_user_id: DbId,
        platform: Platform,
        token: &str,
        is_demo: bool,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO push_tokens (app_user_id, platform, token, is_demo) VALUES ($1, $2, $3, $4) \
             ON CONFLICT ON CONSTRAINT uq_push_tokens_user_platform \
             DO UPDATE SET token = EXCLUDED.token, is_demo = EXCLUDED.is_demo",
        )
        .bind(app_user_id)
        .bind(platform.code())
        .bind(token)
        .bind(is_demo)
        .execute(pool)
        .await?;
        Ok(())
    }
}

//! Repository for `geos` and `geo_members`.

use beacon_core::types::DbId;
use sqlx::PgPool;

use crate::models::audience::Geo;

const COLUMNS: &str = "id, app_id, name, created_at, updated_at";

pub struct GeoRepo;

impl GeoRepo {
    pub async fn create(pool: &PgPool, app_id: Option<DbId>, name: &str) -> Result<Geo, sqlx::Error> {
        let query = format!("INSERT INTO geos (app_id, name) VALUES ($1, $2) RETURNING {COLUMNS}");
        sqlx::query_as::<_, Geo>(&query)
            .bind(app_id)
            .bind(name)
            .fetch_one(pool)
            .await
    }

    /// Add a user to a geo. Adding twice is a no-op.
    pub async fn add_member(pool: &PgPool, geo_id: DbId, app_user_id: DbId) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO geo_members (geo_id, app_user_id) VALUES ($1, $2) \
             ON CONFLICT ON CONSTRAINT uq_geo_members_geo_user DO NOTHING",
        )
        .bind(geo_id)
        .bind(app_user_id)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// How many distinct geos among `ids` exist.
    pub async fn count_existing(pool: &PgPool, ids: &[DbId]) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM geos WHERE id = ANY($1)")
            .bind(ids)
            .fetch_one(pool)
            .await
    }
}

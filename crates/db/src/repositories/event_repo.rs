//! Repository for the `app_events` table.

use beacon_core::types::{DbId, Timestamp};
use serde_json::Value;
use sqlx::PgPool;

use crate::models::event::{AppEvent, NewAppEvent};

const COLUMNS: &str =
    "id, app_id, uid, event_key, segmentation, count, occurred_at, created_at, updated_at";

/// Analytics events read by drill filters and written by demo data.
pub struct AppEventRepo;

impl AppEventRepo {
    pub async fn record(
        pool: &PgPool,
        app_id: DbId,
        input: &NewAppEvent,
    ) -> Result<AppEvent, sqlx::Error> {
        let query = format!(
            "INSERT INTO app_events (app_id, uid, event_key, segmentation, count, occurred_at) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, AppEvent>(&query)
            .bind(app_id)
            .bind(&input.uid)
            .bind(&input.event_key)
            .bind(&input.segmentation)
            .bind(input.count)
            .bind(input.occurred_at)
            .fetch_one(pool)
            .await
    }

    /// Batch-insert events for one app. Returns the number of rows written.
    pub async fn insert_many(
        pool: &PgPool,
        app_id: DbId,
        events: &[NewAppEvent],
    ) -> Result<u64, sqlx::Error> {
        if events.is_empty() {
            return Ok(0);
        }

        let uids: Vec<Option<String>> = events.iter().map(|e| e.uid.clone()).collect();
        let keys: Vec<String> = events.iter().map(|e| e.event_key.clone()).collect();
        let segmentations: Vec<Value> = events.iter().map(|e| e.segmentation.clone()).collect();
        let counts: Vec<i64> = events.iter().map(|e| e.count).collect();
        let occurred: Vec<Timestamp> = events.iter().map(|e| e.occurred_at).collect();

        let done = sqlx::query(
            "INSERT INTO app_events (app_id, uid, event_key, segmentation, count, occurred_at) \
             SELECT $1::bigint, * FROM UNNEST($2::text[], $3::text[], $4::jsonb[], $5::bigint[], $6::timestamptz[])",
        )
        .bind(app_id)
        .bind(&uids)
        .bind(&keys)
        .bind(&segmentations)
        .bind(&counts)
        .bind(&occurred)
        .execute(pool)
        .await?;
        Ok(done.rows_affected())
    }

    /// Events of an app, optionally limited to one key, oldest first.
    pub async fn list_by_app(
        pool: &PgPool,
        app_id: DbId,
        event_key: Option<&str>,
    ) -> Result<Vec<AppEvent>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM app_events \
             WHERE app_id = $1 AND ($2::text IS NULL OR event_key = $2) \
             ORDER BY occurred_at, id"
        );
        sqlx::query_as::<_, AppEvent>(&query)
            .bind(app_id)
            .bind(event_key)
            .fetch_all(pool)
            .await
    }
}

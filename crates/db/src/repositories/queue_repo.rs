//! Repository for the `push_queue` hand-off table.

use beacon_core::types::DbId;
use sqlx::PgPool;

use crate::models::queue::{NewQueueItem, QueueItem};

const COLUMNS: &str = "id, message_id, app_user_id, platform, token, locale, created_at, updated_at";

/// Work items consumed by the external delivery worker.
pub struct QueueRepo;

impl QueueRepo {
    /// Enqueue recipients for a message. Returns the number of rows written.
    pub async fn enqueue(
        pool: &PgPool,
        message_id: DbId,
        items: &[NewQueueItem],
    ) -> Result<u64, sqlx::Error> {
        if items.is_empty() {
            return Ok(0);
        }

        let user_ids: Vec<DbId> = items.iter().map(|i| i.app_user_id).collect();
        let platforms: Vec<String> = items.iter().map(|i| i.platform.code().to_string()).collect();
        let tokens: Vec<String> = items.iter().map(|i| i.token.clone()).collect();
        let locales: Vec<Option<String>> = items.iter().map(|i| i.locale.clone()).collect();

        let done = sqlx::query(
            "INSERT INTO push_queue (message_id, app_user_id, platform, token, locale) \
             SELECT $1::bigint, * FROM UNNEST($2::bigint[], $3::text[], $4::text[], $5::text[])",
        )
        .bind(message_id)
        .bind(&user_ids)
        .bind(&platforms)
        .bind(&tokens)
        .bind(&locales)
        .execute(pool)
        .await?;
        Ok(done.rows_affected())
    }

    pub async fn list_by_message(
        pool: &PgPool,
        message_id: DbId,
    ) -> Result<Vec<QueueItem>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM push_queue WHERE message_id = $1 ORDER BY id");
        sqlx::query_as::<_, QueueItem>(&query)
            .bind(message_id)
            .fetch_all(pool)
            .await
    }
}

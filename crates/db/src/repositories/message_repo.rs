//! Repository for the `push_messages` table.
//!
//! Every mutation that can race with the delivery worker goes through
//! [`MessageRepo::update_if_state`]: the write applies only while the stored
//! `state` still equals the state the caller observed. A lost race comes back
//! as `Ok(None)`, never as an error.

use beacon_core::listing::{like_pattern, ListKind, ListParams, SortColumn};
use beacon_core::result::DeliveryResult;
use beacon_core::state::MessageState;
use beacon_core::types::DbId;
use sqlx::types::Json;
use sqlx::PgPool;

use crate::models::message::{MessageChange, NewMessage, PushMessage};

/// Column list for `push_messages` queries.
const COLUMNS: &str = "id, app_id, platforms, filter, triggers, contents, info, \
                       state, status, result, is_test, created_at, updated_at";

/// Excludes soft-deleted rows.
const NOT_DELETED: &str = "(state & 16) = 0";

/// Provides CRUD, listing, and conditional writes for push messages.
pub struct MessageRepo;

impl MessageRepo {
    pub async fn insert(pool: &PgPool, input: &NewMessage) -> Result<PushMessage, sqlx::Error> {
        let query = format!(
            "INSERT INTO push_messages \
                 (app_id, platforms, filter, triggers, contents, info, state, status, is_test) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, PushMessage>(&query)
            .bind(input.app_id)
            .bind(Json(&input.platforms))
            .bind(Json(&input.filter))
            .bind(Json(&input.triggers))
            .bind(Json(&input.contents))
            .bind(Json(&input.info))
            .bind(i32::from(input.state))
            .bind(input.status.as_str())
            .bind(input.is_test)
            .fetch_one(pool)
            .await
    }

    /// Find a message that has not been soft-deleted.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<PushMessage>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM push_messages WHERE id = $1 AND {NOT_DELETED}");
        sqlx::query_as::<_, PushMessage>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Find a message including soft-deleted ones.
    pub async fn find_any(pool: &PgPool, id: DbId) -> Result<Option<PushMessage>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM push_messages WHERE id = $1");
        sqlx::query_as::<_, PushMessage>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Apply `change` only if the stored state still equals `expected`.
    ///
    /// Returns the updated row, or `None` when the message is gone or its
    /// state moved on since it was read.
    pub async fn update_if_state(
        pool: &PgPool,
        id: DbId,
        expected: MessageState,
        change: &MessageChange,
    ) -> Result<Option<PushMessage>, sqlx::Error> {
        let query = format!(
            "UPDATE push_messages SET \
                 state = COALESCE($3, state), \
                 status = COALESCE($4, status), \
                 filter = COALESCE($5, filter), \
                 triggers = COALESCE($6, triggers), \
                 contents = COALESCE($7, contents), \
                 info = COALESCE($8, info), \
                 result = COALESCE($9, result) || COALESCE($10, '{{}}'::jsonb), \
                 is_test = COALESCE($11, is_test) \
             WHERE id = $1 AND state = $2 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, PushMessage>(&query)
            .bind(id)
            .bind(i32::from(expected))
            .bind(change.state.map(i32::from))
            .bind(change.status.map(|s| s.as_str()))
            .bind(change.filter.as_ref().map(Json))
            .bind(change.triggers.as_ref().map(Json))
            .bind(change.contents.as_ref().map(Json))
            .bind(change.info.as_ref().map(Json))
            .bind(change.result.as_ref().map(Json))
            .bind(&change.result_patch)
            .bind(change.is_test)
            .fetch_optional(pool)
            .await
    }

    /// Add `delta` to the stored result while the state equals `expected`.
    ///
    /// Counters are additive, so the row is locked for the read-merge-write
    /// instead of relying on the state comparison alone.
    pub async fn record_progress(
        pool: &PgPool,
        id: DbId,
        expected: MessageState,
        delta: &DeliveryResult,
    ) -> Result<Option<PushMessage>, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let select = format!("SELECT {COLUMNS} FROM push_messages WHERE id = $1 FOR UPDATE");
        let current = sqlx::query_as::<_, PushMessage>(&select)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;

        let Some(current) = current.filter(|m| m.state == expected) else {
            tracing::debug!(message_id = id, expected = %expected, "Progress not recorded, state moved on");
            return Ok(None);
        };

        let mut result = current.result.0;
        result.merge(delta);

        let update = format!(
            "UPDATE push_messages SET result = $2 WHERE id = $1 RETURNING {COLUMNS}"
        );
        let updated = sqlx::query_as::<_, PushMessage>(&update)
            .bind(id)
            .bind(Json(&result))
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(Some(updated))
    }

    /// One page of non-deleted messages of the listed kind.
    pub async fn list(
        pool: &PgPool,
        app_id: DbId,
        params: &ListParams,
    ) -> Result<Vec<PushMessage>, sqlx::Error> {
        let (where_clause, next_idx) = Self::list_conditions(params.search.is_some());

        let order = match params.sort {
            SortColumn::Start => "(SELECT (t.value->>'start')::timestamptz \
                                  FROM jsonb_array_elements(triggers) WITH ORDINALITY AS t(value, n) \
                                  WHERE t.value->>'kind' = ANY($2) ORDER BY t.n LIMIT 1)",
            SortColumn::Created => "(info->>'created')::timestamptz",
            SortColumn::Title => "info->>'title'",
            SortColumn::Status => "status",
            SortColumn::Sent => "(result->>'sent')::bigint",
            SortColumn::Actioned => "(result->>'actioned')::bigint",
        };

        let query = format!(
            "SELECT {COLUMNS} FROM push_messages \
             WHERE {where_clause} \
             ORDER BY {order} {dir} NULLS LAST, id DESC \
             LIMIT ${next_idx} OFFSET ${}",
            next_idx + 1,
            dir = params.dir.sql(),
        );

        let mut q = sqlx::query_as::<_, PushMessage>(&query)
            .bind(app_id)
            .bind(params.kind.kind_tags());
        if let Some(search) = &params.search {
            q = q.bind(like_pattern(search));
        }
        q.bind(params.limit).bind(params.offset).fetch_all(pool).await
    }

    /// Number of non-deleted messages of a kind, optionally narrowed by search.
    pub async fn count(
        pool: &PgPool,
        app_id: DbId,
        kind: ListKind,
        search: Option<&str>,
    ) -> Result<i64, sqlx::Error> {
        let (where_clause, _) = Self::list_conditions(search.is_some());
        let query = format!("SELECT COUNT(*) FROM push_messages WHERE {where_clause}");

        let mut q = sqlx::query_scalar(&query).bind(app_id).bind(kind.kind_tags());
        if let Some(search) = search {
            q = q.bind(like_pattern(search));
        }
        q.fetch_one(pool).await
    }

    /// Shared `WHERE` clause for listing. Binds `$1` app id, `$2` kind tags
    /// and `$3` search pattern when searching; returns the next free index.
    fn list_conditions(search: bool) -> (String, u32) {
        let mut conditions = vec![
            "app_id = $1".to_string(),
            NOT_DELETED.to_string(),
            "NOT is_test".to_string(),
            "EXISTS (SELECT 1 FROM jsonb_array_elements(triggers) t \
             WHERE t->>'kind' = ANY($2))"
                .to_string(),
        ];
        let mut bind_idx: u32 = 3;

        if search {
            conditions.push(format!(
                "EXISTS (SELECT 1 FROM jsonb_array_elements(contents) c \
                 WHERE c->>'title' ILIKE ${bind_idx} OR c->>'message' ILIKE ${bind_idx})"
            ));
            bind_idx += 1;
        }

        (conditions.join(" AND "), bind_idx)
    }
}

use crate::adapters::database::records::{MessageRecord, ThreadSummaryRecord};
use crate::domain::message::{GroupKey, GroupKeyError, HistoryCursor, Message, ThreadCursor, ThreadSummary, UserId};
use crate::domain::pagination::Page;
use crate::error::{AppError, Result};
use sqlx::PgConnection;
use time::OffsetDateTime;

#[derive(Clone, Debug, Default)]
pub struct MessageRepository {}

impl MessageRepository {
    #[must_use]
    pub const fn new() -> Self {
        Self {}
    }

    /// Inserts a message and both read receipts. The caller must run this inside a transaction.
    ///
    /// # Errors
    /// Returns `AppError::Database` if either insert fails.
    #[tracing::instrument(level = "debug", skip(self, conn, content))]
    pub(crate) async fn create(
        &self,
        conn: &mut PgConnection,
        sender_id: UserId,
        receiver_id: UserId,
        group_key: &GroupKey,
        content: &str,
        created_at: OffsetDateTime,
    ) -> Result<Message> {
        let record = sqlx::query_as::<_, MessageRecord>(
            r#"
            INSERT INTO messages (created_at, sender_id, content, group_key, valid)
            VALUES ($1, $2, $3, $4, TRUE)
            RETURNING id, created_at, sender_id, content, group_key
            "#,
        )
        .bind(created_at)
        .bind(sender_id.0)
        .bind(content)
        .bind(group_key.to_string())
        .fetch_one(&mut *conn)
        .await?;

        // Sender has read their own message; the receiver has not.
        sqlx::query(
            r#"
            INSERT INTO message_receipts (user_id, message_id, has_read)
            VALUES ($1, $3, TRUE), ($2, $3, FALSE)
            "#,
        )
        .bind(sender_id.0)
        .bind(receiver_id.0)
        .bind(record.id)
        .execute(&mut *conn)
        .await?;

        record.try_into().map_err(corrupt_group_key)
    }

    /// Latest visible message per thread the user takes part in, oldest thread first,
    /// with the user's unread count per thread.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the query fails.
    #[tracing::instrument(level = "debug", skip(self, conn))]
    pub(crate) async fn fetch_thread_summaries(
        &self,
        conn: &mut PgConnection,
        user_id: UserId,
        thread: Option<&GroupKey>,
        cursor: ThreadCursor,
        page: Page,
    ) -> Result<Vec<ThreadSummary>> {
        let records = sqlx::query_as::<_, ThreadSummaryRecord>(
            r#"
            WITH ranked AS (
                SELECT m.id, m.created_at, m.sender_id, m.content, m.group_key,
                       ROW_NUMBER() OVER (PARTITION BY m.group_key ORDER BY m.created_at DESC, m.id DESC) AS rn
                FROM messages m
                JOIN message_receipts r ON r.message_id = m.id AND r.user_id = $1
                WHERE m.valid
                  AND m.id > $2
                  AND ($3::TEXT IS NULL OR m.group_key = $3)
            ),
            unread AS (
                SELECT m.group_key, COUNT(*) AS unread
                FROM message_receipts r
                JOIN messages m ON m.id = r.message_id
                WHERE r.user_id = $1
                  AND NOT r.has_read
                  AND m.valid
                  AND m.id > $2
                  AND ($3::TEXT IS NULL OR m.group_key = $3)
                GROUP BY m.group_key
            )
            SELECT ranked.id, ranked.created_at, ranked.sender_id, ranked.content, ranked.group_key,
                   COALESCE(unread.unread, 0) AS unread
            FROM ranked
            LEFT JOIN unread ON unread.group_key = ranked.group_key
            WHERE ranked.rn = 1
            ORDER BY ranked.created_at ASC, ranked.id ASC
            OFFSET $4
            LIMIT $5
            "#,
        )
        .bind(user_id.0)
        .bind(cursor.0)
        .bind(thread.map(ToString::to_string))
        .bind(page.offset)
        .bind(page.limit)
        .fetch_all(conn)
        .await?;

        records.into_iter().map(ThreadSummary::try_from).collect::<std::result::Result<_, _>>().map_err(corrupt_group_key)
    }

    /// Visible messages the user takes part in, ascending by id.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the query fails.
    #[tracing::instrument(level = "debug", skip(self, conn))]
    pub(crate) async fn fetch_history(
        &self,
        conn: &mut PgConnection,
        user_id: UserId,
        thread: Option<&GroupKey>,
        cursor: HistoryCursor,
        page: Page,
    ) -> Result<Vec<Message>> {
        let records = sqlx::query_as::<_, MessageRecord>(
            r#"
            SELECT m.id, m.created_at, m.sender_id, m.content, m.group_key
            FROM messages m
            JOIN message_receipts r ON r.message_id = m.id AND r.user_id = $1
            WHERE m.valid
              AND m.id > $2
              AND ($3::TEXT IS NULL OR m.group_key = $3)
            ORDER BY m.id ASC
            OFFSET $4
            LIMIT $5
            "#,
        )
        .bind(user_id.0)
        .bind(cursor.0)
        .bind(thread.map(ToString::to_string))
        .bind(page.offset)
        .bind(page.limit)
        .fetch_all(conn)
        .await?;

        records.into_iter().map(Message::try_from).collect::<std::result::Result<_, _>>().map_err(corrupt_group_key)
    }

    /// Flips the user's receipts for the given messages to read. Already read receipts are untouched.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the update fails.
    #[tracing::instrument(level = "debug", skip(self, conn), fields(batch_count = message_ids.len()))]
    pub(crate) async fn mark_read(&self, conn: &mut PgConnection, user_id: UserId, message_ids: &[i64]) -> Result<u64> {
        if message_ids.is_empty() {
            return Ok(0);
        }
        let result = sqlx::query(
            r#"
            UPDATE message_receipts
            SET has_read = TRUE
            WHERE user_id = $1
              AND message_id = ANY($2)
              AND NOT has_read
            "#,
        )
        .bind(user_id.0)
        .bind(message_ids)
        .execute(conn)
        .await?;
        Ok(result.rows_affected())
    }

    /// Whether the user has any unread receipt on a visible message.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the query fails.
    #[tracing::instrument(level = "debug", skip(self, conn))]
    pub(crate) async fn has_unread(
        &self,
        conn: &mut PgConnection,
        user_id: UserId,
        thread: Option<&GroupKey>,
    ) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1
                FROM message_receipts r
                JOIN messages m ON m.id = r.message_id
                WHERE r.user_id = $1
                  AND NOT r.has_read
                  AND m.valid
                  AND ($2::TEXT IS NULL OR m.group_key = $2)
            )
            "#,
        )
        .bind(user_id.0)
        .bind(thread.map(ToString::to_string))
        .fetch_one(conn)
        .await?;
        Ok(exists)
    }

    /// Soft deletes a visible message and returns its thread.
    ///
    /// # Errors
    /// Returns `AppError::NotFound` if no visible message has this id.
    #[tracing::instrument(level = "debug", skip(self, conn))]
    pub(crate) async fn invalidate(&self, conn: &mut PgConnection, message_id: i64) -> Result<GroupKey> {
        let group_key: Option<String> = sqlx::query_scalar(
            r#"
            UPDATE messages
            SET valid = FALSE
            WHERE id = $1 AND valid
            RETURNING group_key
            "#,
        )
        .bind(message_id)
        .fetch_optional(conn)
        .await?;

        group_key.ok_or(AppError::NotFound)?.parse().map_err(corrupt_group_key)
    }
}

fn corrupt_group_key(e: GroupKeyError) -> AppError {
    tracing::error!(error = %e, "Stored group key is malformed");
    AppError::Internal
}

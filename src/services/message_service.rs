use crate::adapters::database::DbPool;
use crate::adapters::database::message_repo::MessageRepository;
use crate::config::MessagingConfig;
use crate::domain::message::{GroupKey, HistoryCursor, HistoryPage, Message, ThreadCursor, ThreadSummary, UserId};
use crate::domain::pagination::Page;
use crate::error::{AppError, Result};
use opentelemetry::{
    KeyValue, global,
    metrics::{Counter, Histogram},
};
use time::OffsetDateTime;

#[derive(Clone, Debug)]
pub(crate) struct Metrics {
    pub(crate) sent_total: Counter<u64>,
    pub(crate) history_page_size: Histogram<u64>,
    pub(crate) marked_read_total: Counter<u64>,
    pub(crate) invalidated_total: Counter<u64>,
}

impl Metrics {
    fn new() -> Self {
        let meter = global::meter("yym-server");
        Self {
            sent_total: meter
                .u64_counter("yym_messages_sent_total")
                .with_description("Total messages sent")
                .build(),
            history_page_size: meter
                .u64_histogram("yym_message_history_page_size")
                .with_description("Number of messages returned by a single history fetch")
                .build(),
            marked_read_total: meter
                .u64_counter("yym_receipts_marked_read_total")
                .with_description("Read receipts flipped from unread to read")
                .build(),
            invalidated_total: meter
                .u64_counter("yym_messages_invalidated_total")
                .with_description("Messages hidden by moderation")
                .build(),
        }
    }
}

/// Direct messages grouped into two-party threads with per-user read receipts.
#[derive(Clone, Debug)]
pub struct MessageService {
    pool: DbPool,
    repo: MessageRepository,
    config: MessagingConfig,
    metrics: Metrics,
}

impl MessageService {
    #[must_use]
    pub fn new(pool: DbPool, repo: MessageRepository, config: MessagingConfig) -> Self {
        Self { pool, repo, config, metrics: Metrics::new() }
    }

    /// Stores a message from `sender_id` to `receiver_id` along with both read receipts.
    ///
    /// # Errors
    /// Returns `AppError::BadRequest` if the users are the same or the content is empty or too long.
    /// Returns `AppError::Database` if the write fails; nothing is stored in that case.
    #[tracing::instrument(
        err(level = "warn"),
        skip(self, content),
        fields(sender_id = %sender_id, receiver_id = %receiver_id)
    )]
    pub async fn send_message(&self, sender_id: UserId, receiver_id: UserId, content: &str) -> Result<Message> {
        let group_key = GroupKey::between(sender_id, receiver_id)?;
        if content.is_empty() {
            return Err(AppError::BadRequest("content must not be empty".to_string()));
        }
        if content.chars().count() > self.config.max_content_chars {
            return Err(AppError::BadRequest(format!(
                "content exceeds {} characters",
                self.config.max_content_chars
            )));
        }

        let mut tx = self.pool.begin().await?;
        let result = self
            .repo
            .create(&mut *tx, sender_id, receiver_id, &group_key, content, OffsetDateTime::now_utc())
            .await;

        match result {
            Ok(message) => {
                tx.commit().await?;
                tracing::debug!(message_id = message.id, thread = %group_key, "Message stored");
                self.metrics.sent_total.add(1, &[KeyValue::new("status", "success")]);
                Ok(message)
            }
            Err(e) => {
                self.metrics.sent_total.add(1, &[KeyValue::new("status", "failure")]);
                Err(e)
            }
        }
    }

    /// Returns the newest message of each thread `user_id` takes part in, oldest thread first.
    ///
    /// Read only. Messages with an id at or below `cursor` are ignored, both for picking the
    /// newest message and for counting unread ones.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the query fails.
    #[tracing::instrument(err(level = "warn"), skip(self), fields(user_id = %user_id))]
    pub async fn list_threads(
        &self,
        user_id: UserId,
        thread: Option<&GroupKey>,
        cursor: ThreadCursor,
        page: Page,
    ) -> Result<Vec<ThreadSummary>> {
        let mut conn = self.pool.acquire().await?;
        self.repo.fetch_thread_summaries(&mut conn, user_id, thread, cursor, page).await
    }

    /// Returns messages after `cursor` in ascending id order and marks exactly that page as read
    /// for `user_id`. Fetching history counts as acknowledging it.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the query or the receipt update fails. No receipt changes
    /// in that case.
    #[tracing::instrument(err(level = "warn"), skip(self), fields(user_id = %user_id))]
    pub async fn list_messages(
        &self,
        user_id: UserId,
        thread: Option<&GroupKey>,
        cursor: HistoryCursor,
        page: Page,
    ) -> Result<HistoryPage> {
        let mut tx = self.pool.begin().await?;
        let messages = self.repo.fetch_history(&mut *tx, user_id, thread, cursor, page).await?;
        let ids: Vec<i64> = messages.iter().map(|m| m.id).collect();
        let marked_read = self.repo.mark_read(&mut *tx, user_id, &ids).await?;
        tx.commit().await?;

        self.metrics.history_page_size.record(messages.len() as u64, &[]);
        if marked_read > 0 {
            self.metrics.marked_read_total.add(marked_read, &[]);
            tracing::debug!(marked_read, "Receipts acknowledged");
        }

        Ok(HistoryPage { messages, marked_read })
    }

    /// Whether `user_id` has at least one unread message, optionally within one thread.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the query fails.
    #[tracing::instrument(err(level = "warn"), skip(self), fields(user_id = %user_id))]
    pub async fn has_unread(&self, user_id: UserId, thread: Option<&GroupKey>) -> Result<bool> {
        let mut conn = self.pool.acquire().await?;
        self.repo.has_unread(&mut conn, user_id, thread).await
    }

    /// Hides a message from every read path. The row and its receipts are kept.
    ///
    /// # Errors
    /// Returns `AppError::NotFound` if the message does not exist or is already hidden.
    #[tracing::instrument(err(level = "warn"), skip(self))]
    pub async fn invalidate_message(&self, message_id: i64) -> Result<GroupKey> {
        let mut conn = self.pool.acquire().await?;
        let group_key = self.repo.invalidate(&mut conn, message_id).await?;
        self.metrics.invalidated_total.add(1, &[]);
        tracing::info!(message_id, thread = %group_key, "Message invalidated");
        Ok(group_key)
    }

    /// Resolves client paging parameters against the configured defaults.
    ///
    /// # Errors
    /// Returns `AppError::BadRequest` for a negative offset or a non-positive limit.
    pub fn page(&self, offset: Option<i64>, limit: Option<i64>) -> Result<Page> {
        Ok(Page::resolve(offset, limit, self.config.default_page_limit, self.config.max_page_limit)?)
    }
}

use crate::domain::message::{GroupKey, GroupKeyError, Message, ThreadSummary, UserId};
use time::OffsetDateTime;

#[derive(Debug, sqlx::FromRow)]
pub struct MessageRecord {
    pub(crate) id: i64,
    pub(crate) created_at: OffsetDateTime,
    pub(crate) sender_id: i64,
    pub(crate) content: String,
    pub(crate) group_key: String,
}

impl TryFrom<MessageRecord> for Message {
    type Error = GroupKeyError;

    fn try_from(record: MessageRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: record.id,
            created_at: record.created_at,
            sender_id: UserId(record.sender_id),
            content: record.content,
            group_key: record.group_key.parse::<GroupKey>()?,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub struct ThreadSummaryRecord {
    #[sqlx(flatten)]
    pub(crate) latest: MessageRecord,
    pub(crate) unread: i64,
}

impl TryFrom<ThreadSummaryRecord> for ThreadSummary {
    type Error = GroupKeyError;

    fn try_from(record: ThreadSummaryRecord) -> Result<Self, Self::Error> {
        Ok(Self { latest: record.latest.try_into()?, unread: record.unread })
    }
}

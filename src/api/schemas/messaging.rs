use crate::domain::message::{GroupKey, Message, ThreadSummary};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Query string shared by the thread list, history and unread endpoints.
#[derive(Debug, Default, Deserialize)]
pub struct ThreadQuery {
    pub user: Option<i64>,
    pub thread: Option<String>,
    pub stop: Option<i64>,
    pub offset: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub sender: Option<i64>,
    pub receiver: Option<i64>,
    pub content: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SendMessageResponse {
    pub id: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UnreadResponse {
    pub unread: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ThreadSummaryResponse {
    pub id: i64,
    pub thread: GroupKey,
    #[serde(with = "time::serde::rfc3339")]
    pub create_time: OffsetDateTime,
    pub sender: i64,
    pub content: String,
    pub unread: i64,
}

impl From<ThreadSummary> for ThreadSummaryResponse {
    fn from(summary: ThreadSummary) -> Self {
        let ThreadSummary { latest, unread } = summary;
        Self {
            id: latest.id,
            thread: latest.group_key,
            create_time: latest.created_at,
            sender: latest.sender_id.0,
            content: latest.content,
            unread,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub id: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub create_time: OffsetDateTime,
    pub sender_id: i64,
    pub content: String,
    pub thread: GroupKey,
}

impl From<Message> for MessageResponse {
    fn from(message: Message) -> Self {
        Self {
            id: message.id,
            create_time: message.created_at,
            sender_id: message.sender_id.0,
            content: message.content,
            thread: message.group_key,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VersionResponse {
    pub minimal_available_version: u32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TimeResponse {
    pub timestamp: f64,
}

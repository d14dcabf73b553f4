use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use time::OffsetDateTime;

/// Identifier of an application user. Users live outside this service; ids are taken as given.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GroupKeyError {
    #[error("thread key must have the form <user>_<user>")]
    Malformed,
    #[error("thread key participants must be in ascending order")]
    Unordered,
    #[error("a thread needs two distinct participants")]
    SameUser,
}

/// Identifies the conversation between one unordered pair of users.
///
/// Rendered as the two user ids in ascending order joined by `_`, so the key for
/// `(a, b)` and `(b, a)` is always the same string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct GroupKey {
    low: UserId,
    high: UserId,
}

impl GroupKey {
    pub const SEPARATOR: char = '_';

    /// Builds the key for the conversation between two distinct users.
    ///
    /// # Errors
    /// Returns `GroupKeyError::SameUser` if both ids are equal.
    pub fn between(a: UserId, b: UserId) -> Result<Self, GroupKeyError> {
        match a.cmp(&b) {
            std::cmp::Ordering::Less => Ok(Self { low: a, high: b }),
            std::cmp::Ordering::Greater => Ok(Self { low: b, high: a }),
            std::cmp::Ordering::Equal => Err(GroupKeyError::SameUser),
        }
    }

    #[must_use]
    pub const fn participants(&self) -> (UserId, UserId) {
        (self.low, self.high)
    }

    #[must_use]
    pub fn involves(&self, user: UserId) -> bool {
        self.low == user || self.high == user
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.low, Self::SEPARATOR, self.high)
    }
}

impl FromStr for GroupKey {
    type Err = GroupKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (low, high) = s.split_once(Self::SEPARATOR).ok_or(GroupKeyError::Malformed)?;
        let low = low.parse::<i64>().map_err(|_| GroupKeyError::Malformed)?;
        let high = high.parse::<i64>().map_err(|_| GroupKeyError::Malformed)?;
        if low == high {
            return Err(GroupKeyError::SameUser);
        }
        if low > high {
            return Err(GroupKeyError::Unordered);
        }
        Ok(Self { low: UserId(low), high: UserId(high) })
    }
}

impl TryFrom<String> for GroupKey {
    type Error = GroupKeyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<GroupKey> for String {
    fn from(key: GroupKey) -> Self {
        key.to_string()
    }
}

/// A direct message. Immutable once stored apart from the moderation flag, which is not exposed here
/// because invalid messages never leave the repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: i64,
    pub created_at: OffsetDateTime,
    pub sender_id: UserId,
    pub content: String,
    pub group_key: GroupKey,
}

/// The newest visible message of a thread together with the reader's unread count for that thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadSummary {
    pub latest: Message,
    pub unread: i64,
}

/// Messages returned by a history fetch and how many of them were newly acknowledged.
#[derive(Debug, Clone, Default)]
pub struct HistoryPage {
    pub messages: Vec<Message>,
    pub marked_read: u64,
}

impl HistoryPage {
    /// The cursor a client should send on its next history poll.
    #[must_use]
    pub fn next_cursor(&self, current: HistoryCursor) -> HistoryCursor {
        self.messages.last().map_or(current, |m| HistoryCursor(m.id))
    }
}

/// Lower message-id bound for thread summaries.
///
/// The server never advances it. A client may only move it forward while none of its
/// threads have unread messages, otherwise older unread messages vanish from summaries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ThreadCursor(pub i64);

/// Lower message-id bound for history pages. Safe to advance to the last id returned.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HistoryCursor(pub i64);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn group_key_is_symmetric() {
        let ab = GroupKey::between(UserId(47), UserId(12)).unwrap();
        let ba = GroupKey::between(UserId(12), UserId(47)).unwrap();
        assert_eq!(ab, ba);
        assert_eq!(ab.to_string(), "12_47");
    }

    #[test]
    fn group_key_orders_numerically() {
        let key = GroupKey::between(UserId(100), UserId(9)).unwrap();
        assert_eq!(key.to_string(), "9_100");
        assert_eq!(key.participants(), (UserId(9), UserId(100)));
    }

    #[test]
    fn group_key_rejects_self_conversation() {
        assert_eq!(GroupKey::between(UserId(5), UserId(5)), Err(GroupKeyError::SameUser));
    }

    #[test]
    fn group_key_parse() {
        let key: GroupKey = "3_8".parse().unwrap();
        assert!(key.involves(UserId(3)));
        assert!(key.involves(UserId(8)));
        assert!(!key.involves(UserId(4)));

        assert_eq!("8_3".parse::<GroupKey>(), Err(GroupKeyError::Unordered));
        assert_eq!("8_8".parse::<GroupKey>(), Err(GroupKeyError::SameUser));
        assert_eq!("8".parse::<GroupKey>(), Err(GroupKeyError::Malformed));
        assert_eq!("a_b".parse::<GroupKey>(), Err(GroupKeyError::Malformed));
    }

    #[test]
    fn group_key_serde_uses_string_form() {
        let key = GroupKey::between(UserId(2), UserId(1)).unwrap();
        assert_eq!(serde_json::to_string(&key).unwrap(), "\"1_2\"");
        let back: GroupKey = serde_json::from_str("\"1_2\"").unwrap();
        assert_eq!(back, key);
    }

    #[test]
    fn next_cursor_follows_last_message() {
        let key = GroupKey::between(UserId(1), UserId(2)).unwrap();
        let message = |id| Message {
            id,
            created_at: OffsetDateTime::UNIX_EPOCH,
            sender_id: UserId(1),
            content: String::new(),
            group_key: key.clone(),
        };

        let empty = HistoryPage::default();
        assert_eq!(empty.next_cursor(HistoryCursor(7)), HistoryCursor(7));

        let page = HistoryPage { messages: vec![message(8), message(11)], marked_read: 1 };
        assert_eq!(page.next_cursor(HistoryCursor(7)), HistoryCursor(11));
    }
}

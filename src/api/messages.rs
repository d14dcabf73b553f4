use crate::api::AppState;
use crate::api::schemas::messaging::{
    MessageResponse, SendMessageRequest, SendMessageResponse, ThreadQuery, ThreadSummaryResponse, UnreadResponse,
};
use crate::domain::message::{GroupKey, HistoryCursor, ThreadCursor, UserId};
use crate::error::{AppError, Result};
use crate::services::thread_cache::{Lookup, ThreadListingKey};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};

fn required<T>(value: Option<T>, name: &str) -> Result<T> {
    value.ok_or_else(|| AppError::BadRequest(format!("missing required field: {name}")))
}

fn parse_thread(thread: Option<&str>) -> Result<Option<GroupKey>> {
    Ok(thread.filter(|t| !t.is_empty()).map(str::parse::<GroupKey>).transpose()?)
}

/// Lists thread summaries for a user, oldest-touched thread first.
///
/// # Errors
/// Returns `AppError::BadRequest` if `user` is missing or paging values are invalid.
pub async fn list_threads(
    State(state): State<AppState>,
    Query(query): Query<ThreadQuery>,
) -> Result<Json<Vec<ThreadSummaryResponse>>> {
    let user_id = UserId(required(query.user, "user")?);
    let thread = parse_thread(query.thread.as_deref())?;
    let cursor = ThreadCursor(query.stop.unwrap_or(0));
    let page = state.message_service.page(query.offset, query.limit)?;

    let key = ThreadListingKey { user_id, thread: thread.as_ref(), cursor, page };
    let generation = match state.thread_cache.get::<Vec<ThreadSummaryResponse>>(&key).await {
        Lookup::Hit(cached) => return Ok(Json(cached)),
        Lookup::Miss(generation) => generation,
    };

    let summaries: Vec<ThreadSummaryResponse> = state
        .message_service
        .list_threads(user_id, thread.as_ref(), cursor, page)
        .await?
        .into_iter()
        .map(Into::into)
        .collect();

    if let Some(generation) = generation {
        state.thread_cache.put(&key, generation, &summaries).await;
    }
    Ok(Json(summaries))
}

/// Lists message history for a user and marks the returned page as read.
///
/// # Errors
/// Returns `AppError::BadRequest` if `user` is missing or paging values are invalid.
pub async fn list_messages(
    State(state): State<AppState>,
    Query(query): Query<ThreadQuery>,
) -> Result<Json<Vec<MessageResponse>>> {
    let user_id = UserId(required(query.user, "user")?);
    let thread = parse_thread(query.thread.as_deref())?;
    let cursor = HistoryCursor(query.stop.unwrap_or(0));
    let page = state.message_service.page(query.offset, query.limit)?;

    let history = state.message_service.list_messages(user_id, thread.as_ref(), cursor, page).await?;
    if history.marked_read > 0 {
        state.thread_cache.invalidate_users(&[user_id]).await;
    }

    Ok(Json(history.messages.into_iter().map(Into::into).collect()))
}

/// Reports whether a user has unread messages, optionally within one thread.
///
/// # Errors
/// Returns `AppError::BadRequest` if `user` is missing or `thread` is malformed.
pub async fn has_unread(State(state): State<AppState>, Query(query): Query<ThreadQuery>) -> Result<Json<UnreadResponse>> {
    let user_id = UserId(required(query.user, "user")?);
    let thread = parse_thread(query.thread.as_deref())?;

    let unread = state.message_service.has_unread(user_id, thread.as_ref()).await?;
    Ok(Json(UnreadResponse { unread }))
}

/// Sends a direct message.
///
/// # Errors
/// Returns `AppError::BadRequest` if a field is missing, sender and receiver are the same user,
/// or the content is empty.
pub async fn send_message(
    State(state): State<AppState>,
    Json(request): Json<SendMessageRequest>,
) -> Result<impl IntoResponse> {
    let sender = UserId(required(request.sender, "sender")?);
    let receiver = UserId(required(request.receiver, "receiver")?);
    let content = required(request.content, "content")?;

    let message = state.message_service.send_message(sender, receiver, &content).await?;
    state.thread_cache.invalidate_thread(&message.group_key).await;

    Ok((StatusCode::CREATED, Json(SendMessageResponse { id: message.id })))
}

/// Hides a message from every listing.
///
/// # Errors
/// Returns `AppError::NotFound` if no visible message has this id.
pub async fn invalidate_message(State(state): State<AppState>, Path(message_id): Path<i64>) -> Result<StatusCode> {
    let thread = state.message_service.invalidate_message(message_id).await?;
    state.thread_cache.invalidate_thread(&thread).await;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_thread_means_unscoped() {
        assert_eq!(parse_thread(None).unwrap(), None);
        assert_eq!(parse_thread(Some("")).unwrap(), None);
    }

    #[test]
    fn malformed_thread_is_a_client_error() {
        assert!(matches!(parse_thread(Some("12-47")), Err(AppError::BadRequest(_))));
        assert!(parse_thread(Some("12_47")).unwrap().is_some());
    }

    #[test]
    fn missing_field_names_the_field() {
        let err = required::<i64>(None, "user").unwrap_err();
        assert!(matches!(err, AppError::BadRequest(ref msg) if msg.contains("user")));
        assert_eq!(required(Some(7), "user").unwrap(), 7);
    }
}

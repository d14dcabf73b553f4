use crate::api::AppState;
use crate::error::AppError;
use crate::services::auth_service::SIGNATURE_HEADER;
use axum::{
    body::{Body, to_bytes},
    extract::{OriginalUri, Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use time::OffsetDateTime;

/// Rejects requests whose `X-Auth-Signature` does not match the path, query and body.
///
/// The body is buffered to verify it and handed on unchanged. The signature covers the full
/// request path, including any prefix the router was nested under.
pub async fn require_signature(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let (parts, body) = request.into_parts();

    let Ok(bytes) = to_bytes(body, state.config.auth.max_body_bytes).await else {
        return AppError::BadRequest("request body too large".to_string()).into_response();
    };

    let uri = parts.extensions.get::<OriginalUri>().map_or(&parts.uri, |original| &original.0);
    let path_and_query = uri.path_and_query().map_or_else(|| uri.path(), |pq| pq.as_str());
    let signature = parts.headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok());
    let now = OffsetDateTime::now_utc().unix_timestamp();

    match state.auth_service.verify(path_and_query, &bytes, signature, now) {
        Ok(account_id) => {
            tracing::Span::current().record("account_id", account_id.as_str());
            next.run(Request::from_parts(parts, Body::from(bytes))).await
        }
        Err(e) => e.into_response(),
    }
}

use crate::api::schemas::messaging::{TimeResponse, VersionResponse};
use axum::Json;
use time::OffsetDateTime;

/// Oldest client protocol version the server still accepts.
pub const MINIMAL_AVAILABLE_VERSION: u32 = 1;

pub async fn version() -> Json<VersionResponse> {
    Json(VersionResponse { minimal_available_version: MINIMAL_AVAILABLE_VERSION })
}

/// Server clock for client time synchronisation, as fractional unix seconds.
#[allow(clippy::cast_precision_loss)]
pub async fn time() -> Json<TimeResponse> {
    let nanos = OffsetDateTime::now_utc().unix_timestamp_nanos();
    Json(TimeResponse { timestamp: nanos as f64 / 1e9 })
}

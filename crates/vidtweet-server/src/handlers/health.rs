use axum::http::StatusCode;

use super::{respond, ApiResult};

/// GET /api/v1/healthcheck
pub async fn health_check() -> ApiResult<&'static str> {
    Ok(respond(StatusCode::OK, "OK", "Health check passed"))
}

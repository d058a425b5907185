use axum::{http::StatusCode, Json};
use vidtweet_shared::api::ApiResponse;

use crate::error::AppError;

pub mod extract;
pub mod form;
pub mod health;
pub mod users;
pub mod videos;

pub type ApiResult<T> = Result<(StatusCode, Json<ApiResponse<T>>), AppError>;

pub(crate) fn respond<T>(
    status: StatusCode,
    data: T,
    message: &str,
) -> (StatusCode, Json<ApiResponse<T>>) {
    (status, Json(ApiResponse::new(status.as_u16(), data, message)))
}

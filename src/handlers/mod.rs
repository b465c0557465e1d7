pub mod auth;
pub mod services;
pub mod users;

use crate::utils::{ApiError, ApiResult};
use axum::{extract::rejection::JsonRejection, http::StatusCode, Json};

/// Unwrap a JSON body, replacing the framework's rejection text
pub(crate) fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> ApiResult<T> {
    match payload {
        Ok(Json(value)) => Ok(value),
        Err(rejection) if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE => {
            Err(ApiError::payload_too_large())
        }
        Err(rejection) => {
            tracing::debug!("Rejected request body: {}", rejection.body_text());
            Err(ApiError::invalid_body())
        }
    }
}

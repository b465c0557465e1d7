use super::json_body;
use crate::{
    models::{AuthResponse, LoginRequest, RefreshTokenRequest, RegisterRequest},
    state::AppState,
    utils::{ApiError, ApiResult},
};
use axum::{extract::rejection::JsonRejection, extract::State, http::StatusCode, Json};

/// Create an account and return its first token pair
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<AuthResponse>)> {
    let request = json_body(payload)?;
    let response = state.auth_service.register(request).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// Handle user login
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<Json<AuthResponse>> {
    let request = json_body(payload)?;
    Ok(Json(state.auth_service.login(request).await?))
}

pub async fn refresh(
    State(state): State<AppState>,
    payload: Result<Json<RefreshTokenRequest>, JsonRejection>,
) -> ApiResult<Json<AuthResponse>> {
    let request = json_body(payload)?;
    if request.refresh_token.is_empty() {
        return Err(ApiError::bad_request("refresh_token is required"));
    }
    Ok(Json(state.auth_service.refresh(&request.refresh_token).await?))
}

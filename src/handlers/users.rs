use super::{json_body, services::PageQuery};
use crate::{
    auth::{require_admin, require_self_or_admin, require_user, Identity},
    db::parse_id,
    models::{ChangePasswordRequest, CreateUserRequest, Page, UpdateUserRequest, UserResponse},
    state::AppState,
    utils::{ApiError, ApiResult},
};
use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    Extension, Json,
};

/// Get the signed-in user's profile
pub async fn me(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> ApiResult<Json<UserResponse>> {
    let user = require_user(&identity)?;
    Ok(Json(state.users.get(user.user_id).await?))
}

pub async fn change_password(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    payload: Result<Json<ChangePasswordRequest>, JsonRejection>,
) -> ApiResult<StatusCode> {
    let user = require_user(&identity)?;
    let request = json_body(payload)?;
    state.users.change_password(user.user_id, request).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn create_user(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    payload: Result<Json<CreateUserRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<UserResponse>)> {
    require_admin(&identity)?;
    let request = json_body(payload)?;
    let user = state.users.create(request).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn list_users(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Query(query): Query<PageQuery>,
) -> ApiResult<Json<Page<UserResponse>>> {
    require_admin(&identity)?;
    Ok(Json(state.users.list(query.page_request()).await?))
}

/// Admins may read anyone; users only themselves
pub async fn get_user(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<String>,
) -> ApiResult<Json<UserResponse>> {
    // A malformed id can never be the caller's own account
    let id = match parse_id(&id) {
        Ok(id) => id,
        Err(err) if identity.is_admin() => return Err(err.into()),
        Err(_) => return Err(ApiError::forbidden("access denied")),
    };
    require_self_or_admin(&identity, id)?;
    Ok(Json(state.users.get(id).await?))
}

pub async fn update_user(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<String>,
    payload: Result<Json<UpdateUserRequest>, JsonRejection>,
) -> ApiResult<Json<UserResponse>> {
    require_admin(&identity)?;
    let id = parse_id(&id)?;
    let request = json_body(payload)?;
    Ok(Json(state.users.update(id, request).await?))
}

pub async fn delete_user(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    require_admin(&identity)?;
    let id = parse_id(&id)?;
    state.users.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

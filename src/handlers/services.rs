use super::json_body;
use crate::{
    db::parse_id,
    models::{
        CreateServiceRequest, ListParams, Page, PageRequest, PatchServiceRequest,
        ServiceResponse, ServiceVersionResponse, SortField, SortOrder, UpdateServiceRequest,
    },
    state::AppState,
    utils::ApiResult,
};
use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;

/// Raw query string; parsed leniently so bad paging values fall back to defaults
#[derive(Debug, Default, Deserialize)]
pub struct ServiceListQuery {
    pub search: Option<String>,
    pub name: Option<String>,
    pub sort: Option<String>,
    pub order: Option<String>,
    pub page: Option<String>,
    pub limit: Option<String>,
}

impl ServiceListQuery {
    pub fn into_params(self) -> ApiResult<ListParams> {
        let non_empty = |value: Option<String>| value.filter(|v| !v.is_empty());

        Ok(ListParams {
            sort: match non_empty(self.sort) {
                Some(sort) => SortField::parse(&sort)?,
                None => SortField::default(),
            },
            order: non_empty(self.order)
                .map(|order| SortOrder::parse(&order))
                .unwrap_or_default(),
            page: PageRequest::parse(self.page.as_deref(), self.limit.as_deref()),
            search: non_empty(self.search),
            name: non_empty(self.name),
        })
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<String>,
    pub limit: Option<String>,
}

impl PageQuery {
    pub fn page_request(&self) -> PageRequest {
        PageRequest::parse(self.page.as_deref(), self.limit.as_deref())
    }
}

pub async fn create_service(
    State(state): State<AppState>,
    payload: Result<Json<CreateServiceRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<ServiceResponse>)> {
    let request = json_body(payload)?;
    let service = state.catalog.create(request).await?;
    Ok((StatusCode::CREATED, Json(service)))
}

/// List services with search, filtering, sorting and pagination
pub async fn list_services(
    State(state): State<AppState>,
    Query(query): Query<ServiceListQuery>,
) -> ApiResult<Json<Page<ServiceResponse>>> {
    let params = query.into_params()?;
    Ok(Json(state.catalog.list(&params).await?))
}

pub async fn get_service(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<ServiceResponse>> {
    let id = parse_id(&id)?;
    Ok(Json(state.catalog.get(id).await?))
}

pub async fn update_service(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<UpdateServiceRequest>, JsonRejection>,
) -> ApiResult<Json<ServiceResponse>> {
    let id = parse_id(&id)?;
    let request = json_body(payload)?;
    Ok(Json(state.catalog.update(id, request).await?))
}

pub async fn patch_service(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<PatchServiceRequest>, JsonRejection>,
) -> ApiResult<Json<ServiceResponse>> {
    let id = parse_id(&id)?;
    let request = json_body(payload)?;
    Ok(Json(state.catalog.patch(id, request).await?))
}

pub async fn delete_service(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    let id = parse_id(&id)?;
    state.catalog.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Revision history, newest first
pub async fn list_versions(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<PageQuery>,
) -> ApiResult<Json<Page<ServiceVersionResponse>>> {
    let id = parse_id(&id)?;
    Ok(Json(state.catalog.list_versions(id, query.page_request()).await?))
}

pub async fn get_version(
    State(state): State<AppState>,
    Path((id, revision)): Path<(String, String)>,
) -> ApiResult<Json<ServiceVersionResponse>> {
    let id = parse_id(&id)?;
    Ok(Json(state.catalog.get_version(id, &revision).await?))
}

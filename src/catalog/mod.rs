//! Services and their revision history.
//!
//! Every write bumps the service's revision and records a snapshot, so
//! `service_versions` always holds one row per revision the service has had.

use crate::{
    db::Database,
    models::{
        CreateServiceRequest, ListParams, Page, PageRequest, PatchServiceRequest, Service,
        ServiceResponse, ServiceVersionResponse, UpdateServiceRequest,
    },
    utils::{ApiError, ApiResult},
};
use uuid::Uuid;

pub struct CatalogService {
    db: Database,
}

impl CatalogService {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub async fn create(&self, request: CreateServiceRequest) -> ApiResult<ServiceResponse> {
        request.validate()?;

        let service = self
            .db
            .services
            .create(Service::new(request.name, request.description))
            .await?;
        self.db.versions.create(service.snapshot()).await?;

        tracing::info!(service_id = %service.id, "Created service");
        Ok(ServiceResponse::new(service, 1))
    }

    pub async fn get(&self, id: Uuid) -> ApiResult<ServiceResponse> {
        let service = self.db.services.get_by_id(id).await?;
        self.with_count(service).await
    }

    pub async fn list(&self, params: &ListParams) -> ApiResult<Page<ServiceResponse>> {
        let page = self.db.services.list(params).await?;

        let mut data = Vec::with_capacity(page.data.len());
        for service in page.data {
            data.push(self.with_count(service).await?);
        }
        Ok(Page {
            data,
            pagination: page.pagination,
        })
    }

    /// Full replacement of name and description
    pub async fn update(&self, id: Uuid, request: UpdateServiceRequest) -> ApiResult<ServiceResponse> {
        request.validate()?;

        let mut service = self.db.services.get_by_id(id).await?;
        service.name = request.name;
        service.description = request.description;
        self.save_revision(service).await
    }

    /// Only the provided fields change; an empty patch is a no-op
    pub async fn patch(&self, id: Uuid, request: PatchServiceRequest) -> ApiResult<ServiceResponse> {
        request.validate()?;

        let mut service = self.db.services.get_by_id(id).await?;
        if request.is_empty() {
            return self.with_count(service).await;
        }
        if let Some(name) = request.name {
            service.name = name;
        }
        if let Some(description) = request.description {
            service.description = description;
        }
        self.save_revision(service).await
    }

    pub async fn delete(&self, id: Uuid) -> ApiResult<()> {
        self.db.services.delete(id).await?;
        self.db.versions.delete_by_service(id).await?;
        tracing::info!(service_id = %id, "Deleted service");
        Ok(())
    }

    pub async fn list_versions(
        &self,
        service_id: Uuid,
        page: PageRequest,
    ) -> ApiResult<Page<ServiceVersionResponse>> {
        // 404 for an unknown service rather than an empty page
        self.db.services.get_by_id(service_id).await?;
        Ok(self.db.versions.list_by_service(service_id, page).await?)
    }

    pub async fn get_version(&self, service_id: Uuid, revision: &str) -> ApiResult<ServiceVersionResponse> {
        let revision: u32 = revision
            .parse()
            .map_err(|_| ApiError::bad_request("invalid version number"))?;
        Ok(self.db.versions.get_by_revision(service_id, revision).await?)
    }

    async fn save_revision(&self, mut service: Service) -> ApiResult<ServiceResponse> {
        service.revision += 1;
        let service = self.db.services.update(service).await?;
        self.db.versions.create(service.snapshot()).await?;
        tracing::debug!(service_id = %service.id, revision = service.revision, "Saved revision");
        self.with_count(service).await
    }

    async fn with_count(&self, service: Service) -> ApiResult<ServiceResponse> {
        let count = self.db.versions.count_by_service(service.id).await?;
        Ok(ServiceResponse::new(service, count))
    }
}

use super::{
    ServiceRepository, ServiceVersionRepository, Store, StoreError, StoreResult, UserRepository,
};
use crate::models::{ListParams, Page, PageRequest, Service, ServiceVersion, SortField, SortOrder, User};
use async_trait::async_trait;
use chrono::Utc;
use std::{cmp::Ordering, collections::HashMap};
use tokio::sync::RwLock;
use uuid::Uuid;

/// In-process store; every write is a single map operation under one lock
#[derive(Default)]
pub struct MemoryStore {
    users: RwLock<HashMap<Uuid, User>>,
    services: RwLock<HashMap<Uuid, Service>>,
    versions: RwLock<HashMap<Uuid, ServiceVersion>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn paginate<T>(mut items: Vec<T>, page: PageRequest) -> Page<T> {
    let total = items.len() as u64;
    let start = page.offset().min(items.len());
    let end = (start + page.limit as usize).min(items.len());
    let data = items.drain(start..end).collect();
    Page::new(data, total, page)
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn create(&self, user: User) -> StoreResult<User> {
        let mut users = self.users.write().await;
        if users.values().any(|existing| existing.email == user.email) {
            return Err(StoreError::Conflict);
        }
        users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn get_by_id(&self, id: Uuid) -> StoreResult<User> {
        self.users
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn get_by_email(&self, email: &str) -> StoreResult<User> {
        self.users
            .read()
            .await
            .values()
            .find(|user| user.email == email)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn exists_by_email(&self, email: &str) -> StoreResult<bool> {
        Ok(self.users.read().await.values().any(|user| user.email == email))
    }

    async fn update(&self, mut user: User) -> StoreResult<User> {
        let mut users = self.users.write().await;
        if !users.contains_key(&user.id) {
            return Err(StoreError::NotFound);
        }
        if users
            .values()
            .any(|existing| existing.id != user.id && existing.email == user.email)
        {
            return Err(StoreError::Conflict);
        }
        user.updated_at = Utc::now();
        users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn delete(&self, id: Uuid) -> StoreResult<()> {
        self.users
            .write()
            .await
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::NotFound)
    }

    async fn list(&self, page: PageRequest) -> StoreResult<Page<User>> {
        let mut users: Vec<User> = self.users.read().await.values().cloned().collect();
        users.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(paginate(users, page))
    }
}

fn matches_filters(service: &Service, params: &ListParams) -> bool {
    if let Some(name) = &params.name {
        if service.name.to_lowercase() != name.to_lowercase() {
            return false;
        }
    }
    if let Some(search) = &params.search {
        let needle = search.to_lowercase();
        if !service.name.to_lowercase().contains(&needle)
            && !service.description.to_lowercase().contains(&needle)
        {
            return false;
        }
    }
    true
}

fn compare_services(a: &Service, b: &Service, sort: SortField) -> Ordering {
    match sort {
        SortField::Name => a.name.cmp(&b.name),
        SortField::CreatedAt => a.created_at.cmp(&b.created_at),
        SortField::UpdatedAt => a.updated_at.cmp(&b.updated_at),
    }
}

#[async_trait]
impl ServiceRepository for MemoryStore {
    async fn create(&self, service: Service) -> StoreResult<Service> {
        self.services
            .write()
            .await
            .insert(service.id, service.clone());
        Ok(service)
    }

    async fn get_by_id(&self, id: Uuid) -> StoreResult<Service> {
        self.services
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn update(&self, mut service: Service) -> StoreResult<Service> {
        let mut services = self.services.write().await;
        let existing = services.get_mut(&service.id).ok_or(StoreError::NotFound)?;
        service.created_at = existing.created_at;
        service.updated_at = Utc::now();
        *existing = service.clone();
        Ok(service)
    }

    async fn delete(&self, id: Uuid) -> StoreResult<()> {
        self.services
            .write()
            .await
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::NotFound)
    }

    async fn list(&self, params: &ListParams) -> StoreResult<Page<Service>> {
        let mut services: Vec<Service> = self
            .services
            .read()
            .await
            .values()
            .filter(|service| matches_filters(service, params))
            .cloned()
            .collect();

        services.sort_by(|a, b| {
            let ordering = compare_services(a, b, params.sort).then(a.id.cmp(&b.id));
            match params.order {
                SortOrder::Asc => ordering,
                SortOrder::Desc => ordering.reverse(),
            }
        });

        Ok(paginate(services, params.page))
    }
}

#[async_trait]
impl ServiceVersionRepository for MemoryStore {
    async fn create(&self, version: ServiceVersion) -> StoreResult<ServiceVersion> {
        let mut versions = self.versions.write().await;
        if versions
            .values()
            .any(|v| v.service_id == version.service_id && v.revision == version.revision)
        {
            return Err(StoreError::Conflict);
        }
        versions.insert(version.id, version.clone());
        Ok(version)
    }

    async fn get_by_revision(&self, service_id: Uuid, revision: u32) -> StoreResult<ServiceVersion> {
        self.versions
            .read()
            .await
            .values()
            .find(|v| v.service_id == service_id && v.revision == revision)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn list_by_service(
        &self,
        service_id: Uuid,
        page: PageRequest,
    ) -> StoreResult<Page<ServiceVersion>> {
        let mut versions: Vec<ServiceVersion> = self
            .versions
            .read()
            .await
            .values()
            .filter(|v| v.service_id == service_id)
            .cloned()
            .collect();
        versions.sort_by(|a, b| b.revision.cmp(&a.revision));
        Ok(paginate(versions, page))
    }

    async fn count_by_service(&self, service_id: Uuid) -> StoreResult<u64> {
        Ok(self
            .versions
            .read()
            .await
            .values()
            .filter(|v| v.service_id == service_id)
            .count() as u64)
    }

    async fn delete_by_service(&self, service_id: Uuid) -> StoreResult<()> {
        self.versions
            .write()
            .await
            .retain(|_, v| v.service_id != service_id);
        Ok(())
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}

//! Persistence collaborators.
//!
//! The rest of the crate only sees the repository traits; [`Database`] bundles
//! one backend behind them. Two backends exist:
//!
//! - [`MemoryStore`]: process-local maps, used for development and tests
//! - [`PostgrestStore`]: a Supabase/PostgREST document store over HTTP

pub mod memory;
pub mod postgrest;

pub use self::memory::MemoryStore;
pub use self::postgrest::PostgrestStore;

use crate::{
    models::{ListParams, Page, PageRequest, Service, ServiceVersion, User},
    utils::{
        config::{DatabaseBackend, DatabaseConfig},
        ApiError,
    },
};
use async_trait::async_trait;
use std::{fmt, sync::Arc};
use uuid::Uuid;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug)]
pub enum StoreError {
    NotFound,
    InvalidId,
    /// A uniqueness constraint was violated
    Conflict,
    Backend(anyhow::Error),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::NotFound => f.write_str("resource not found"),
            StoreError::InvalidId => f.write_str("invalid ID format"),
            StoreError::Conflict => f.write_str("resource already exists"),
            StoreError::Backend(err) => write!(f, "storage backend error: {err}"),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Backend(err.into())
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => ApiError::not_found("resource not found"),
            StoreError::InvalidId => ApiError::bad_request("invalid id format"),
            StoreError::Conflict => ApiError::conflict("resource already exists"),
            StoreError::Backend(err) => ApiError::from(err),
        }
    }
}

/// Parse a path identifier, rejecting anything that is not a UUID
pub fn parse_id(raw: &str) -> StoreResult<Uuid> {
    Uuid::parse_str(raw).map_err(|_| StoreError::InvalidId)
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Fails with `Conflict` when the email is taken
    async fn create(&self, user: User) -> StoreResult<User>;
    async fn get_by_id(&self, id: Uuid) -> StoreResult<User>;
    async fn get_by_email(&self, email: &str) -> StoreResult<User>;
    async fn exists_by_email(&self, email: &str) -> StoreResult<bool>;
    async fn update(&self, user: User) -> StoreResult<User>;
    async fn delete(&self, id: Uuid) -> StoreResult<()>;
    /// Users ordered by creation time, oldest first
    async fn list(&self, page: PageRequest) -> StoreResult<Page<User>>;
}

#[async_trait]
pub trait ServiceRepository: Send + Sync {
    async fn create(&self, service: Service) -> StoreResult<Service>;
    async fn get_by_id(&self, id: Uuid) -> StoreResult<Service>;
    async fn update(&self, service: Service) -> StoreResult<Service>;
    async fn delete(&self, id: Uuid) -> StoreResult<()>;
    async fn list(&self, params: &ListParams) -> StoreResult<Page<Service>>;
}

#[async_trait]
pub trait ServiceVersionRepository: Send + Sync {
    /// Fails with `Conflict` when the revision already exists for the service
    async fn create(&self, version: ServiceVersion) -> StoreResult<ServiceVersion>;
    async fn get_by_revision(&self, service_id: Uuid, revision: u32) -> StoreResult<ServiceVersion>;
    /// Snapshots of one service, newest revision first
    async fn list_by_service(
        &self,
        service_id: Uuid,
        page: PageRequest,
    ) -> StoreResult<Page<ServiceVersion>>;
    async fn count_by_service(&self, service_id: Uuid) -> StoreResult<u64>;
    async fn delete_by_service(&self, service_id: Uuid) -> StoreResult<()>;
}

/// A backend that provides every repository
#[async_trait]
pub trait Store: UserRepository + ServiceRepository + ServiceVersionRepository {
    /// Cheap round trip used by the health endpoint
    async fn ping(&self) -> StoreResult<()>;
}

/// Repository handles shared by every request
#[derive(Clone)]
pub struct Database {
    pub users: Arc<dyn UserRepository>,
    pub services: Arc<dyn ServiceRepository>,
    pub versions: Arc<dyn ServiceVersionRepository>,
    health: Arc<dyn Store>,
}

impl Database {
    /// Connect to the backend selected in configuration
    pub fn connect(config: &DatabaseConfig) -> anyhow::Result<Self> {
        match config.backend {
            DatabaseBackend::Memory => Ok(Self::in_memory()),
            DatabaseBackend::Postgrest => Ok(Self::from_store(Arc::new(PostgrestStore::new(
                &config.supabase_url,
                &config.supabase_key,
            )?))),
        }
    }

    pub fn in_memory() -> Self {
        Self::from_store(Arc::new(MemoryStore::new()))
    }

    pub fn from_store<S: Store + 'static>(store: Arc<S>) -> Self {
        Self {
            users: store.clone(),
            services: store.clone(),
            versions: store.clone(),
            health: store,
        }
    }

    pub async fn ping(&self) -> StoreResult<()> {
        self.health.ping().await
    }
}

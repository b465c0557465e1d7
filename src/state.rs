use crate::{
    auth::{AuthGate, AuthService, PasswordHasher, TokenCodec},
    catalog::CatalogService,
    db::Database,
    users::UserService,
    utils::Config,
};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub auth_service: Arc<AuthService>,
    pub gate: Arc<AuthGate>,
    pub catalog: Arc<CatalogService>,
    pub users: Arc<UserService>,
    pub config: Arc<Config>,
}

impl AppState {
    /// Wire every service from one immutable configuration
    pub fn new(db: Database, config: Arc<Config>) -> anyhow::Result<Self> {
        let codec = Arc::new(TokenCodec::new(&config.jwt));
        let hasher = PasswordHasher::from_config(&config.auth)?;

        Ok(Self {
            auth_service: Arc::new(AuthService::new(db.clone(), codec.clone(), hasher.clone())?),
            gate: Arc::new(AuthGate::new(codec, config.auth.api_keys.clone())),
            catalog: Arc::new(CatalogService::new(db.clone())),
            users: Arc::new(UserService::new(db.clone(), hasher)),
            db,
            config,
        })
    }
}

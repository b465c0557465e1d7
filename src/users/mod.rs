//! Account management behind the `/users` routes.

use crate::{
    auth::PasswordHasher,
    db::{Database, StoreError},
    models::{
        user::{normalize_email, validate_email, validate_password},
        ChangePasswordRequest, CreateUserRequest, Page, PageRequest, Role, UpdateUserRequest,
        User, UserResponse,
    },
    utils::{config::BootstrapAdmin, ApiError, ApiResult},
};
use uuid::Uuid;

fn email_conflict(err: StoreError) -> ApiError {
    match err {
        StoreError::Conflict => ApiError::conflict("email already exists"),
        other => other.into(),
    }
}

pub struct UserService {
    db: Database,
    hasher: PasswordHasher,
}

impl UserService {
    pub fn new(db: Database, hasher: PasswordHasher) -> Self {
        Self { db, hasher }
    }

    pub async fn create(&self, request: CreateUserRequest) -> ApiResult<UserResponse> {
        let role = request.validate()?;
        let email = normalize_email(&request.email);

        if self.db.users.exists_by_email(&email).await? {
            return Err(ApiError::conflict("email already exists"));
        }

        let password_hash = self.hasher.hash(&request.password).await?;
        let user = User::new(
            &email,
            password_hash,
            &request.first_name,
            &request.last_name,
            role,
        );
        let user = self.db.users.create(user).await.map_err(email_conflict)?;

        tracing::info!(user_id = %user.id, role = %user.role, "Created user");
        Ok(user.into())
    }

    pub async fn get(&self, id: Uuid) -> ApiResult<UserResponse> {
        Ok(self.db.users.get_by_id(id).await?.into())
    }

    pub async fn list(&self, page: PageRequest) -> ApiResult<Page<UserResponse>> {
        Ok(self.db.users.list(page).await?.map(UserResponse::from))
    }

    pub async fn update(&self, id: Uuid, request: UpdateUserRequest) -> ApiResult<UserResponse> {
        let role = request.validate()?;
        let mut user = self.db.users.get_by_id(id).await?;

        let email = normalize_email(&request.email);
        if email != user.email && self.db.users.exists_by_email(&email).await? {
            return Err(ApiError::conflict("email already exists"));
        }

        user.email = email;
        user.first_name = request.first_name.trim().to_string();
        user.last_name = request.last_name.trim().to_string();
        user.role = role;
        if let Some(active) = request.active {
            user.active = active;
        }

        let user = self.db.users.update(user).await.map_err(email_conflict)?;
        Ok(user.into())
    }

    pub async fn delete(&self, id: Uuid) -> ApiResult<()> {
        self.db.users.delete(id).await?;
        tracing::info!(user_id = %id, "Deleted user");
        Ok(())
    }

    /// Requires the current password; a wrong one is reported like a failed login
    pub async fn change_password(&self, user_id: Uuid, request: ChangePasswordRequest) -> ApiResult<()> {
        request.validate()?;
        let mut user = self.db.users.get_by_id(user_id).await?;

        if !self
            .hasher
            .verify(&request.current_password, &user.password_hash)
            .await
        {
            return Err(ApiError::unauthorized("invalid credentials"));
        }

        user.password_hash = self.hasher.hash(&request.new_password).await?;
        self.db.users.update(user).await?;
        Ok(())
    }

    /// Seed an administrator unless the email is already taken
    pub async fn ensure_admin(&self, admin: &BootstrapAdmin) -> anyhow::Result<()> {
        validate_email(&admin.email)?;
        validate_password(&admin.password)?;

        let email = normalize_email(&admin.email);
        if self.db.users.exists_by_email(&email).await? {
            tracing::debug!("Bootstrap admin already present");
            return Ok(());
        }

        let password_hash = self.hasher.hash(&admin.password).await?;
        let user = User::new(&email, password_hash, "Admin", "", Role::Admin);
        match self.db.users.create(user).await {
            Ok(user) => tracing::info!(user_id = %user.id, "Created bootstrap admin"),
            Err(StoreError::Conflict) => tracing::debug!("Bootstrap admin already present"),
            Err(err) => return Err(err.into()),
        }
        Ok(())
    }
}

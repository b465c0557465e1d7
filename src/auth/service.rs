use super::{credentials::PasswordHasher, token::TokenCodec, TokenError};
use crate::{
    db::{Database, StoreError},
    models::{
        user::normalize_email, AuthResponse, LoginRequest, RegisterRequest, Role, User,
        UserResponse, ValidationError,
    },
    utils::ApiError,
};
use std::{fmt, sync::Arc};
use uuid::Uuid;

#[derive(Debug)]
pub enum AuthError {
    /// Wrong password, unknown or inactive account, unusable refresh token
    InvalidCredentials,
    EmailAlreadyExists,
    Validation(ValidationError),
    Store(StoreError),
    Internal(anyhow::Error),
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthError::InvalidCredentials => f.write_str("invalid credentials"),
            AuthError::EmailAlreadyExists => f.write_str("email already exists"),
            AuthError::Validation(err) => write!(f, "{err}"),
            AuthError::Store(err) => write!(f, "{err}"),
            AuthError::Internal(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for AuthError {}

impl From<ValidationError> for AuthError {
    fn from(err: ValidationError) -> Self {
        AuthError::Validation(err)
    }
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict => AuthError::EmailAlreadyExists,
            other => AuthError::Store(other),
        }
    }
}

impl From<TokenError> for AuthError {
    fn from(err: TokenError) -> Self {
        AuthError::Internal(err.into())
    }
}

impl From<anyhow::Error> for AuthError {
    fn from(err: anyhow::Error) -> Self {
        AuthError::Internal(err)
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials => ApiError::unauthorized("invalid credentials"),
            AuthError::EmailAlreadyExists => ApiError::conflict("email already exists"),
            AuthError::Validation(err) => err.into(),
            AuthError::Store(err) => err.into(),
            AuthError::Internal(err) => err.into(),
        }
    }
}

pub type AuthResult<T> = Result<T, AuthError>;

/// Turns credentials into token pairs
pub struct AuthService {
    db: Database,
    codec: Arc<TokenCodec>,
    hasher: PasswordHasher,
    /// Verified against when the account does not exist; same cost parameters as real hashes
    dummy_hash: String,
}

impl AuthService {
    pub fn new(db: Database, codec: Arc<TokenCodec>, hasher: PasswordHasher) -> anyhow::Result<Self> {
        let dummy_hash = hasher.hash_blocking(&Uuid::new_v4().to_string())?;
        Ok(Self {
            db,
            codec,
            hasher,
            dummy_hash,
        })
    }

    /// Create an account with the default role and sign it in
    pub async fn register(&self, request: RegisterRequest) -> AuthResult<AuthResponse> {
        request.validate()?;
        let email = normalize_email(&request.email);

        if self.db.users.exists_by_email(&email).await? {
            return Err(AuthError::EmailAlreadyExists);
        }

        let password_hash = self.hasher.hash(&request.password).await?;
        let user = User::new(
            &email,
            password_hash,
            &request.first_name,
            &request.last_name,
            Role::User,
        );
        // The store still rejects a racing duplicate with a conflict
        let user = self.db.users.create(user).await?;

        tracing::info!(user_id = %user.id, "Registered user");
        self.issue_tokens(&user)
    }

    pub async fn login(&self, request: LoginRequest) -> AuthResult<AuthResponse> {
        request.validate()?;
        let email = normalize_email(&request.email);
        let user = match self.db.users.get_by_email(&email).await {
            Ok(user) => user,
            Err(StoreError::NotFound) => {
                // Spend the same hashing effort as a real check
                self.hasher.verify(&request.password, &self.dummy_hash).await;
                return Err(AuthError::InvalidCredentials);
            }
            Err(err) => return Err(err.into()),
        };

        let password_ok = self.hasher.verify(&request.password, &user.password_hash).await;
        if !user.active || !password_ok {
            tracing::debug!(user_id = %user.id, "Login rejected");
            return Err(AuthError::InvalidCredentials);
        }

        self.issue_tokens(&user)
    }

    /// Exchange a refresh token for a new pair; the account is re-checked
    pub async fn refresh(&self, refresh_token: &str) -> AuthResult<AuthResponse> {
        let claims = self.codec.verify_refresh(refresh_token).map_err(|err| {
            tracing::debug!(reason = %err, "Refresh token rejected");
            AuthError::InvalidCredentials
        })?;

        let user = match self.db.users.get_by_id(claims.user_id).await {
            Ok(user) if user.active => user,
            Ok(_) | Err(StoreError::NotFound) => return Err(AuthError::InvalidCredentials),
            Err(err) => return Err(err.into()),
        };

        self.issue_tokens(&user)
    }

    fn issue_tokens(&self, user: &User) -> AuthResult<AuthResponse> {
        let access_token = self.codec.issue_access(user.id, &user.email, user.role)?;
        let refresh_token = self.codec.issue_refresh(user.id, &user.email, user.role)?;

        Ok(AuthResponse {
            access_token,
            refresh_token,
            token_type: "Bearer".to_string(),
            expires_in: self.codec.access_ttl_seconds(),
            user: UserResponse::from(user),
        })
    }
}

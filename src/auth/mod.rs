//! Authentication and authorization core.
//!
//! Requests authenticate with either a static API key (`X-API-Key`) or an
//! HMAC-signed access token (`Authorization: Bearer`). The [`AuthGate`] turns
//! those headers into an [`Identity`] stored in the request extensions;
//! handlers read it back with `Extension<Identity>` and apply the coarse role
//! and ownership checks below.

pub mod credentials;
pub mod middleware;
pub mod service;
pub mod token;

pub use credentials::{match_api_key, PasswordHasher};
pub use middleware::{auth_middleware, AuthGate, AuthType, Identity, UserIdentity};
pub use service::{AuthError, AuthService};
pub use token::{Claims, TokenCodec, TokenError, TokenType};

use crate::utils::ApiError;
use uuid::Uuid;

/// Admin-only operations; API-key identities have no role
pub fn require_admin(identity: &Identity) -> Result<(), ApiError> {
    if identity.is_admin() {
        Ok(())
    } else {
        Err(ApiError::forbidden("admin access required"))
    }
}

/// Operations on a user account allowed to admins and the account owner
pub fn require_self_or_admin(identity: &Identity, user_id: Uuid) -> Result<(), ApiError> {
    if identity.is_admin() || identity.user_id() == Some(user_id) {
        Ok(())
    } else {
        Err(ApiError::forbidden("access denied"))
    }
}

/// The signed-in user; API-key callers are not users
pub fn require_user(identity: &Identity) -> Result<&UserIdentity, ApiError> {
    identity
        .user()
        .ok_or_else(|| ApiError::unauthorized("authentication required"))
}

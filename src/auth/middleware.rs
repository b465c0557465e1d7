use super::{
    credentials::match_api_key,
    token::{TokenCodec, TokenError},
};
use crate::{models::Role, utils::ApiError};
use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use uuid::Uuid;

pub const HEALTH_PATH: &str = "/health";
pub const API_KEY_HEADER: &str = "x-api-key";
const BEARER_PREFIX: &str = "Bearer ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthType {
    ApiKey,
    Jwt,
}

/// Authenticated user carried by an access token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserIdentity {
    pub user_id: Uuid,
    pub email: String,
    pub role: Role,
}

/// Who is making the request. Attached once by the gate, read-only after.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identity {
    /// Position of the matching key in the configured list
    ApiKey { index: usize },
    User(UserIdentity),
}

impl Identity {
    pub fn auth_type(&self) -> AuthType {
        match self {
            Identity::ApiKey { .. } => AuthType::ApiKey,
            Identity::User(_) => AuthType::Jwt,
        }
    }

    pub fn user(&self) -> Option<&UserIdentity> {
        match self {
            Identity::User(user) => Some(user),
            Identity::ApiKey { .. } => None,
        }
    }

    pub fn user_id(&self) -> Option<Uuid> {
        self.user().map(|user| user.user_id)
    }

    /// API-key identities carry no role
    pub fn role(&self) -> Option<Role> {
        self.user().map(|user| user.role)
    }

    pub fn is_admin(&self) -> bool {
        self.role() == Some(Role::Admin)
    }
}

/// Decides whether a request proceeds and with which identity
pub struct AuthGate {
    codec: Arc<TokenCodec>,
    api_keys: Vec<String>,
}

impl AuthGate {
    pub fn new(codec: Arc<TokenCodec>, api_keys: Vec<String>) -> Self {
        Self { codec, api_keys }
    }

    /// `Ok(None)` means the path needs no credentials
    pub fn authenticate(&self, path: &str, headers: &HeaderMap) -> Result<Option<Identity>, ApiError> {
        if path == HEALTH_PATH {
            return Ok(None);
        }

        if let Some(token) = extract_bearer_token(headers) {
            // A bearer token never falls back to the API key
            let verified = token
                .ok_or(TokenError::Invalid)
                .and_then(|token| self.codec.verify_access(token));
            return match verified {
                Ok(claims) => Ok(Some(Identity::User(UserIdentity {
                    user_id: claims.user_id,
                    email: claims.email,
                    role: claims.role,
                }))),
                Err(err) => {
                    tracing::warn!(path, reason = %err, "Rejected bearer token");
                    Err(ApiError::unauthorized("invalid or expired token"))
                }
            };
        }

        if let Some(key) = extract_api_key(headers) {
            if self.api_keys.is_empty() {
                tracing::warn!(path, "API key presented but none are configured");
                return Err(ApiError::unauthorized("invalid credentials"));
            }
            return match match_api_key(key, &self.api_keys) {
                Some(index) => Ok(Some(Identity::ApiKey { index })),
                None => {
                    tracing::warn!(path, "Rejected API key");
                    Err(ApiError::unauthorized("invalid credentials"))
                }
            };
        }

        tracing::debug!(path, "Request without credentials");
        Err(ApiError::unauthorized("authentication required"))
    }
}

/// Extract the token from `Authorization: Bearer <token>`.
///
/// The outer `Option` says whether the bearer scheme is present at all; the
/// inner one is `None` when the token bytes are not valid UTF-8.
pub fn extract_bearer_token(headers: &HeaderMap) -> Option<Option<&str>> {
    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|value| value.as_bytes().strip_prefix(BEARER_PREFIX.as_bytes()))
        .map(|token| std::str::from_utf8(token).ok())
}

fn extract_api_key(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(API_KEY_HEADER)
        .and_then(|value| value.to_str().ok())
        .filter(|key| !key.is_empty())
}

/// Authentication middleware
pub async fn auth_middleware(
    State(gate): State<Arc<AuthGate>>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if let Some(identity) = gate.authenticate(request.uri().path(), request.headers())? {
        request.extensions_mut().insert(identity);
    }
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::config::JwtConfig;
    use axum::http::{header::AUTHORIZATION, HeaderValue, StatusCode};

    fn codec() -> Arc<TokenCodec> {
        Arc::new(TokenCodec::new(&JwtConfig {
            secret: "gate-secret".to_string(),
            issuer: "services-api".to_string(),
            access_ttl_minutes: 15,
            refresh_ttl_hours: 1,
        }))
    }

    fn gate(keys: &[&str]) -> AuthGate {
        AuthGate::new(codec(), keys.iter().map(|k| k.to_string()).collect())
    }

    fn headers(pairs: &[(&'static str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_str(value).unwrap());
        }
        map
    }

    fn rejection(result: Result<Option<Identity>, ApiError>) -> ApiError {
        let err = result.unwrap_err();
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(err.error, "unauthorized");
        err
    }

    #[test]
    fn test_health_bypasses_authentication() {
        let gate = gate(&[]);
        assert_eq!(gate.authenticate("/health", &HeaderMap::new()).unwrap(), None);
        let bad = headers(&[("authorization", "Bearer garbage")]);
        assert_eq!(gate.authenticate("/health", &bad).unwrap(), None);
    }

    #[test]
    fn test_api_keys_resolve_to_their_index() {
        let gate = gate(&["k1", "k2"]);
        let path = "/api/v1/services";

        assert_eq!(
            gate.authenticate(path, &headers(&[("x-api-key", "k1")])).unwrap(),
            Some(Identity::ApiKey { index: 0 })
        );
        assert_eq!(
            gate.authenticate(path, &headers(&[("x-api-key", "k2")])).unwrap(),
            Some(Identity::ApiKey { index: 1 })
        );
        let err = rejection(gate.authenticate(path, &headers(&[("x-api-key", "k3")])));
        assert_eq!(err.message, "invalid credentials");
    }

    #[test]
    fn test_no_configured_keys_fails_closed() {
        let gate = gate(&[]);
        for key in ["k1", "anything", " "] {
            rejection(gate.authenticate("/api/v1/services", &headers(&[("x-api-key", key)])));
        }
    }

    #[test]
    fn test_missing_credentials() {
        let gate = gate(&["k1"]);
        let err = rejection(gate.authenticate("/api/v1/services", &HeaderMap::new()));
        assert_eq!(err.message, "authentication required");

        let err = rejection(gate.authenticate("/api/v1/services", &headers(&[("x-api-key", "")])));
        assert_eq!(err.message, "authentication required");
    }

    #[test]
    fn test_access_token_attaches_user() {
        let gate = gate(&[]);
        let user_id = Uuid::new_v4();
        let token = gate.codec.issue_access(user_id, "ann@example.com", Role::Admin).unwrap();

        let identity = gate
            .authenticate("/api/v1/users", &headers(&[("authorization", &format!("Bearer {token}"))]))
            .unwrap()
            .unwrap();

        assert_eq!(identity.auth_type(), AuthType::Jwt);
        assert_eq!(identity.user_id(), Some(user_id));
        assert_eq!(identity.role(), Some(Role::Admin));
        assert!(identity.is_admin());
    }

    #[test]
    fn test_refresh_token_rejected_as_bearer() {
        let gate = gate(&["k1"]);
        let token = gate.codec.issue_refresh(Uuid::new_v4(), "u1@example.com", Role::User).unwrap();

        let err = rejection(gate.authenticate(
            "/api/v1/services",
            &headers(&[("authorization", &format!("Bearer {token}"))]),
        ));
        assert_eq!(err.message, "invalid or expired token");
    }

    #[test]
    fn test_bad_bearer_does_not_fall_back_to_api_key() {
        let gate = gate(&["k1"]);
        let mut map = headers(&[("x-api-key", "k1")]);
        map.insert(AUTHORIZATION, HeaderValue::from_static("Bearer not-a-token"));

        rejection(gate.authenticate("/api/v1/services", &map));
    }

    #[test]
    fn test_non_utf8_bearer_does_not_fall_back_to_api_key() {
        let gate = gate(&["k1"]);
        let mut map = headers(&[("x-api-key", "k1")]);
        map.insert(
            AUTHORIZATION,
            HeaderValue::from_bytes(b"Bearer \xffgarbage").unwrap(),
        );

        let err = rejection(gate.authenticate("/api/v1/services", &map));
        assert_eq!(err.message, "invalid or expired token");
    }

    #[test]
    fn test_extract_bearer_token() {
        assert_eq!(extract_bearer_token(&HeaderMap::new()), None);
        assert_eq!(
            extract_bearer_token(&headers(&[("authorization", "Basic abc")])),
            None
        );
        assert_eq!(
            extract_bearer_token(&headers(&[("authorization", "Bearer abc")])),
            Some(Some("abc"))
        );

        let mut map = HeaderMap::new();
        map.insert(AUTHORIZATION, HeaderValue::from_bytes(b"Bearer \xfe").unwrap());
        assert_eq!(extract_bearer_token(&map), Some(None));
    }

    #[test]
    fn test_non_bearer_authorization_uses_api_key() {
        let gate = gate(&["k1"]);
        let map = headers(&[("authorization", "Basic Zm9vOmJhcg=="), ("x-api-key", "k1")]);
        assert_eq!(
            gate.authenticate("/api/v1/services", &map).unwrap(),
            Some(Identity::ApiKey { index: 0 })
        );
    }

    #[test]
    fn test_api_key_identity_has_no_user() {
        let identity = Identity::ApiKey { index: 3 };
        assert_eq!(identity.auth_type(), AuthType::ApiKey);
        assert_eq!(identity.user_id(), None);
        assert_eq!(identity.role(), None);
        assert!(!identity.is_admin());
    }
}

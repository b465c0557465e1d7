use super::{check_length, ValidationError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use uuid::Uuid;
use validator::ValidateEmail;

pub const EMAIL_MAX_LEN: u64 = 255;
pub const PASSWORD_MIN_LEN: u64 = 8;
pub const PASSWORD_MAX_LEN: u64 = 72;
pub const NAME_MAX_LEN: u64 = 100;

/// Coarse authorization role carried in access tokens
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            _ => Err(ValidationError::new("role", "invalid role")),
        }
    }
}

/// Stored user record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// A fresh active account; `password_hash` must already be hashed
    pub fn new(
        email: &str,
        password_hash: String,
        first_name: &str,
        last_name: &str,
        role: Role,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            email: normalize_email(email),
            password_hash,
            first_name: first_name.trim().to_string(),
            last_name: last_name.trim().to_string(),
            role,
            active: true,
            created_at: now,
            updated_at: now,
        }
    }
}

/// User as returned by the API; never carries the password hash
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            role: user.role,
            active: user.active,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self::from(&user)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
}

impl RegisterRequest {
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_email(&self.email)?;
        validate_password(&self.password)?;
        validate_names(&self.first_name, &self.last_name)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

impl LoginRequest {
    /// Presence only; anything else is decided by the credential check
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.email.is_empty() {
            return Err(ValidationError::new("email", "email is required"));
        }
        if self.password.is_empty() {
            return Err(ValidationError::new("password", "password is required"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RefreshTokenRequest {
    #[serde(default)]
    pub refresh_token: String,
}

/// Token bundle returned by register, login and refresh
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub user: UserResponse,
}

/// Admin request to create a user
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateUserRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub role: Option<String>,
}

impl CreateUserRequest {
    /// Validates the request and resolves the role, defaulting to `user`
    pub fn validate(&self) -> Result<Role, ValidationError> {
        validate_email(&self.email)?;
        validate_password(&self.password)?;
        validate_names(&self.first_name, &self.last_name)?;
        match self.role.as_deref() {
            None | Some("") => Ok(Role::User),
            Some(role) => role.parse(),
        }
    }
}

/// Admin request to update a user
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateUserRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub active: Option<bool>,
}

impl UpdateUserRequest {
    pub fn validate(&self) -> Result<Role, ValidationError> {
        validate_email(&self.email)?;
        validate_names(&self.first_name, &self.last_name)?;
        self.role.parse()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChangePasswordRequest {
    #[serde(default)]
    pub current_password: String,
    #[serde(default)]
    pub new_password: String,
}

impl ChangePasswordRequest {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.current_password.is_empty() {
            return Err(ValidationError::new("current_password", "password is required"));
        }
        validate_password(&self.new_password)
    }
}

/// Emails are compared and stored lower-cased
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub fn validate_email(email: &str) -> Result<(), ValidationError> {
    if email.is_empty() {
        return Err(ValidationError::new("email", "email is required"));
    }
    check_length(
        email,
        None,
        Some(EMAIL_MAX_LEN),
        "email",
        "email must be at most 255 characters",
    )?;
    if !email.validate_email() {
        return Err(ValidationError::new("email", "email format is invalid"));
    }
    Ok(())
}

pub fn validate_password(password: &str) -> Result<(), ValidationError> {
    if password.is_empty() {
        return Err(ValidationError::new("password", "password is required"));
    }
    check_length(
        password,
        Some(PASSWORD_MIN_LEN),
        None,
        "password",
        "password must be at least 8 characters",
    )?;
    check_length(
        password,
        None,
        Some(PASSWORD_MAX_LEN),
        "password",
        "password must be at most 72 characters",
    )
}

fn validate_names(first_name: &str, last_name: &str) -> Result<(), ValidationError> {
    if first_name.trim().is_empty() {
        return Err(ValidationError::new("first_name", "first name is required"));
    }
    check_length(
        first_name,
        None,
        Some(NAME_MAX_LEN),
        "first_name",
        "first name must be at most 100 characters",
    )?;
    check_length(
        last_name,
        None,
        Some(NAME_MAX_LEN),
        "last_name",
        "last name must be at most 100 characters",
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn register(email: &str, password: &str, first: &str, last: &str) -> RegisterRequest {
        RegisterRequest {
            email: email.to_string(),
            password: password.to_string(),
            first_name: first.to_string(),
            last_name: last.to_string(),
        }
    }

    #[test]
    fn test_register_validation_reports_first_failing_field() {
        let cases = [
            (register("", "", "", ""), "email is required"),
            (
                register(&format!("{}@example.com", "a".repeat(250)), "password1", "A", ""),
                "email must be at most 255 characters",
            ),
            (register("not-an-email", "password1", "A", ""), "email format is invalid"),
            (register("a@example.com", "", "A", ""), "password is required"),
            (
                register("a@example.com", "short", "A", ""),
                "password must be at least 8 characters",
            ),
            (
                register("a@example.com", &"p".repeat(73), "A", ""),
                "password must be at most 72 characters",
            ),
            (register("a@example.com", "password1", "   ", ""), "first name is required"),
            (
                register("a@example.com", "password1", &"f".repeat(101), ""),
                "first name must be at most 100 characters",
            ),
            (
                register("a@example.com", "password1", "Ann", &"l".repeat(101)),
                "last name must be at most 100 characters",
            ),
        ];

        for (request, expected) in cases {
            let err = request.validate().unwrap_err();
            assert_eq!(err.message, expected, "request: {:?}", request.email);
        }
    }

    #[test]
    fn test_register_validation_accepts_empty_last_name() {
        assert!(register("ann@example.com", "password1", "Ann", "").validate().is_ok());
    }

    #[test]
    fn test_create_user_role_defaults_and_rejects_unknown() {
        let mut request = CreateUserRequest {
            email: "bob@example.com".to_string(),
            password: "password1".to_string(),
            first_name: "Bob".to_string(),
            ..Default::default()
        };
        assert_eq!(request.validate().unwrap(), Role::User);

        request.role = Some("admin".to_string());
        assert_eq!(request.validate().unwrap(), Role::Admin);

        request.role = Some("root".to_string());
        assert_eq!(request.validate().unwrap_err().message, "invalid role");
    }

    #[test]
    fn test_user_response_has_no_password_hash() {
        let user = User::new("Ann@Example.com", "hash".to_string(), " Ann ", "Lee", Role::User);
        let body = serde_json::to_value(UserResponse::from(&user)).unwrap();

        assert!(body.get("password_hash").is_none());
        assert_eq!(body["email"], "ann@example.com");
        assert_eq!(body["first_name"], "Ann");
        assert_eq!(body["role"], "user");
        assert_eq!(body["active"], true);
    }
}

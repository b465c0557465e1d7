//! Domain records, request/response bodies and their validation rules.

pub mod pagination;
pub mod service;
pub mod user;

pub use pagination::{ListParams, Page, PageRequest, PaginationMetadata, SortField, SortOrder};
pub use service::{
    CreateServiceRequest, PatchServiceRequest, Service, ServiceResponse, ServiceVersion,
    ServiceVersionResponse, UpdateServiceRequest,
};
pub use user::{
    AuthResponse, ChangePasswordRequest, CreateUserRequest, LoginRequest, RefreshTokenRequest,
    RegisterRequest, Role, UpdateUserRequest, User, UserResponse,
};

use crate::utils::ApiError;
use serde::Serialize;
use std::fmt;
use validator::ValidateLength;

/// A rejected request field, reported to the client as a 400
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: &'static str,
}

impl ValidationError {
    pub const fn new(field: &'static str, message: &'static str) -> Self {
        Self { field, message }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message)
    }
}

impl std::error::Error for ValidationError {}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError::bad_request(err.message).with_details(serde_json::json!({ "field": err.field }))
    }
}

/// Fails with `message` unless `value` has between `min` and `max` characters
pub(crate) fn check_length(
    value: &str,
    min: Option<u64>,
    max: Option<u64>,
    field: &'static str,
    message: &'static str,
) -> Result<(), ValidationError> {
    if !<str as ValidateLength<u64>>::validate_length(value, min, max, None) {
        return Err(ValidationError::new(field, message));
    }
    Ok(())
}

use super::{check_length, ValidationError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const SERVICE_NAME_MAX_LEN: u64 = 255;
pub const SERVICE_DESCRIPTION_MAX_LEN: u64 = 1000;

/// A service in the organization's catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Service {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    /// Starts at 1 and increases with every update
    pub revision: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Service {
    pub fn new(name: String, description: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name,
            description,
            revision: 1,
            created_at: now,
            updated_at: now,
        }
    }

    /// Snapshot of the current revision
    pub fn snapshot(&self) -> ServiceVersion {
        ServiceVersion {
            id: Uuid::new_v4(),
            service_id: self.id,
            revision: self.revision,
            name: self.name.clone(),
            description: self.description.clone(),
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceResponse {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub revision: u32,
    pub version_count: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ServiceResponse {
    pub fn new(service: Service, version_count: u64) -> Self {
        Self {
            id: service.id,
            name: service.name,
            description: service.description,
            revision: service.revision,
            version_count,
            created_at: service.created_at,
            updated_at: service.updated_at,
        }
    }
}

/// Historical snapshot of a service at one revision
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceVersion {
    pub id: Uuid,
    pub service_id: Uuid,
    pub revision: u32,
    pub name: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

pub type ServiceVersionResponse = ServiceVersion;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateServiceRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
}

impl CreateServiceRequest {
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_name(&self.name)?;
        validate_description(&self.description)
    }
}

/// Full replacement; every field is required
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateServiceRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
}

impl UpdateServiceRequest {
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_name(&self.name)?;
        validate_description(&self.description)
    }
}

/// Partial update; absent fields are left untouched
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PatchServiceRequest {
    pub name: Option<String>,
    pub description: Option<String>,
}

impl PatchServiceRequest {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(name) = &self.name {
            validate_name(name)?;
        }
        if let Some(description) = &self.description {
            validate_description(description)?;
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.description.is_none()
    }
}

fn validate_name(name: &str) -> Result<(), ValidationError> {
    if name.is_empty() {
        return Err(ValidationError::new("name", "name is required"));
    }
    check_length(
        name,
        None,
        Some(SERVICE_NAME_MAX_LEN),
        "name",
        "name must be at most 255 characters",
    )
}

fn validate_description(description: &str) -> Result<(), ValidationError> {
    if description.is_empty() {
        return Err(ValidationError::new("description", "description is required"));
    }
    check_length(
        description,
        None,
        Some(SERVICE_DESCRIPTION_MAX_LEN),
        "description",
        "description must be at most 1000 characters",
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_validation() {
        let request = |name: &str, description: &str| CreateServiceRequest {
            name: name.to_string(),
            description: description.to_string(),
        };

        assert!(request("payments", "Handles payments").validate().is_ok());
        assert_eq!(request("", "x").validate().unwrap_err().message, "name is required");
        assert_eq!(
            request(&"n".repeat(256), "x").validate().unwrap_err().message,
            "name must be at most 255 characters"
        );
        assert_eq!(
            request("payments", "").validate().unwrap_err().message,
            "description is required"
        );
        assert_eq!(
            request("payments", &"d".repeat(1001)).validate().unwrap_err().message,
            "description must be at most 1000 characters"
        );
    }

    #[test]
    fn test_patch_validates_only_present_fields() {
        assert!(PatchServiceRequest::default().validate().is_ok());
        assert!(PatchServiceRequest::default().is_empty());

        let patch = PatchServiceRequest {
            name: Some(String::new()),
            description: None,
        };
        assert_eq!(patch.validate().unwrap_err().message, "name is required");
    }

    #[test]
    fn test_snapshot_copies_current_revision() {
        let mut service = Service::new("billing".to_string(), "Invoices".to_string());
        service.revision = 4;
        let snapshot = service.snapshot();

        assert_eq!(snapshot.service_id, service.id);
        assert_eq!(snapshot.revision, 4);
        assert_eq!(snapshot.name, "billing");
        assert_ne!(snapshot.id, service.id);
    }
}

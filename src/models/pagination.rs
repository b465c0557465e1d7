use super::ValidationError;
use serde::{Deserialize, Serialize};

pub const DEFAULT_PAGE: u32 = 1;
pub const DEFAULT_LIMIT: u32 = 20;
pub const MAX_LIMIT: u32 = 100;

/// Page number and size requested by a client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub limit: u32,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE,
            limit: DEFAULT_LIMIT,
        }
    }
}

impl PageRequest {
    /// Lenient parse: anything missing, non-numeric or non-positive falls back
    /// to the default, and the limit is capped at `MAX_LIMIT`.
    pub fn parse(page: Option<&str>, limit: Option<&str>) -> Self {
        let positive = |raw: Option<&str>| {
            raw.and_then(|value| value.trim().parse::<u32>().ok())
                .filter(|value| *value > 0)
        };

        Self {
            page: positive(page).unwrap_or(DEFAULT_PAGE),
            limit: positive(limit).unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT),
        }
    }

    pub fn offset(&self) -> usize {
        (self.page.saturating_sub(1) as usize) * self.limit as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationMetadata {
    pub total: u64,
    pub page: u32,
    pub limit: u32,
    pub total_pages: u32,
}

/// One page of results plus the metadata clients need to fetch the rest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub pagination: PaginationMetadata,
}

impl<T> Page<T> {
    pub fn new(data: Vec<T>, total: u64, request: PageRequest) -> Self {
        let limit = u64::from(request.limit.max(1));
        Self {
            data,
            pagination: PaginationMetadata {
                total,
                page: request.page,
                limit: request.limit,
                total_pages: total.div_ceil(limit) as u32,
            },
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            data: self.data.into_iter().map(f).collect(),
            pagination: self.pagination,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortField {
    Name,
    #[default]
    CreatedAt,
    UpdatedAt,
}

impl SortField {
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        match raw {
            "name" => Ok(SortField::Name),
            "created_at" => Ok(SortField::CreatedAt),
            "updated_at" => Ok(SortField::UpdatedAt),
            _ => Err(ValidationError::new("sort", "invalid sort field")),
        }
    }

    pub fn column(&self) -> &'static str {
        match self {
            SortField::Name => "name",
            SortField::CreatedAt => "created_at",
            SortField::UpdatedAt => "updated_at",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    /// `asc`/`ascending` sort ascending; anything else sorts descending
    pub fn parse(raw: &str) -> Self {
        match raw {
            "asc" | "ascending" => SortOrder::Asc,
            _ => SortOrder::Desc,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }
}

/// Filtering, sorting and paging for service listings
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListParams {
    /// Case-insensitive substring over name and description
    pub search: Option<String>,
    /// Case-insensitive exact name
    pub name: Option<String>,
    pub sort: SortField,
    pub order: SortOrder,
    pub page: PageRequest,
}

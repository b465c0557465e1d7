use super::{
    ServiceRepository, ServiceVersionRepository, Store, StoreError, StoreResult, UserRepository,
};
use crate::models::{ListParams, Page, PageRequest, Service, ServiceVersion, User};
use anyhow::anyhow;
use async_trait::async_trait;
use chrono::Utc;
use postgrest::Postgrest;
use serde::{de::DeserializeOwned, Serialize};
use uuid::Uuid;

const USERS: &str = "users";
const SERVICES: &str = "services";
const SERVICE_VERSIONS: &str = "service_versions";

/// Run a query builder and buffer the parts of the response we need
macro_rules! send {
    ($builder:expr) => {{
        let response = $builder
            .execute()
            .await
            .map_err(|err| StoreError::Backend(err.into()))?;
        let status = response.status().as_u16();
        let content_range = response
            .headers()
            .get("content-range")
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned);
        let body = response
            .text()
            .await
            .map_err(|err| StoreError::Backend(err.into()))?;
        Reply {
            status,
            content_range,
            body,
        }
    }};
}

/// Buffered PostgREST response
struct Reply {
    status: u16,
    content_range: Option<String>,
    body: String,
}

impl Reply {
    /// Decode the body into rows, mapping error statuses
    fn rows<T: DeserializeOwned>(&self) -> StoreResult<Vec<T>> {
        match self.status {
            409 => Err(StoreError::Conflict),
            // Page past the end of the table
            416 => Ok(Vec::new()),
            200..=299 if self.body.trim().is_empty() => Ok(Vec::new()),
            200..=299 => Ok(serde_json::from_str(&self.body)?),
            status => Err(StoreError::Backend(anyhow!(
                "postgrest returned {status}: {}",
                self.body
            ))),
        }
    }

    /// Rows plus the exact total from `Content-Range`
    fn counted_rows<T: DeserializeOwned>(&self) -> StoreResult<(Vec<T>, u64)> {
        let data = self.rows()?;
        let total = self
            .content_range
            .as_deref()
            .and_then(parse_content_range_total)
            .unwrap_or(data.len() as u64);
        Ok((data, total))
    }

    fn first_row<T: DeserializeOwned>(&self) -> StoreResult<T> {
        self.rows()?.into_iter().next().ok_or(StoreError::NotFound)
    }
}

/// Document store backed by a Supabase/PostgREST endpoint
#[derive(Clone)]
pub struct PostgrestStore {
    client: Postgrest,
}

impl PostgrestStore {
    pub fn new(supabase_url: &str, service_key: &str) -> anyhow::Result<Self> {
        if supabase_url.is_empty() {
            anyhow::bail!("SUPABASE_URL is required");
        }

        let client = Postgrest::new(format!("{}/rest/v1", supabase_url.trim_end_matches('/')))
            .insert_header("apikey", service_key)
            .insert_header("Authorization", format!("Bearer {}", service_key));

        Ok(Self { client })
    }

    async fn insert_one<T: Serialize + DeserializeOwned>(&self, table: &str, row: &T) -> StoreResult<T> {
        let body = serde_json::to_string(row)?;
        send!(self.client.from(table).insert(body)).first_row()
    }

    async fn fetch_one<T: DeserializeOwned>(&self, table: &str, column: &str, value: &str) -> StoreResult<T> {
        send!(self.client.from(table).select("*").eq(column, value)).first_row()
    }

    async fn update_one<T: Serialize + DeserializeOwned>(
        &self,
        table: &str,
        id: Uuid,
        row: &T,
    ) -> StoreResult<T> {
        let body = serde_json::to_string(row)?;
        send!(self.client.from(table).eq("id", id.to_string()).update(body)).first_row()
    }

    async fn delete_one(&self, table: &str, id: Uuid) -> StoreResult<()> {
        let deleted: Vec<serde_json::Value> =
            send!(self.client.from(table).eq("id", id.to_string()).delete()).rows()?;
        if deleted.is_empty() {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}

/// `0-19/55` and `*/0` both carry the total after the slash
pub(crate) fn parse_content_range_total(header: &str) -> Option<u64> {
    header.rsplit_once('/')?.1.trim().parse().ok()
}

/// Quote a value for use inside a PostgREST logical filter
pub(crate) fn quote_filter_value(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}

/// Pattern that matches `value` literally under `ilike`; `*` and `%` are both wildcards there
pub(crate) fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        if matches!(ch, '\\' | '%' | '_' | '*') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

/// Inclusive row range for a page, as PostgREST expects it
fn page_range(page: PageRequest) -> (usize, usize) {
    let low = page.offset();
    (low, low + page.limit.max(1) as usize - 1)
}

#[async_trait]
impl UserRepository for PostgrestStore {
    async fn create(&self, user: User) -> StoreResult<User> {
        self.insert_one(USERS, &user).await
    }

    async fn get_by_id(&self, id: Uuid) -> StoreResult<User> {
        self.fetch_one(USERS, "id", &id.to_string()).await
    }

    async fn get_by_email(&self, email: &str) -> StoreResult<User> {
        self.fetch_one(USERS, "email", email).await
    }

    async fn exists_by_email(&self, email: &str) -> StoreResult<bool> {
        let found: Vec<serde_json::Value> =
            send!(self.client.from(USERS).select("id").eq("email", email).limit(1)).rows()?;
        Ok(!found.is_empty())
    }

    async fn update(&self, mut user: User) -> StoreResult<User> {
        user.updated_at = Utc::now();
        self.update_one(USERS, user.id, &user).await
    }

    async fn delete(&self, id: Uuid) -> StoreResult<()> {
        self.delete_one(USERS, id).await
    }

    async fn list(&self, page: PageRequest) -> StoreResult<Page<User>> {
        let (low, high) = page_range(page);
        let (data, total) = send!(self
            .client
            .from(USERS)
            .select("*")
            .order("created_at.asc,id.asc")
            .range(low, high)
            .exact_count())
        .counted_rows()?;
        Ok(Page::new(data, total, page))
    }
}

#[async_trait]
impl ServiceRepository for PostgrestStore {
    async fn create(&self, service: Service) -> StoreResult<Service> {
        self.insert_one(SERVICES, &service).await
    }

    async fn get_by_id(&self, id: Uuid) -> StoreResult<Service> {
        self.fetch_one(SERVICES, "id", &id.to_string()).await
    }

    async fn update(&self, mut service: Service) -> StoreResult<Service> {
        service.updated_at = Utc::now();
        self.update_one(SERVICES, service.id, &service).await
    }

    async fn delete(&self, id: Uuid) -> StoreResult<()> {
        self.delete_one(SERVICES, id).await
    }

    async fn list(&self, params: &ListParams) -> StoreResult<Page<Service>> {
        let (low, high) = page_range(params.page);
        let direction = params.order.as_str();
        let order = format!("{}.{direction},id.{direction}", params.sort.column());

        let mut query = self
            .client
            .from(SERVICES)
            .select("*")
            .order(order)
            .range(low, high)
            .exact_count();

        if let Some(name) = &params.name {
            query = query.ilike("name", escape_like(name));
        }
        if let Some(search) = &params.search {
            let pattern = quote_filter_value(&format!("*{search}*"));
            query = query.or(format!("name.ilike.{pattern},description.ilike.{pattern}"));
        }

        let (data, total) = send!(query).counted_rows()?;
        Ok(Page::new(data, total, params.page))
    }
}

#[async_trait]
impl ServiceVersionRepository for PostgrestStore {
    async fn create(&self, version: ServiceVersion) -> StoreResult<ServiceVersion> {
        self.insert_one(SERVICE_VERSIONS, &version).await
    }

    async fn get_by_revision(&self, service_id: Uuid, revision: u32) -> StoreResult<ServiceVersion> {
        send!(self
            .client
            .from(SERVICE_VERSIONS)
            .select("*")
            .eq("service_id", service_id.to_string())
            .eq("revision", revision.to_string()))
        .first_row()
    }

    async fn list_by_service(
        &self,
        service_id: Uuid,
        page: PageRequest,
    ) -> StoreResult<Page<ServiceVersion>> {
        let (low, high) = page_range(page);
        let (data, total) = send!(self
            .client
            .from(SERVICE_VERSIONS)
            .select("*")
            .eq("service_id", service_id.to_string())
            .order("revision.desc")
            .range(low, high)
            .exact_count())
        .counted_rows()?;
        Ok(Page::new(data, total, page))
    }

    async fn count_by_service(&self, service_id: Uuid) -> StoreResult<u64> {
        let (_, total): (Vec<serde_json::Value>, u64) = send!(self
            .client
            .from(SERVICE_VERSIONS)
            .select("id")
            .eq("service_id", service_id.to_string())
            .range(0, 0)
            .exact_count())
        .counted_rows()?;
        Ok(total)
    }

    async fn delete_by_service(&self, service_id: Uuid) -> StoreResult<()> {
        let _: Vec<serde_json::Value> = send!(self
            .client
            .from(SERVICE_VERSIONS)
            .eq("service_id", service_id.to_string())
            .delete())
        .rows()?;
        Ok(())
    }
}

#[async_trait]
impl Store for PostgrestStore {
    async fn ping(&self) -> StoreResult<()> {
        let _: Vec<serde_json::Value> =
            send!(self.client.from(SERVICES).select("id").limit(1)).rows()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{db::Database, models::Role};
    use serde_json::json;
    use std::sync::Arc;
    use wiremock::{
        matchers::{header, method, path, query_param},
        Mock, MockServer, ResponseTemplate,
    };

    fn user_row(id: Uuid, email: &str) -> serde_json::Value {
        json!({
            "id": id,
            "email": email,
            "password_hash": "$argon2id$stub",
            "first_name": "Ann",
            "last_name": "Lee",
            "role": "admin",
            "active": true,
            "created_at": "2024-01-15T10:30:00Z",
            "updated_at": "2024-01-15T10:30:00Z"
        })
    }

    fn database(server: &MockServer) -> Database {
        Database::from_store(Arc::new(
            PostgrestStore::new(&server.uri(), "service-key").unwrap(),
        ))
    }

    #[test]
    fn test_content_range_total() {
        assert_eq!(parse_content_range_total("0-19/55"), Some(55));
        assert_eq!(parse_content_range_total("*/0"), Some(0));
        assert_eq!(parse_content_range_total("0-19/*"), None);
    }

    #[test]
    fn test_quote_filter_value_escapes() {
        assert_eq!(quote_filter_value(r#"a,b"c"#), r#""a,b\"c""#);
    }

    #[test]
    fn test_page_range_is_inclusive() {
        assert_eq!(page_range(PageRequest { page: 1, limit: 20 }), (0, 19));
        assert_eq!(page_range(PageRequest { page: 3, limit: 10 }), (20, 29));
    }

    #[test]
    fn test_new_requires_url() {
        assert!(PostgrestStore::new("", "key").is_err());
    }

    #[tokio::test]
    async fn test_get_user_by_email() {
        let server = MockServer::start().await;
        let id = Uuid::new_v4();

        Mock::given(method("GET"))
            .and(path("/rest/v1/users"))
            .and(query_param("email", "eq.ann@example.com"))
            .and(header("apikey", "service-key"))
            .and(header("authorization", "Bearer service-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([user_row(id, "ann@example.com")])))
            .expect(1)
            .mount(&server)
            .await;

        let user = database(&server)
            .users
            .get_by_email("ann@example.com")
            .await
            .unwrap();

        assert_eq!(user.id, id);
        assert_eq!(user.role, Role::Admin);
    }

    #[tokio::test]
    async fn test_missing_user_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/users"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;

        let err = database(&server)
            .users
            .get_by_id(Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound));
    }

    #[tokio::test]
    async fn test_duplicate_insert_is_conflict() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/users"))
            .respond_with(
                ResponseTemplate::new(409)
                    .set_body_json(json!({"code": "23505", "message": "duplicate key value"})),
            )
            .mount(&server)
            .await;

        let user = User::new("ann@example.com", "hash".to_string(), "Ann", "", Role::User);
        let err = database(&server).users.create(user).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict));
    }

    #[tokio::test]
    async fn test_server_error_is_backend_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/services"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let err = database(&server).ping().await.unwrap_err();
        assert!(matches!(err, StoreError::Backend(_)));
    }

    #[tokio::test]
    async fn test_version_count_reads_content_range() {
        let server = MockServer::start().await;
        let service_id = Uuid::new_v4();

        Mock::given(method("GET"))
            .and(path("/rest/v1/service_versions"))
            .and(query_param("service_id", format!("eq.{service_id}")))
            .respond_with(
                ResponseTemplate::new(206)
                    .insert_header("content-range", "0-0/7")
                    .set_body_json(json!([{ "id": Uuid::new_v4() }])),
            )
            .mount(&server)
            .await;

        let count = database(&server)
            .versions
            .count_by_service(service_id)
            .await
            .unwrap();
        assert_eq!(count, 7);
    }

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("payments"), "payments");
        assert_eq!(escape_like("a_b%c*d\\e"), "a\\_b\\%c\\*d\\\\e");
    }

    #[tokio::test]
    async fn test_name_filter_is_separate_from_search() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/services"))
            .and(query_param("name", "ilike.Payments"))
            .and(query_param("or", r#"(name.ilike."*pay*",description.ilike."*pay*")"#))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-range", "0-0/1")
                    .set_body_json(json!([{
                        "id": Uuid::new_v4(),
                        "name": "payments",
                        "description": "Handles payments",
                        "revision": 1,
                        "created_at": "2024-01-15T10:30:00Z",
                        "updated_at": "2024-01-15T10:30:00Z"
                    }])),
            )
            .expect(1)
            .mount(&server)
            .await;

        let params = ListParams {
            name: Some("Payments".to_string()),
            search: Some("pay".to_string()),
            ..ListParams::default()
        };
        let page = database(&server).services.list(&params).await.unwrap();
        assert_eq!(page.data.len(), 1);
        assert_eq!(page.pagination.total, 1);

        let requests = server.received_requests().await.unwrap();
        let or_filters = requests[0].url.query_pairs().filter(|(key, _)| key == "or").count();
        assert_eq!(or_filters, 1);
    }

    #[tokio::test]
    async fn test_page_past_the_end_is_empty() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/users"))
            .respond_with(ResponseTemplate::new(416).insert_header("content-range", "*/3"))
            .mount(&server)
            .await;

        let page = database(&server)
            .users
            .list(PageRequest { page: 9, limit: 20 })
            .await
            .unwrap();
        assert!(page.data.is_empty());
        assert_eq!(page.pagination.total, 3);
    }
}

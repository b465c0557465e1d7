#![allow(dead_code)]

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::Value;
use services_api::{
    create_app, utils::config::BootstrapAdmin, AppState, Config, Database,
};
use std::{collections::HashMap, sync::Arc};
use tower::ServiceExt;

pub const JWT_SECRET: &str = "integration-test-secret";
pub const ADMIN_EMAIL: &str = "admin@example.com";
pub const ADMIN_PASSWORD: &str = "admin-password";

/// Configuration with cheap argon2 parameters and the given API keys
pub fn test_config(api_keys: &[&str]) -> Config {
    let mut vars = HashMap::from([
        ("JWT_SECRET", JWT_SECRET.to_string()),
        ("DATABASE_BACKEND", "memory".to_string()),
        ("ARGON2_MEMORY_KIB", "1024".to_string()),
        ("ARGON2_ITERATIONS", "1".to_string()),
        ("ARGON2_PARALLELISM", "1".to_string()),
        ("MAX_BODY_SIZE", "4096".to_string()),
    ]);
    vars.insert("API_KEYS", api_keys.join(","));

    Config::from_lookup(|key| vars.get(key).cloned()).expect("valid test config")
}

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
}

impl TestApp {
    pub async fn new(api_keys: &[&str]) -> Self {
        let config = Arc::new(test_config(api_keys));
        let state = AppState::new(Database::in_memory(), config).expect("state");
        state
            .users
            .ensure_admin(&BootstrapAdmin {
                email: ADMIN_EMAIL.to_string(),
                password: ADMIN_PASSWORD.to_string(),
            })
            .await
            .expect("seed admin");

        Self {
            router: create_app(state.clone()),
            state,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.expect("response");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("json body")
        };
        (status, body)
    }

    /// Register a user and return its token bundle
    pub async fn register(&self, email: &str, password: &str) -> Value {
        let (status, body) = self
            .send(
                RequestBuilder::new(Method::POST, "/api/v1/auth/register")
                    .json(serde_json::json!({
                        "email": email,
                        "password": password,
                        "first_name": "Test",
                        "last_name": "User"
                    }))
                    .build(),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "register failed: {body}");
        body
    }

    pub async fn login(&self, email: &str, password: &str) -> (StatusCode, Value) {
        self.send(
            RequestBuilder::new(Method::POST, "/api/v1/auth/login")
                .json(serde_json::json!({ "email": email, "password": password }))
                .build(),
        )
        .await
    }

    pub async fn admin_token(&self) -> String {
        let (status, body) = self.login(ADMIN_EMAIL, ADMIN_PASSWORD).await;
        assert_eq!(status, StatusCode::OK);
        body["access_token"].as_str().expect("token").to_string()
    }
}

/// Small builder for test requests
pub struct RequestBuilder {
    method: Method,
    uri: String,
    headers: Vec<(String, String)>,
    body: Body,
}

impl RequestBuilder {
    pub fn new(method: Method, uri: &str) -> Self {
        Self {
            method,
            uri: uri.to_string(),
            headers: Vec::new(),
            body: Body::empty(),
        }
    }

    pub fn get(uri: &str) -> Self {
        Self::new(Method::GET, uri)
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn bearer(self, token: &str) -> Self {
        self.header("authorization", &format!("Bearer {token}"))
    }

    pub fn api_key(self, key: &str) -> Self {
        self.header("x-api-key", key)
    }

    pub fn json(self, value: Value) -> Self {
        self.raw_json(value.to_string())
    }

    pub fn raw_json(mut self, body: impl Into<String>) -> Self {
        self.headers
            .push((header::CONTENT_TYPE.to_string(), "application/json".to_string()));
        self.body = Body::from(body.into());
        self
    }

    pub fn build(self) -> Request<Body> {
        let mut builder = Request::builder().method(self.method).uri(self.uri);
        for (name, value) in self.headers {
            builder = builder.header(name, value);
        }
        builder.body(self.body).expect("request")
    }
}

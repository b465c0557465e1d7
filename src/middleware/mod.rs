use crate::{
    state::AppState,
    utils::{ApiError, Config},
};
use axum::{
    extract::{Request, State},
    http::{header, HeaderName, HeaderValue, Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use std::{sync::Arc, time::Duration};
use tower_http::{
    classify::{ServerErrorsAsFailures, SharedClassifier},
    cors::{AllowOrigin, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};

/// Reject requests whose declared body is larger than `MAX_BODY_SIZE`
pub async fn validate_request_size(
    State(config): State<Arc<Config>>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let declared = request
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<u64>().ok());

    if let Some(length) = declared {
        if length > config.server.max_body_size {
            tracing::debug!(length, "Request body too large");
            return Err(ApiError::payload_too_large());
        }
    }

    Ok(next.run(request).await)
}

/// CORS middleware configuration
pub fn cors_layer(config: &Config) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            header::ACCEPT,
            HeaderName::from_static("x-api-key"),
        ]);

    let origins = &config.server.cors_origins;
    if origins.is_empty() || origins.iter().any(|origin| origin == "*") {
        // Credentials cannot be combined with a wildcard origin
        return layer.allow_origin(AllowOrigin::any());
    }

    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    layer.allow_origin(origins).allow_credentials(true)
}

/// Request ID middleware
pub fn request_id_layer() -> SetRequestIdLayer<MakeRequestUuid> {
    SetRequestIdLayer::x_request_id(MakeRequestUuid)
}

/// Copy `x-request-id` onto the response
pub fn propagate_request_id_layer() -> PropagateRequestIdLayer {
    PropagateRequestIdLayer::x_request_id()
}

/// Tracing middleware
pub fn trace_layer() -> TraceLayer<SharedClassifier<ServerErrorsAsFailures>> {
    TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(tracing::Level::INFO))
        .on_response(DefaultOnResponse::new().level(tracing::Level::INFO))
}

const HEALTH_PING_TIMEOUT: Duration = Duration::from_secs(5);

/// Health check handler; 503 when the database cannot be reached
pub async fn health_check(State(state): State<AppState>) -> Response {
    let ping = tokio::time::timeout(HEALTH_PING_TIMEOUT, state.db.ping()).await;

    let (status, health, database) = match ping {
        Ok(Ok(())) => (StatusCode::OK, "healthy", "connected"),
        Ok(Err(err)) => {
            tracing::error!("Database health check failed: {}", err);
            (StatusCode::SERVICE_UNAVAILABLE, "unhealthy", "disconnected")
        }
        Err(_) => {
            tracing::error!("Database health check timed out");
            (StatusCode::SERVICE_UNAVAILABLE, "unhealthy", "disconnected")
        }
    };

    let body = serde_json::json!({
        "status": health,
        "database": database,
        "timestamp": chrono::Utc::now(),
        "version": env!("CARGO_PKG_VERSION")
    });

    (status, Json(body)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::config::{
        AuthConfig, DatabaseBackend, DatabaseConfig, JwtConfig, ServerConfig,
    };

    fn config(origins: &[&str]) -> Config {
        Config {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 0,
                cors_origins: origins.iter().map(|o| o.to_string()).collect(),
                max_body_size: 1024,
            },
            database: DatabaseConfig {
                backend: DatabaseBackend::Memory,
                supabase_url: String::new(),
                supabase_key: String::new(),
            },
            jwt: JwtConfig {
                secret: "secret".to_string(),
                issuer: "services-api".to_string(),
                access_ttl_minutes: 15,
                refresh_ttl_hours: 1,
            },
            auth: AuthConfig {
                api_keys: Vec::new(),
                argon2_memory_kib: 1024,
                argon2_iterations: 1,
                argon2_parallelism: 1,
            },
            bootstrap_admin: None,
        }
    }

    #[test]
    fn test_cors_layer_builds_for_wildcard_and_lists() {
        let _ = cors_layer(&config(&["*"]));
        let _ = cors_layer(&config(&[]));
        let _ = cors_layer(&config(&["https://app.example.com", "not a header\n"]));
    }
}

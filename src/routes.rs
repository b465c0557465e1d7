use crate::{
    auth::auth_middleware,
    handlers::{auth, services, users},
    middleware::{
        cors_layer, health_check, propagate_request_id_layer, request_id_layer, trace_layer,
        validate_request_size,
    },
    state::AppState,
};
use axum::{
    extract::DefaultBodyLimit,
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;

/// Build the application router with every layer applied
pub fn create_app(state: AppState) -> Router {
    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/health", get(health_check))
        .route("/api/v1/auth/register", post(auth::register))
        .route("/api/v1/auth/login", post(auth::login))
        .route("/api/v1/auth/refresh", post(auth::refresh));

    // Protected routes (API key or access token)
    let protected_routes = Router::new()
        .route("/api/v1/users/me", get(users::me))
        .route("/api/v1/users/me/password", post(users::change_password))
        .route(
            "/api/v1/users",
            post(users::create_user).get(users::list_users),
        )
        .route(
            "/api/v1/users/:id",
            get(users::get_user)
                .put(users::update_user)
                .delete(users::delete_user),
        )
        .route(
            "/api/v1/services",
            post(services::create_service).get(services::list_services),
        )
        .route(
            "/api/v1/services/:id",
            get(services::get_service)
                .put(services::update_service)
                .patch(services::patch_service)
                .delete(services::delete_service),
        )
        .route("/api/v1/services/:id/versions", get(services::list_versions))
        .route(
            "/api/v1/services/:id/versions/:revision",
            get(services::get_version),
        )
        .route_layer(from_fn_with_state(state.gate.clone(), auth_middleware));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(
            ServiceBuilder::new()
                .layer(request_id_layer())
                .layer(trace_layer())
                .layer(propagate_request_id_layer())
                .layer(cors_layer(&state.config))
                .layer(from_fn_with_state(
                    state.config.clone(),
                    validate_request_size,
                ))
                .layer(DefaultBodyLimit::max(state.config.server.max_body_size as usize)),
        )
        .with_state(state)
}

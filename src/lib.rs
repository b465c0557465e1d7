pub mod auth;
pub mod catalog;
pub mod db;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod state;
pub mod users;
pub mod utils;

pub use auth::{AuthGate, AuthService, Identity, TokenCodec};
pub use db::Database;
pub use routes::create_app;
pub use state::AppState;
pub use utils::{ApiError, ApiResult, Config};

//! HTTP API: prediction CRUD, model metrics, health and telemetry.

pub mod error;
pub mod handlers;
pub mod routes;

pub use error::ApiError;
pub use handlers::AppState;
pub use routes::create_router;

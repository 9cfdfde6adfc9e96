//! HTTP API route definitions.

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use super::handlers::{
    dashboard, get_prediction, health, list_predictions, model_metrics, patch_prediction, predict,
    ready, status, telemetry, update_prediction, AppState,
};

/// Create the API router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Prediction endpoints
        .route("/predict", post(predict))
        .route("/predictions", get(list_predictions))
        .route(
            "/prediction/:id",
            get(get_prediction)
                .put(update_prediction)
                .patch(patch_prediction),
        )
        // Model quality
        .route("/metrics", get(model_metrics))
        .route("/dashboard", get(dashboard))
        // Health endpoints
        .route("/health", get(health))
        .route("/ready", get(ready))
        // Status and telemetry
        .route("/api/v1/status", get(status))
        .route("/telemetry", get(telemetry))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

//! HTTP API handlers.

use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Bytes,
    extract::{rejection::PathRejection, Path, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse},
    Json,
};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

use super::error::ApiError;
use crate::error::{ModelError, StoreError, ValidationError};
use crate::features::{FeatureField, Measurements, MeasurementsPatch};
use crate::metrics;
use crate::model::Classifier;
use crate::store::{PredictionRecord, PredictionStore};

const DASHBOARD_HTML: &str = include_str!("../../static/dashboard.html");

/// Application state shared with handlers.
#[derive(Clone)]
pub struct AppState {
    /// The loaded model.
    pub classifier: Arc<dyn Classifier>,
    /// Prediction log.
    pub store: Arc<PredictionStore>,
    /// Where training wrote its evaluation report.
    pub metrics_path: Arc<PathBuf>,
    /// Whether the service is accepting traffic.
    pub ready: Arc<AtomicBool>,
    /// Prometheus renderer, when a recorder is installed.
    pub prometheus: Option<PrometheusHandle>,
}

impl AppState {
    /// Create new app state.
    pub fn new(
        classifier: Arc<dyn Classifier>,
        store: Arc<PredictionStore>,
        metrics_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            classifier,
            store,
            metrics_path: Arc::new(metrics_path.into()),
            ready: Arc::new(AtomicBool::new(false)),
            prometheus: None,
        }
    }

    /// Attach a Prometheus handle for `/telemetry`.
    pub fn with_prometheus(mut self, handle: PrometheusHandle) -> Self {
        self.prometheus = Some(handle);
        self
    }

    /// Set ready state.
    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }

    /// Check if ready.
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    fn classify(&self, m: &Measurements) -> Result<String, ModelError> {
        let _timer = metrics::timer_inference();
        self.classifier.predict(&m.as_array())
    }

    /// Run a store operation on the blocking pool.
    async fn with_store<T, F>(&self, f: F) -> Result<T, ApiError>
    where
        T: Send + 'static,
        F: FnOnce(&PredictionStore) -> Result<T, ApiError> + Send + 'static,
    {
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || f(store.as_ref()))
            .await
            .map_err(|e| ApiError::Store(StoreError::Task(e.to_string())))?
    }
}

/// Response for `POST /predict`.
#[derive(Debug, Serialize)]
pub struct PredictResponse {
    pub prediction: String,
}

/// Plain acknowledgement message.
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Status: "ok".
    pub status: &'static str,
}

/// Readiness check response.
#[derive(Debug, Serialize)]
pub struct ReadyResponse {
    /// Whether service is ready.
    pub ready: bool,
}

/// Status response.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    /// Service status.
    pub status: &'static str,
    /// Labels the model can return.
    pub classes: Vec<String>,
    /// Expected request fields, in model order.
    pub features: Vec<String>,
    /// Rows in the prediction log.
    pub predictions_stored: u64,
}

fn parse_body(body: &Bytes) -> Result<Value, ValidationError> {
    serde_json::from_slice(body).map_err(|e| ValidationError::MalformedJson(e.to_string()))
}

/// Ids that do not parse as integers name no row.
fn prediction_id(path: Result<Path<i64>, PathRejection>) -> Result<i64, ApiError> {
    match path {
        Ok(Path(id)) => Ok(id),
        Err(rejection) => {
            debug!("Unparseable prediction id: {}", rejection);
            Err(ApiError::NotFound)
        }
    }
}

/// Record latency and validation failures for a finished request.
fn finish<T>(endpoint: &'static str, start: Instant, result: Result<T, ApiError>) -> Result<T, ApiError> {
    metrics::record_http_latency(start, endpoint);
    if let Err(ApiError::Validation(e)) = &result {
        metrics::inc_validation_failures(endpoint);
        debug!(endpoint, "Rejected request body: {}", e);
    }
    result
}

/// Validate measurements, predict, and record the pair.
pub async fn predict(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<PredictResponse>, ApiError> {
    let start = Instant::now();
    let result = create_prediction(&state, &body).await;
    finish("/predict", start, result)
}

async fn create_prediction(state: &AppState, body: &Bytes) -> Result<Json<PredictResponse>, ApiError> {
    let m = Measurements::from_json(&parse_body(body)?)?;
    let label = state.classify(&m)?;

    let stored = label.clone();
    let record = state
        .with_store(move |store| Ok(store.insert(&m, Some(&stored))?))
        .await?;

    metrics::inc_predictions_created();
    info!(id = record.id, prediction = %label, "Prediction recorded");
    Ok(Json(PredictResponse { prediction: label }))
}

/// List every recorded prediction.
pub async fn list_predictions(
    State(state): State<AppState>,
) -> Result<Json<Vec<PredictionRecord>>, ApiError> {
    let start = Instant::now();
    let result = state
        .with_store(|store| Ok(store.list()?))
        .await
        .map(Json);
    finish("/predictions", start, result)
}

/// Fetch one recorded prediction.
pub async fn get_prediction(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Json<PredictionRecord>, ApiError> {
    let start = Instant::now();
    let result = match prediction_id(path) {
        Ok(id) => state
            .with_store(move |store| store.get(id)?.ok_or(ApiError::NotFound))
            .await
            .map(Json),
        Err(e) => Err(e),
    };
    finish("/prediction/:id", start, result)
}

/// `PUT /prediction/:id` - overwrite the supplied fields and re-score.
pub async fn update_prediction(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
    body: Bytes,
) -> Result<Json<MessageResponse>, ApiError> {
    let start = Instant::now();
    let result = match prediction_id(path) {
        Ok(id) => apply_update(&state, id, &body, "Prediction updated").await,
        Err(e) => Err(e),
    };
    finish("/prediction/:id", start, result)
}

/// `PATCH /prediction/:id` - overwrite only the supplied fields and re-score.
pub async fn patch_prediction(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
    body: Bytes,
) -> Result<Json<MessageResponse>, ApiError> {
    let start = Instant::now();
    let result = match prediction_id(path) {
        Ok(id) => apply_update(&state, id, &body, "Prediction partially updated").await,
        Err(e) => Err(e),
    };
    finish("/prediction/:id", start, result)
}

async fn apply_update(
    state: &AppState,
    id: i64,
    body: &Bytes,
    message: &'static str,
) -> Result<Json<MessageResponse>, ApiError> {
    let patch = MeasurementsPatch::from_json(&parse_body(body)?)?;

    let scorer = state.clone();
    let record = state
        .with_store(move |store| {
            store.modify::<ApiError, _>(id, |record| {
                let mut m = record.measurements();
                patch.apply(&mut m);
                record.set_measurements(&m);
                record.predicted_class = Some(scorer.classify(&m)?);
                Ok(())
            })
        })
        .await?
        .ok_or(ApiError::NotFound)?;

    metrics::inc_predictions_updated();
    info!(id, prediction = ?record.predicted_class, "Prediction re-scored");
    Ok(Json(MessageResponse { message }))
}

/// Serve the evaluation report written at training time.
pub async fn model_metrics(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let start = Instant::now();
    let result = read_metrics(state.metrics_path.as_path()).await.map(Json);
    finish("/metrics", start, result)
}

async fn read_metrics(path: &std::path::Path) -> Result<Value, ApiError> {
    let bytes = tokio::fs::read(path).await.map_err(|e| match e.kind() {
        ErrorKind::NotFound => ApiError::MetricsNotFound,
        _ => ApiError::MetricsUnreadable(e.to_string()),
    })?;
    serde_json::from_slice(&bytes).map_err(|_| ApiError::MetricsInvalid)
}

/// Dashboard page that charts `/metrics`.
pub async fn dashboard() -> Html<&'static str> {
    Html(DASHBOARD_HTML)
}

/// Health check handler - always returns 200.
pub async fn health() -> impl IntoResponse {
    Json(HealthResponse { status: "ok" })
}

/// Readiness check handler - returns 200 if ready, 503 otherwise.
pub async fn ready(State(state): State<AppState>) -> impl IntoResponse {
    let is_ready = state.is_ready();
    let response = ReadyResponse { ready: is_ready };

    if is_ready {
        (StatusCode::OK, Json(response))
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, Json(response))
    }
}

/// Status handler - model summary and prediction count.
pub async fn status(State(state): State<AppState>) -> Result<Json<StatusResponse>, ApiError> {
    let predictions_stored = state.with_store(|store| Ok(store.count()?)).await?;
    let status = if state.is_ready() { "running" } else { "starting" };

    Ok(Json(StatusResponse {
        status,
        classes: state.classifier.classes().to_vec(),
        features: FeatureField::names(),
        predictions_stored,
    }))
}

/// Prometheus text exposition.
pub async fn telemetry(State(state): State<AppState>) -> impl IntoResponse {
    match &state.prometheus {
        Some(handle) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            handle.render(),
        )
            .into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

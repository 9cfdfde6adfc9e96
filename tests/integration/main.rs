//! End-to-end tests: train on a CSV, serve the saved model, and exercise the
//! prediction log over HTTP.
//!
//! Run with: cargo test --test integration

use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use tower::ServiceExt;

use iris_serve::api::{create_router, AppState};
use iris_serve::model::{Classifier, Hyperparameters, ModelArtifact};
use iris_serve::store::PredictionStore;
use iris_serve::training::{train_model, TrainingOptions};

/// Iris-shaped data: three species separated mostly by petal size.
fn write_iris_like(dir: &Path) -> PathBuf {
    let species = [
        ("Iris-setosa", [5.0, 3.4, 1.5, 0.2]),
        ("Iris-versicolor", [5.9, 2.8, 4.3, 1.3]),
        ("Iris-virginica", [6.6, 3.0, 5.6, 2.0]),
    ];
    let jitter = [-0.2, -0.1, 0.0, 0.1, 0.2];

    let mut csv = String::from("sepal_length,sepal_width,petal_length,petal_width,species\n");
    for (name, center) in species {
        for (i, a) in jitter.iter().enumerate() {
            for b in jitter {
                let b = b * 0.5;
                writeln!(
                    csv,
                    "{:.2},{:.2},{:.2},{:.2},{}",
                    center[0] + a,
                    center[1] + b,
                    center[2] + b,
                    center[3] + a * 0.25 + (i as f64) * 0.01,
                    name
                )
                .unwrap();
            }
        }
    }

    let path = dir.join("iris.csv");
    std::fs::write(&path, csv).unwrap();
    path
}

fn train(dir: &Path) -> TrainingOptions {
    let options = TrainingOptions {
        dataset_path: write_iris_like(dir),
        model_path: dir.join("model.json"),
        metrics_path: dir.join("metrics.json"),
        test_size: 0.2,
        random_state: 42,
        hyperparameters: Hyperparameters::default(),
    };
    train_model(&options).unwrap();
    options
}

fn serve(dir: &Path, options: &TrainingOptions) -> Router {
    let artifact = ModelArtifact::load(&options.model_path).unwrap();
    let store = PredictionStore::open(dir.join("predictions.db")).unwrap();
    let state = AppState::new(
        Arc::new(artifact.model),
        Arc::new(store),
        options.metrics_path.clone(),
    );
    state.set_ready(true);
    create_router(state)
}

async fn call(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(body.map_or_else(Body::empty, |b| Body::from(b.to_string())))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

#[test]
fn trained_model_separates_species() {
    let dir = tempfile::tempdir().unwrap();
    let options = train(dir.path());

    let artifact = ModelArtifact::load(&options.model_path).unwrap();
    assert_eq!(
        artifact.model.classes(),
        &["Iris-setosa", "Iris-versicolor", "Iris-virginica"]
    );
    assert_eq!(
        artifact.model.predict(&[5.0, 3.4, 1.5, 0.2]).unwrap(),
        "Iris-setosa"
    );
    assert_eq!(
        artifact.model.predict(&[6.6, 3.0, 5.6, 2.0]).unwrap(),
        "Iris-virginica"
    );

    let metrics: Value =
        serde_json::from_slice(&std::fs::read(&options.metrics_path).unwrap()).unwrap();
    assert!(metrics["accuracy"].as_f64().unwrap() >= 0.9);
    assert_eq!(metrics["confusion_matrix"].as_array().unwrap().len(), 3);
    assert!(metrics["classification_report"]["weighted avg"]["f1-score"].is_number());
}

#[tokio::test]
async fn predict_update_and_report_flow() {
    let dir = tempfile::tempdir().unwrap();
    let options = train(dir.path());
    let app = serve(dir.path(), &options);

    let (status, body) = call(
        &app,
        "POST",
        "/predict",
        Some(json!({"sepal_length": 5.0, "sepal_width": 3.4, "petal_length": 1.5, "petal_width": 0.2})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"prediction": "Iris-setosa"}));

    let (status, body) = call(
        &app,
        "PATCH",
        "/prediction/1",
        Some(json!({"sepal_length": 6.6, "sepal_width": 3.0, "petal_length": 5.6, "petal_width": 2.0})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Prediction partially updated");

    let (status, rows) = call(&app, "GET", "/predictions", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(rows.as_array().unwrap().len(), 1);
    assert_eq!(rows[0]["predicted_class"], "Iris-virginica");
    assert_eq!(rows[0]["petal_length"], 5.6);

    let (status, metrics) = call(&app, "GET", "/metrics", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(metrics["accuracy"].is_number());
    assert!(metrics["precision"].is_number());

    let (status, _) = call(&app, "GET", "/ready", None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn prediction_log_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let options = train(dir.path());

    {
        let app = serve(dir.path(), &options);
        let (status, _) = call(
            &app,
            "POST",
            "/predict",
            Some(json!({"sepal_length": 5.9, "sepal_width": 2.8, "petal_length": 4.3, "petal_width": 1.3})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    let app = serve(dir.path(), &options);
    let (status, row) = call(&app, "GET", "/prediction/1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(row["predicted_class"], "Iris-versicolor");
}

//! Offline training: load, split, fit, evaluate, persist.

use std::path::PathBuf;
use std::time::Instant;

use tracing::info;

use crate::config::Config;
use crate::dataset::Dataset;
use crate::error::Result;
use crate::evaluation::{evaluate, ModelMetrics};
use crate::model::{Classifier, Hyperparameters, LogisticRegression, ModelArtifact};

/// Inputs for one training run.
#[derive(Debug, Clone)]
pub struct TrainingOptions {
    pub dataset_path: PathBuf,
    pub model_path: PathBuf,
    pub metrics_path: PathBuf,
    pub test_size: f64,
    pub random_state: u64,
    pub hyperparameters: Hyperparameters,
}

impl TrainingOptions {
    /// Options taken straight from the environment configuration.
    pub fn from_config(config: &Config) -> Self {
        Self {
            dataset_path: config.dataset_path.clone(),
            model_path: config.model_path.clone(),
            metrics_path: config.metrics_path.clone(),
            test_size: config.test_size,
            random_state: config.random_state,
            hyperparameters: config.hyperparameters(),
        }
    }
}

/// Result of a training run.
#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    pub artifact: ModelArtifact,
    pub metrics: ModelMetrics,
    pub train_size: usize,
    pub test_size: usize,
}

/// Fit a model on `train` and score it on `test`, without touching disk.
pub fn fit_and_evaluate(
    train: &Dataset,
    test: &Dataset,
    params: &Hyperparameters,
) -> Result<(LogisticRegression, ModelMetrics)> {
    let model = LogisticRegression::fit(&train.features(), &train.labels(), params)?;

    let predictions = test
        .samples
        .iter()
        .map(|s| model.predict(&s.features))
        .collect::<std::result::Result<Vec<_>, _>>()?;
    let metrics = evaluate(&test.labels(), &predictions)?;

    Ok((model, metrics))
}

/// Run the full pipeline and write the model and metrics files.
pub fn train_model(options: &TrainingOptions) -> Result<TrainingOutcome> {
    let start = Instant::now();
    options.hyperparameters.validate()?;

    let dataset = Dataset::load(&options.dataset_path)?;
    let (train, test) = dataset.train_test_split(options.test_size, options.random_state)?;
    info!(
        train = train.len(),
        test = test.len(),
        classes = ?dataset.classes(),
        "Training logistic regression"
    );

    let (model, metrics) = fit_and_evaluate(&train, &test, &options.hyperparameters)?;
    info!(
        iterations = model.n_iter(),
        accuracy = metrics.accuracy,
        precision = metrics.precision,
        recall = metrics.recall,
        f1_score = metrics.f1_score,
        "Model evaluated"
    );

    let artifact = ModelArtifact::new(model, dataset.feature_names.clone());
    artifact.save(&options.model_path)?;
    metrics.save(&options.metrics_path)?;

    info!(elapsed_ms = start.elapsed().as_millis() as u64, "Training complete");

    Ok(TrainingOutcome {
        artifact,
        metrics,
        train_size: train.len(),
        test_size: test.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{DatasetError, ServiceError};
    use std::fmt::Write as _;

    fn write_dataset(dir: &std::path::Path) -> PathBuf {
        let mut csv = String::from("x,y,label\n");
        for i in 0..10 {
            let jitter = i as f64 * 0.05;
            writeln!(csv, "{},{},left", 1.0 + jitter, 1.0 - jitter).unwrap();
            writeln!(csv, "{},{},right", 8.0 - jitter, 1.0 + jitter).unwrap();
        }
        let path = dir.join("data.csv");
        std::fs::write(&path, csv).unwrap();
        path
    }

    fn options(dir: &std::path::Path, dataset_path: PathBuf) -> TrainingOptions {
        TrainingOptions {
            dataset_path,
            model_path: dir.join("out").join("model.json"),
            metrics_path: dir.join("out").join("metrics.json"),
            test_size: 0.2,
            random_state: 42,
            hyperparameters: Hyperparameters::default(),
        }
    }

    #[test]
    fn pipeline_writes_model_and_metrics() {
        let dir = tempfile::tempdir().unwrap();
        let data = write_dataset(dir.path());
        let opts = options(dir.path(), data);

        let outcome = train_model(&opts).unwrap();
        assert_eq!(outcome.train_size, 16);
        assert_eq!(outcome.test_size, 4);
        assert_eq!(outcome.metrics.accuracy, 1.0);

        let loaded = ModelArtifact::load(&opts.model_path).unwrap();
        assert_eq!(loaded.feature_names, vec!["x", "y"]);
        assert_eq!(loaded.model.predict(&[1.2, 0.9]).unwrap(), "left");

        let metrics: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&opts.metrics_path).unwrap()).unwrap();
        assert_eq!(metrics["accuracy"], 1.0);
    }

    #[test]
    fn missing_dataset_fails_before_writing() {
        let dir = tempfile::tempdir().unwrap();
        let opts = options(dir.path(), dir.path().join("nope.csv"));

        let err = train_model(&opts).unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Dataset(DatasetError::NotFound { .. })
        ));
        assert!(!opts.model_path.exists());
    }

    #[test]
    fn options_follow_config() {
        let config = Config {
            test_size: 0.3,
            random_state: 7,
            ..Config::default()
        };
        let opts = TrainingOptions::from_config(&config);
        assert_eq!(opts.test_size, 0.3);
        assert_eq!(opts.random_state, 7);
        assert_eq!(opts.dataset_path, PathBuf::from("iris.csv"));
    }
}

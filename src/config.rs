//! Application configuration loaded from environment variables.

use std::path::PathBuf;

use serde::Deserialize;

use crate::model::Hyperparameters;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    // === Server Configuration ===
    /// Address to bind the HTTP server to.
    #[serde(default = "default_host")]
    pub host: String,

    /// HTTP server port.
    #[serde(default = "default_port")]
    pub port: u16,

    // === Storage ===
    /// SQLite file holding the prediction log.
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,

    /// Trained model artefact.
    #[serde(default = "default_model_path")]
    pub model_path: PathBuf,

    /// Evaluation metrics written by training and served by `/metrics`.
    #[serde(default = "default_metrics_path")]
    pub metrics_path: PathBuf,

    // === Training ===
    /// Labeled CSV used for training.
    #[serde(default = "default_dataset_path")]
    pub dataset_path: PathBuf,

    /// Fraction of rows held out for evaluation.
    #[serde(default = "default_test_size")]
    pub test_size: f64,

    /// Seed for the train/test shuffle.
    #[serde(default = "default_random_state")]
    pub random_state: u64,

    /// Maximum gradient-descent iterations.
    #[serde(default = "default_max_iter")]
    pub max_iter: usize,

    /// Gradient-descent step size.
    #[serde(default = "default_learning_rate")]
    pub learning_rate: f64,

    /// Inverse L2 regularization strength (C).
    #[serde(default = "default_regularization")]
    pub regularization: f64,

    /// Convergence threshold on the largest gradient component.
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,

    // === Logging ===
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub rust_log: String,

    /// Emit logs as JSON lines.
    #[serde(default)]
    pub log_json: bool,

    /// Enable verbose logging.
    #[serde(default)]
    pub verbose: bool,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_database_path() -> PathBuf {
    PathBuf::from("predictions.db")
}

fn default_model_path() -> PathBuf {
    PathBuf::from("model.json")
}

fn default_metrics_path() -> PathBuf {
    PathBuf::from("metrics.json")
}

fn default_dataset_path() -> PathBuf {
    PathBuf::from("iris.csv")
}

fn default_test_size() -> f64 {
    0.2
}

fn default_random_state() -> u64 {
    42
}

fn default_max_iter() -> usize {
    1000
}

fn default_learning_rate() -> f64 {
    0.5
}

fn default_regularization() -> f64 {
    1.0
}

fn default_tolerance() -> f64 {
    1e-4
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            database_path: default_database_path(),
            model_path: default_model_path(),
            metrics_path: default_metrics_path(),
            dataset_path: default_dataset_path(),
            test_size: default_test_size(),
            random_state: default_random_state(),
            max_iter: default_max_iter(),
            learning_rate: default_learning_rate(),
            regularization: default_regularization(),
            tolerance: default_tolerance(),
            rust_log: default_log_level(),
            log_json: false,
            verbose: false,
        }
    }
}

impl Config {
    /// Load configuration from environment, reading .env file first.
    pub fn load() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env()
    }

    /// Check if the configuration is valid.
    pub fn validate(&self) -> Result<(), String> {
        if self.port == 0 {
            return Err("PORT must be non-zero".to_string());
        }

        if !(self.test_size > 0.0 && self.test_size < 1.0) {
            return Err("TEST_SIZE must be between 0 and 1 (exclusive)".to_string());
        }

        for (name, path) in [
            ("DATABASE_PATH", &self.database_path),
            ("MODEL_PATH", &self.model_path),
            ("METRICS_PATH", &self.metrics_path),
            ("DATASET_PATH", &self.dataset_path),
        ] {
            if path.as_os_str().is_empty() {
                return Err(format!("{name} must not be empty"));
            }
        }

        self.hyperparameters()
            .validate()
            .map_err(|e| e.to_string())?;

        Ok(())
    }

    /// Training hyperparameters derived from this configuration.
    pub fn hyperparameters(&self) -> Hyperparameters {
        Hyperparameters {
            max_iter: self.max_iter,
            learning_rate: self.learning_rate,
            c: self.regularization,
            tolerance: self.tolerance,
        }
    }

    /// `host:port` for the listener.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_values_are_sensible() {
        let config = Config::default();
        assert_eq!(config.port, 5000);
        assert_eq!(config.test_size, 0.2);
        assert_eq!(config.random_state, 42);
        assert_eq!(config.model_path, PathBuf::from("model.json"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_rejects_bad_test_size() {
        for test_size in [0.0, 1.0, -0.5, f64::NAN] {
            let config = Config {
                test_size,
                ..Config::default()
            };
            assert!(config.validate().is_err(), "test_size {test_size} accepted");
        }
    }

    #[test]
    fn validate_rejects_zero_port_and_empty_paths() {
        let config = Config {
            port: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            model_path: PathBuf::new(),
            ..Config::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.contains("MODEL_PATH"));
    }

    #[test]
    fn validate_rejects_bad_hyperparameters() {
        let config = Config {
            learning_rate: -1.0,
            ..Config::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            max_iter: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn hyperparameters_follow_config() {
        let config = Config {
            max_iter: 10,
            regularization: 0.5,
            ..Config::default()
        };
        let params = config.hyperparameters();
        assert_eq!(params.max_iter, 10);
        assert_eq!(params.c, 0.5);
    }

    #[test]
    fn bind_address_joins_host_and_port() {
        let config = Config {
            host: "127.0.0.1".to_string(),
            port: 8081,
            ..Config::default()
        };
        assert_eq!(config.bind_address(), "127.0.0.1:8081");
    }
}

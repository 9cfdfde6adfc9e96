//! Iris classifier training and prediction service.
//!
//! Trains a multinomial logistic regression on a labeled CSV, writes the
//! model and its evaluation report to disk, and serves predictions over
//! HTTP. Every prediction request and its result is recorded in SQLite so it
//! can be listed, corrected and re-scored later.
//!
//! ```text
//! iris.csv ──train──▶ model.json + metrics.json
//!                          │
//! POST /predict ──▶ Classifier::predict ──▶ prediction table
//! ```
//!
//! # Modules
//!
//! - [`config`]: Configuration loading from environment
//! - [`error`]: Unified error types
//! - [`features`]: Request measurements and their validation
//! - [`dataset`]: CSV loading and train/test split
//! - [`model`]: Classifier trait, logistic regression, artefact file
//! - [`evaluation`]: Accuracy, precision, recall, F1, confusion matrix
//! - [`training`]: The offline training pipeline
//! - [`store`]: SQLite prediction log
//! - [`api`]: HTTP endpoints
//! - [`metrics`]: Prometheus telemetry
//! - [`utils`]: Utility functions

pub mod api;
pub mod config;
pub mod dataset;
pub mod error;
pub mod evaluation;
pub mod features;
pub mod metrics;
pub mod model;
pub mod store;
pub mod training;
pub mod utils;

pub use config::Config;
pub use error::{Result, ServiceError};

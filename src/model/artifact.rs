//! JSON model artefact written by `train` and read by `serve`.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{Classifier, LogisticRegression};
use crate::error::ModelError;

/// Artefact layout version this build reads and writes.
pub const ARTIFACT_FORMAT_VERSION: u32 = 1;

/// A trained model plus the metadata needed to serve it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub format_version: u32,
    pub trained_at: DateTime<Utc>,
    /// Input column names, in the order the model expects them.
    pub feature_names: Vec<String>,
    pub model: LogisticRegression,
}

#[derive(Deserialize)]
struct VersionProbe {
    format_version: u32,
}

impl ModelArtifact {
    /// Wrap a freshly fitted model.
    pub fn new(model: LogisticRegression, feature_names: Vec<String>) -> Self {
        Self {
            format_version: ARTIFACT_FORMAT_VERSION,
            trained_at: Utc::now(),
            feature_names,
            model,
        }
    }

    /// Write the artefact as pretty JSON, creating parent directories.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ModelError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_vec_pretty(self)?)?;
        info!(path = %path.display(), "Model saved");
        Ok(())
    }

    /// Read an artefact, rejecting other format versions.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ModelError> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => ModelError::ArtifactNotFound {
                path: path.display().to_string(),
            },
            _ => ModelError::Io(e),
        })?;

        let probe: VersionProbe = serde_json::from_slice(&bytes)?;
        if probe.format_version != ARTIFACT_FORMAT_VERSION {
            return Err(ModelError::UnsupportedFormat {
                found: probe.format_version,
                expected: ARTIFACT_FORMAT_VERSION,
            });
        }

        let artifact: Self = serde_json::from_slice(&bytes)?;
        artifact.model.validate()?;
        if artifact.feature_names.len() != artifact.model.n_features() {
            return Err(ModelError::FeatureCount {
                expected: artifact.model.n_features(),
                actual: artifact.feature_names.len(),
            });
        }
        info!(
            path = %path.display(),
            trained_at = %artifact.trained_at,
            classes = ?artifact.model.classes(),
            "Model loaded"
        );
        Ok(artifact)
    }
}

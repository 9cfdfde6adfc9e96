//! Classifier abstraction, the logistic-regression implementation and its
//! on-disk artefact.

pub mod artifact;
pub mod logistic;

pub use artifact::{ModelArtifact, ARTIFACT_FORMAT_VERSION};
pub use logistic::{Hyperparameters, LogisticRegression};

use crate::error::ModelError;

/// A trained model that maps a feature vector to a class label.
///
/// The HTTP layer only ever talks to this trait, so the serving path does not
/// care how the model was fitted.
pub trait Classifier: Send + Sync {
    /// Predict the label for one feature vector.
    fn predict(&self, features: &[f64]) -> Result<String, ModelError>;

    /// Labels this model can produce, sorted.
    fn classes(&self) -> &[String];

    /// Number of input features expected by [`Classifier::predict`].
    fn n_features(&self) -> usize;
}

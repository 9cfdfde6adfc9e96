//! Unified error types for training and serving.

use thiserror::Error;

use crate::features::FeatureField;

/// Unified error type for the service.
#[derive(Error, Debug)]
pub enum ServiceError {
    /// Configuration loading error.
    #[error("configuration error: {0}")]
    Config(#[from] envy::Error),

    /// Dataset loading or splitting error.
    #[error("dataset error: {0}")]
    Dataset(#[from] DatasetError),

    /// Model fitting, inference or persistence error.
    #[error("model error: {0}")]
    Model(#[from] ModelError),

    /// Evaluation error.
    #[error("evaluation error: {0}")]
    Evaluation(#[from] EvaluationError),

    /// Prediction store error.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// JSON parsing error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Dataset loading and splitting errors.
#[derive(Error, Debug)]
pub enum DatasetError {
    /// The dataset file does not exist.
    #[error("dataset file not found: {path}")]
    NotFound {
        /// Path that was looked up.
        path: String,
    },

    /// Underlying CSV reader error.
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    /// Header has too few columns to hold features and a label.
    #[error("dataset needs at least one feature column and a label column, found {columns} column(s)")]
    TooFewColumns {
        /// Number of header columns.
        columns: usize,
    },

    /// A feature cell could not be read as a finite number.
    #[error("line {line}: column '{column}' has non-numeric value '{value}'")]
    InvalidValue {
        /// 1-based line number in the file.
        line: u64,
        /// Column header.
        column: String,
        /// Raw cell contents.
        value: String,
    },

    /// A row had an empty label.
    #[error("line {line}: empty label")]
    EmptyLabel {
        /// 1-based line number in the file.
        line: u64,
    },

    /// No data rows.
    #[error("dataset contains no rows")]
    Empty,

    /// The requested split leaves one side empty or is out of range.
    #[error("invalid split: test_size={test_size} over {samples} samples")]
    InvalidSplit {
        /// Requested test fraction.
        test_size: f64,
        /// Number of samples being split.
        samples: usize,
    },

    /// IO error while opening the dataset.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Model fitting, inference and persistence errors.
#[derive(Error, Debug)]
pub enum ModelError {
    /// Fitting was given no samples.
    #[error("cannot fit a model on an empty training set")]
    EmptyTrainingSet,

    /// Fitting needs at least two distinct labels.
    #[error("need at least two classes to fit, found {found}")]
    TooFewClasses {
        /// Number of distinct labels found.
        found: usize,
    },

    /// Feature rows and labels differ in length.
    #[error("{samples} feature rows but {labels} labels")]
    LabelMismatch {
        /// Number of feature rows.
        samples: usize,
        /// Number of labels.
        labels: usize,
    },

    /// Input width does not match what the model was trained on.
    #[error("expected {expected} features, got {actual}")]
    FeatureCount {
        /// Features the model expects.
        expected: usize,
        /// Features provided.
        actual: usize,
    },

    /// An input value was NaN or infinite.
    #[error("feature {index} is not a finite number")]
    NonFinite {
        /// Position of the offending feature.
        index: usize,
    },

    /// Invalid training hyperparameters.
    #[error("invalid hyperparameters: {0}")]
    InvalidHyperparameters(String),

    /// Artefact file does not exist.
    #[error("model artefact not found: {path}")]
    ArtifactNotFound {
        /// Path that was looked up.
        path: String,
    },

    /// Artefact was written by an incompatible version.
    #[error("unsupported model artefact format version {found} (expected {expected})")]
    UnsupportedFormat {
        /// Version found in the file.
        found: u32,
        /// Version this build reads.
        expected: u32,
    },

    /// Artefact parsed but its parameters are inconsistent.
    #[error("model artefact is corrupt: {0}")]
    Corrupt(String),

    /// Artefact (de)serialization failed.
    #[error("model artefact is malformed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error while reading or writing the artefact.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Metric computation errors.
#[derive(Error, Debug)]
pub enum EvaluationError {
    /// True and predicted label slices differ in length.
    #[error("label count mismatch: {truth} true vs {predicted} predicted")]
    LengthMismatch {
        /// Number of true labels.
        truth: usize,
        /// Number of predicted labels.
        predicted: usize,
    },

    /// Nothing to evaluate.
    #[error("cannot evaluate an empty test set")]
    Empty,
}

/// Prediction store errors.
#[derive(Error, Debug)]
pub enum StoreError {
    /// SQLite error.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Another thread panicked while holding the connection.
    #[error("database connection lock poisoned")]
    LockPoisoned,

    /// Blocking task failed to complete.
    #[error("database task failed: {0}")]
    Task(String),
}

/// Request body validation errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Body was not valid JSON.
    #[error("invalid JSON body: {0}")]
    MalformedJson(String),

    /// Body was valid JSON but not an object.
    #[error("request body must be a JSON object")]
    NotAnObject,

    /// A required field is absent.
    #[error("missing field: {0}")]
    MissingField(FeatureField),

    /// A field has a non-numeric value.
    #[error("field {field} must be a number, got {found}")]
    WrongType {
        /// Offending field.
        field: FeatureField,
        /// JSON type that was found.
        found: &'static str,
    },
}

/// Convenient Result type alias.
pub type Result<T> = std::result::Result<T, ServiceError>;

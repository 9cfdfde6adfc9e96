//! Labeled CSV dataset loading and the train/test split.

use std::collections::BTreeSet;
use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::Path;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::{debug, info};

use crate::error::DatasetError;

/// One labeled row.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    /// Feature values, in header order.
    pub features: Vec<f64>,
    /// Class label.
    pub label: String,
}

/// A labeled dataset: every column but the last is a numeric feature, the
/// last column is the label.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    /// Feature column headers.
    pub feature_names: Vec<String>,
    /// Data rows.
    pub samples: Vec<Sample>,
}

impl Dataset {
    /// Load a dataset from a CSV file with a header row.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, DatasetError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => DatasetError::NotFound {
                path: path.display().to_string(),
            },
            _ => DatasetError::Io(e),
        })?;
        let dataset = Self::from_reader(file)?;
        info!(
            path = %path.display(),
            rows = dataset.len(),
            features = dataset.feature_names.len(),
            "Dataset loaded"
        );
        Ok(dataset)
    }

    /// Parse CSV from any reader. The first row must be a header.
    pub fn from_reader<R: Read>(rdr: R) -> Result<Self, DatasetError> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(rdr);

        let headers = reader.headers()?.clone();
        if headers.len() < 2 {
            return Err(DatasetError::TooFewColumns {
                columns: headers.len(),
            });
        }
        let label_index = headers.len() - 1;
        let feature_names: Vec<String> = headers
            .iter()
            .take(label_index)
            .map(str::to_string)
            .collect();

        let mut samples = Vec::new();
        for record in reader.records() {
            let record = record?;
            let line = record.position().map(|p| p.line()).unwrap_or_default();

            let mut features = Vec::with_capacity(label_index);
            for (raw, column) in record.iter().take(label_index).zip(&feature_names) {
                let value = raw
                    .parse::<f64>()
                    .ok()
                    .filter(|v| v.is_finite())
                    .ok_or_else(|| DatasetError::InvalidValue {
                        line,
                        column: column.clone(),
                        value: raw.to_string(),
                    })?;
                features.push(value);
            }

            let label = record.get(label_index).unwrap_or_default();
            if label.is_empty() {
                return Err(DatasetError::EmptyLabel { line });
            }

            samples.push(Sample {
                features,
                label: label.to_string(),
            });
        }

        if samples.is_empty() {
            return Err(DatasetError::Empty);
        }

        Ok(Self {
            feature_names,
            samples,
        })
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// True when there are no rows.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Sorted distinct labels.
    pub fn classes(&self) -> Vec<String> {
        self.samples
            .iter()
            .map(|s| s.label.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Feature rows.
    pub fn features(&self) -> Vec<Vec<f64>> {
        self.samples.iter().map(|s| s.features.clone()).collect()
    }

    /// Label column.
    pub fn labels(&self) -> Vec<String> {
        self.samples.iter().map(|s| s.label.clone()).collect()
    }

    /// Shuffle with a fixed seed and split off `ceil(test_size * n)` rows as
    /// the test set. Returns `(train, test)`.
    pub fn train_test_split(
        &self,
        test_size: f64,
        seed: u64,
    ) -> Result<(Dataset, Dataset), DatasetError> {
        let n = self.len();
        let invalid = || DatasetError::InvalidSplit {
            test_size,
            samples: n,
        };
        if !(test_size > 0.0 && test_size < 1.0) {
            return Err(invalid());
        }

        let n_test = (test_size * n as f64).ceil() as usize;
        if n_test == 0 || n_test >= n {
            return Err(invalid());
        }

        let mut indices: Vec<usize> = (0..n).collect();
        let mut rng = StdRng::seed_from_u64(seed);
        indices.shuffle(&mut rng);

        let pick = |idx: &[usize]| Dataset {
            feature_names: self.feature_names.clone(),
            samples: idx.iter().map(|&i| self.samples[i].clone()).collect(),
        };
        let (test_idx, train_idx) = indices.split_at(n_test);
        let train = pick(train_idx);
        let test = pick(test_idx);

        debug!(train = train.len(), test = test.len(), seed, "Dataset split");
        Ok((train, test))
    }
}

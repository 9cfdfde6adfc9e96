//! Classification metrics computed on the held-out test set.
//!
//! The serialized [`ModelMetrics`] is what `GET /metrics` returns and what the
//! dashboard renders, so the key names here are part of the HTTP contract:
//! `accuracy`, `precision`, `recall`, `f1_score`, `confusion_matrix` and a
//! `classification_report` keyed by class name plus `accuracy`,
//! `macro avg` and `weighted avg`.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{EvaluationError, ServiceError};

/// Precision/recall/F1 for one class or one average.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassScores {
    pub precision: f64,
    pub recall: f64,
    #[serde(rename = "f1-score")]
    pub f1_score: f64,
    /// Number of true samples of this class.
    pub support: usize,
}

/// Per-class report followed by the overall rows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassificationReport {
    #[serde(flatten)]
    pub classes: BTreeMap<String, ClassScores>,
    pub accuracy: f64,
    #[serde(rename = "macro avg")]
    pub macro_avg: ClassScores,
    #[serde(rename = "weighted avg")]
    pub weighted_avg: ClassScores,
}

/// Everything written to `metrics.json`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelMetrics {
    pub accuracy: f64,
    /// Support-weighted precision.
    pub precision: f64,
    /// Support-weighted recall.
    pub recall: f64,
    /// Support-weighted F1.
    pub f1_score: f64,
    /// Rows are true labels, columns predicted labels, both in `labels` order.
    pub confusion_matrix: Vec<Vec<u64>>,
    pub labels: Vec<String>,
    pub classification_report: ClassificationReport,
}

impl ModelMetrics {
    /// Write the metrics as pretty JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ServiceError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_vec_pretty(self)?)?;
        info!(path = %path.display(), "Metrics saved");
        Ok(())
    }
}

/// Compare true and predicted labels.
///
/// Labels are the sorted union of both slices. A class that is never
/// predicted gets precision 0; one that never occurs gets recall 0.
pub fn evaluate(y_true: &[String], y_pred: &[String]) -> Result<ModelMetrics, EvaluationError> {
    if y_true.len() != y_pred.len() {
        return Err(EvaluationError::LengthMismatch {
            truth: y_true.len(),
            predicted: y_pred.len(),
        });
    }
    if y_true.is_empty() {
        return Err(EvaluationError::Empty);
    }

    let labels: Vec<String> = y_true
        .iter()
        .chain(y_pred)
        .cloned()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let index: HashMap<&str, usize> = labels
        .iter()
        .enumerate()
        .map(|(i, l)| (l.as_str(), i))
        .collect();

    let k = labels.len();
    let mut confusion = vec![vec![0u64; k]; k];
    for (t, p) in y_true.iter().zip(y_pred) {
        confusion[index[t.as_str()]][index[p.as_str()]] += 1;
    }

    let total = y_true.len();
    let correct: u64 = (0..k).map(|i| confusion[i][i]).sum();
    let accuracy = correct as f64 / total as f64;

    let mut classes = BTreeMap::new();
    let mut per_class = Vec::with_capacity(k);
    for (i, label) in labels.iter().enumerate() {
        let tp = confusion[i][i] as f64;
        let support: u64 = confusion[i].iter().sum();
        let predicted: u64 = confusion.iter().map(|row| row[i]).sum();

        let precision = ratio(tp, predicted as f64);
        let recall = ratio(tp, support as f64);
        let scores = ClassScores {
            precision,
            recall,
            f1_score: f1(precision, recall),
            support: support as usize,
        };
        per_class.push(scores);
        classes.insert(label.clone(), scores);
    }

    let macro_avg = average(&per_class, |_| 1.0, total);
    let weighted_avg = average(&per_class, |s| s.support as f64, total);

    Ok(ModelMetrics {
        accuracy,
        precision: weighted_avg.precision,
        recall: weighted_avg.recall,
        f1_score: weighted_avg.f1_score,
        confusion_matrix: confusion,
        labels,
        classification_report: ClassificationReport {
            classes,
            accuracy,
            macro_avg,
            weighted_avg,
        },
    })
}

fn ratio(num: f64, den: f64) -> f64 {
    if den == 0.0 {
        0.0
    } else {
        num / den
    }
}

fn f1(precision: f64, recall: f64) -> f64 {
    ratio(2.0 * precision * recall, precision + recall)
}

fn average(scores: &[ClassScores], weight: impl Fn(&ClassScores) -> f64, total: usize) -> ClassScores {
    let weights: Vec<f64> = scores.iter().map(&weight).collect();
    let sum: f64 = weights.iter().sum();
    let avg = |value: fn(&ClassScores) -> f64| {
        ratio(
            scores.iter().zip(&weights).map(|(s, w)| value(s) * w).sum(),
            sum,
        )
    };
    ClassScores {
        precision: avg(|s| s.precision),
        recall: avg(|s| s.recall),
        f1_score: avg(|s| s.f1_score),
        support: total,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn labels(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn perfect_predictions_score_one() {
        let y = labels(&["a", "b", "c", "a"]);
        let m = evaluate(&y, &y).unwrap();
        assert_eq!(m.accuracy, 1.0);
        assert_eq!(m.precision, 1.0);
        assert_eq!(m.recall, 1.0);
        assert_eq!(m.f1_score, 1.0);
        assert_eq!(m.confusion_matrix, vec![vec![2, 0, 0], vec![0, 1, 0], vec![0, 0, 1]]);
    }

    #[test]
    fn mixed_predictions_match_hand_computed_values() {
        // true:  a a a b b c
        // pred:  a a b b c c
        let y_true = labels(&["a", "a", "a", "b", "b", "c"]);
        let y_pred = labels(&["a", "a", "b", "b", "c", "c"]);
        let m = evaluate(&y_true, &y_pred).unwrap();

        assert_eq!(m.labels, vec!["a", "b", "c"]);
        assert_eq!(
            m.confusion_matrix,
            vec![vec![2, 1, 0], vec![0, 1, 1], vec![0, 0, 1]]
        );
        assert!(close(m.accuracy, 4.0 / 6.0));

        let report = &m.classification_report;
        let a = report.classes["a"];
        assert!(close(a.precision, 1.0));
        assert!(close(a.recall, 2.0 / 3.0));
        assert!(close(a.f1_score, 0.8));
        assert_eq!(a.support, 3);

        let b = report.classes["b"];
        assert!(close(b.precision, 0.5));
        assert!(close(b.recall, 0.5));

        let c = report.classes["c"];
        assert!(close(c.precision, 0.5));
        assert!(close(c.recall, 1.0));
        assert!(close(c.f1_score, 2.0 / 3.0));

        // weighted precision = (3*1 + 2*0.5 + 1*0.5) / 6
        assert!(close(m.precision, 4.5 / 6.0));
        // weighted recall equals accuracy
        assert!(close(m.recall, m.accuracy));
        assert!(close(report.macro_avg.precision, 2.0 / 3.0));
        assert_eq!(report.weighted_avg.support, 6);
    }

    #[test]
    fn never_predicted_class_has_zero_precision() {
        let y_true = labels(&["a", "b"]);
        let y_pred = labels(&["a", "a"]);
        let m = evaluate(&y_true, &y_pred).unwrap();
        let b = m.classification_report.classes["b"];
        assert_eq!(b.precision, 0.0);
        assert_eq!(b.recall, 0.0);
        assert_eq!(b.f1_score, 0.0);
    }

    #[test]
    fn predicted_label_absent_from_truth_is_included() {
        let y_true = labels(&["a", "a"]);
        let y_pred = labels(&["a", "z"]);
        let m = evaluate(&y_true, &y_pred).unwrap();
        assert_eq!(m.labels, vec!["a", "z"]);
        assert_eq!(m.classification_report.classes["z"].support, 0);
        assert_eq!(m.classification_report.classes["z"].recall, 0.0);
    }

    #[test]
    fn report_serializes_with_report_keys() {
        let y = labels(&["a", "b"]);
        let m = evaluate(&y, &y).unwrap();
        let json = serde_json::to_value(&m).unwrap();

        let report = &json["classification_report"];
        assert_eq!(report["a"]["f1-score"], 1.0);
        assert_eq!(report["a"]["support"], 1);
        assert_eq!(report["accuracy"], 1.0);
        assert!(report.get("macro avg").is_some());
        assert!(report.get("weighted avg").is_some());
        assert_eq!(json["confusion_matrix"][0][0], 1);
        assert!(json.get("f1_score").is_some());
    }

    #[test]
    fn rejects_empty_and_mismatched_inputs() {
        assert!(matches!(evaluate(&[], &[]), Err(EvaluationError::Empty)));
        assert!(matches!(
            evaluate(&labels(&["a"]), &[]),
            Err(EvaluationError::LengthMismatch { truth: 1, predicted: 0 })
        ));
    }

    #[test]
    fn save_writes_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metrics.json");
        let y = labels(&["a", "b"]);
        evaluate(&y, &y).unwrap().save(&path).unwrap();

        let value: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(value["accuracy"], 1.0);
    }
}

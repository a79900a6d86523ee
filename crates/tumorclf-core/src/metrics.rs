//! Classification metrics computed from a confusion matrix.

use crate::{CoreError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Counts indexed as `counts[actual][predicted]` over the sorted union of
/// labels seen in either vector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    labels: Vec<u32>,
    counts: Vec<Vec<usize>>,
}

impl ConfusionMatrix {
    pub fn from_predictions(y_true: &[u32], y_pred: &[u32]) -> Result<Self> {
        if y_true.len() != y_pred.len() {
            return Err(CoreError::InvalidInput(format!(
                "{} true labels but {} predictions",
                y_true.len(),
                y_pred.len()
            )));
        }
        if y_true.is_empty() {
            return Err(CoreError::InvalidInput(
                "cannot score an empty prediction set".to_string(),
            ));
        }

        let labels: Vec<u32> = y_true
            .iter()
            .chain(y_pred)
            .copied()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let position = |label: u32| labels.iter().position(|l| *l == label).unwrap_or(0);

        let mut counts = vec![vec![0usize; labels.len()]; labels.len()];
        for (actual, predicted) in y_true.iter().zip(y_pred) {
            counts[position(*actual)][position(*predicted)] += 1;
        }

        Ok(Self { labels, counts })
    }

    pub fn labels(&self) -> &[u32] {
        &self.labels
    }

    pub fn counts(&self) -> &[Vec<usize>] {
        &self.counts
    }

    pub fn total(&self) -> usize {
        self.counts.iter().flatten().sum()
    }

    pub fn accuracy(&self) -> f64 {
        let correct: usize = (0..self.labels.len()).map(|i| self.counts[i][i]).sum();
        correct as f64 / self.total() as f64
    }

    /// Per-class F1 averaged with weights equal to each class's true support.
    pub fn weighted_f1(&self) -> f64 {
        let total = self.total() as f64;
        (0..self.labels.len())
            .map(|i| {
                let support: usize = self.counts[i].iter().sum();
                support as f64 * self.f1_for(i) / total
            })
            .sum()
    }

    fn f1_for(&self, class: usize) -> f64 {
        let tp = self.counts[class][class];
        let fp: usize = (0..self.labels.len())
            .filter(|row| *row != class)
            .map(|row| self.counts[row][class])
            .sum();
        let fn_: usize = self.counts[class].iter().sum::<usize>() - tp;

        let denominator = 2 * tp + fp + fn_;
        if denominator == 0 {
            0.0
        } else {
            2.0 * tp as f64 / denominator as f64
        }
    }
}

/// Scalar scores logged for every training run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EvaluationMetrics {
    pub accuracy: f64,
    pub f1_score: f64,
}

impl From<&ConfusionMatrix> for EvaluationMetrics {
    fn from(matrix: &ConfusionMatrix) -> Self {
        Self {
            accuracy: matrix.accuracy(),
            f1_score: matrix.weighted_f1(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn counts_actual_by_predicted() {
        let cm = ConfusionMatrix::from_predictions(&[0, 0, 1, 1, 1], &[0, 1, 1, 1, 0]).unwrap();
        assert_eq!(cm.labels(), &[0, 1]);
        assert_eq!(cm.counts(), &[vec![1usize, 1], vec![1usize, 2]]);
        assert_eq!(cm.total(), 5);
    }

    #[test]
    fn accuracy_and_weighted_f1() {
        let cm = ConfusionMatrix::from_predictions(&[0, 0, 1, 1, 1], &[0, 1, 1, 1, 0]).unwrap();
        let metrics = EvaluationMetrics::from(&cm);
        assert_abs_diff_eq!(metrics.accuracy, 0.6, epsilon = 1e-12);
        // class 0: f1 = 0.5 (support 2), class 1: f1 = 2/3 (support 3)
        assert_abs_diff_eq!(metrics.f1_score, 0.6, epsilon = 1e-12);
    }

    #[test]
    fn perfect_predictions_score_one() {
        let y = [1, 0, 1, 1, 0];
        let cm = ConfusionMatrix::from_predictions(&y, &y).unwrap();
        assert_abs_diff_eq!(cm.accuracy(), 1.0);
        assert_abs_diff_eq!(cm.weighted_f1(), 1.0);
    }

    #[test]
    fn predicted_only_label_has_no_weight() {
        let cm = ConfusionMatrix::from_predictions(&[0, 0], &[0, 1]).unwrap();
        assert_eq!(cm.labels(), &[0, 1]);
        // class 0: tp=1, fn=1 -> f1 = 2/3; class 1 has zero support
        assert_abs_diff_eq!(cm.weighted_f1(), 2.0 / 3.0, epsilon = 1e-12);
    }

    #[test]
    fn rejects_length_mismatch() {
        assert!(ConfusionMatrix::from_predictions(&[0, 1], &[0]).is_err());
        assert!(ConfusionMatrix::from_predictions(&[], &[]).is_err());
    }
}

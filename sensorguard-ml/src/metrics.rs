//! Classification metrics for the positive class.

use serde::{Deserialize, Serialize};

/// F1, precision and recall, with label 1 as the positive class.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassificationMetric {
    pub f1_score: f64,
    pub precision_score: f64,
    pub recall_score: f64,
}

impl ClassificationMetric {
    /// Score predictions against ground truth.
    ///
    /// Precision is 0 when nothing is predicted positive, recall is 0 when
    /// there are no positives and F1 is 0 when both are 0.
    pub fn compute<'a>(
        y_true: impl IntoIterator<Item = &'a f64>,
        y_pred: impl IntoIterator<Item = &'a f64>,
    ) -> Self {
        let (mut tp, mut fp, mut fn_) = (0usize, 0usize, 0usize);
        for (t, p) in y_true.into_iter().zip(y_pred) {
            match (*t >= 0.5, *p >= 0.5) {
                (true, true) => tp += 1,
                (false, true) => fp += 1,
                (true, false) => fn_ += 1,
                (false, false) => {}
            }
        }
        let precision = ratio(tp, tp + fp);
        let recall = ratio(tp, tp + fn_);
        let f1 = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };
        Self {
            f1_score: f1,
            precision_score: precision,
            recall_score: recall,
        }
    }
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 { 0.0 } else { num as f64 / den as f64 }
}

/// Mean and population standard deviation of fold scores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrossValidationResult {
    pub fold_scores: Vec<f64>,
    pub mean_score: f64,
    pub std_score: f64,
}

impl CrossValidationResult {
    pub fn from_scores(scores: Vec<f64>) -> Self {
        if scores.is_empty() {
            return Self {
                fold_scores: scores,
                mean_score: 0.0,
                std_score: 0.0,
            };
        }
        let mean = scores.iter().sum::<f64>() / scores.len() as f64;
        let variance =
            scores.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / scores.len() as f64;
        Self {
            fold_scores: scores,
            mean_score: mean,
            std_score: variance.sqrt(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_perfect_predictions() {
        let y = [0.0, 1.0, 1.0, 0.0];
        let m = ClassificationMetric::compute(&y, &y);
        assert_eq!(m.f1_score, 1.0);
        assert_eq!(m.precision_score, 1.0);
        assert_eq!(m.recall_score, 1.0);
    }

    #[test]
    fn test_mixed_predictions() {
        let y_true = [1.0, 1.0, 1.0, 0.0, 0.0];
        let y_pred = [1.0, 1.0, 0.0, 1.0, 0.0];
        let m = ClassificationMetric::compute(&y_true, &y_pred);
        assert!((m.precision_score - 2.0 / 3.0).abs() < 1e-12);
        assert!((m.recall_score - 2.0 / 3.0).abs() < 1e-12);
        assert!((m.f1_score - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_zero_division_conventions() {
        let m = ClassificationMetric::compute(&[1.0, 1.0], &[0.0, 0.0]);
        assert_eq!(m.precision_score, 0.0);
        assert_eq!(m.recall_score, 0.0);
        assert_eq!(m.f1_score, 0.0);

        let m = ClassificationMetric::compute(&[0.0, 0.0], &[0.0, 0.0]);
        assert_eq!(m.f1_score, 0.0);
    }

    #[test]
    fn test_cross_validation_summary() {
        let cv = CrossValidationResult::from_scores(vec![0.5, 1.0]);
        assert_eq!(cv.mean_score, 0.75);
        assert_eq!(cv.std_score, 0.25);
    }
}

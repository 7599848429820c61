//! Class rebalancing for the training split.
//!
//! [`SmoteTomek`] oversamples the minority class with SMOTE until it matches
//! the majority count, then removes the majority member of every Tomek link
//! (a pair of opposite-class rows that are each other's nearest neighbour).

use crate::error::PipelineError;
use ndarray::{Array1, Array2, ArrayView1};
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// Rows and labels after resampling.
#[derive(Debug, Clone)]
pub struct ResampleResult {
    pub x: Array2<f64>,
    pub y: Array1<f64>,
    pub n_synthetic: usize,
    pub n_removed: usize,
}

/// Rebalances a labeled training set.
pub trait Resampler {
    fn fit_resample(&self, x: &Array2<f64>, y: &Array1<f64>) -> Result<ResampleResult, PipelineError>;
}

#[derive(Debug, Clone, Copy)]
struct DistIdx(f64, usize);

impl PartialEq for DistIdx {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}
impl Eq for DistIdx {}
impl PartialOrd for DistIdx {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for DistIdx {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0).then(self.1.cmp(&other.1))
    }
}

fn sq_distance(a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y).powi(2)).sum()
}

/// SMOTE oversampling followed by Tomek-link cleaning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmoteTomek {
    pub k_neighbors: usize,
    pub seed: u64,
}

impl Default for SmoteTomek {
    fn default() -> Self {
        Self {
            k_neighbors: 5,
            seed: 42,
        }
    }
}

impl SmoteTomek {
    pub fn new(k_neighbors: usize, seed: u64) -> Self {
        Self {
            k_neighbors: k_neighbors.max(1),
            seed,
        }
    }

    /// `k` nearest rows of `rows` to `rows[target]`, excluding `target` itself.
    /// Ties resolve to the lower index.
    fn nearest(x: &Array2<f64>, rows: &[usize], target: usize, k: usize) -> Vec<usize> {
        let point = x.row(target);
        let mut heap: BinaryHeap<DistIdx> = BinaryHeap::with_capacity(k + 1);
        for &i in rows {
            if i == target {
                continue;
            }
            let candidate = DistIdx(sq_distance(point, x.row(i)), i);
            if heap.len() < k {
                heap.push(candidate);
            } else if heap.peek().is_some_and(|worst| candidate < *worst) {
                heap.pop();
                heap.push(candidate);
            }
        }
        heap.into_sorted_vec().into_iter().map(|d| d.1).collect()
    }

    fn oversample(
        &self,
        x: &Array2<f64>,
        minority_rows: &[usize],
        n_to_generate: usize,
    ) -> Vec<Vec<f64>> {
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let k = self.k_neighbors.min(minority_rows.len().saturating_sub(1));
        let neighbours: Vec<Vec<usize>> = minority_rows
            .iter()
            .map(|&i| Self::nearest(x, minority_rows, i, k))
            .collect();

        let mut synthetic = Vec::with_capacity(n_to_generate);
        for _ in 0..n_to_generate {
            let pick = rng.gen_range(0..minority_rows.len());
            let base = x.row(minority_rows[pick]);
            let sample = match neighbours[pick].as_slice() {
                [] => base.to_vec(),
                candidates => {
                    let neighbour = x.row(candidates[rng.gen_range(0..candidates.len())]);
                    let gap: f64 = rng.r#gen();
                    base.iter()
                        .zip(neighbour.iter())
                        .map(|(p, n)| p + gap * (n - p))
                        .collect()
                }
            };
            synthetic.push(sample);
        }
        synthetic
    }

    /// Indices of majority rows that sit in a Tomek link.
    fn tomek_majority(x: &Array2<f64>, y: &Array1<f64>, majority: f64) -> Vec<usize> {
        let all: Vec<usize> = (0..x.nrows()).collect();
        let nn: Vec<Option<usize>> = all
            .iter()
            .map(|&i| Self::nearest(x, &all, i, 1).first().copied())
            .collect();

        let mut removed = Vec::new();
        for (i, partner) in nn.iter().enumerate() {
            let Some(j) = *partner else { continue };
            if y[i] != y[j] && nn[j] == Some(i) && y[i] == majority {
                removed.push(i);
            }
        }
        removed
    }
}

impl Resampler for SmoteTomek {
    fn fit_resample(&self, x: &Array2<f64>, y: &Array1<f64>) -> Result<ResampleResult, PipelineError> {
        if x.nrows() != y.len() {
            return Err(PipelineError::transform(format!(
                "{} rows but {} labels",
                x.nrows(),
                y.len()
            )));
        }
        let positives: Vec<usize> = (0..y.len()).filter(|&i| y[i] == 1.0).collect();
        let negatives: Vec<usize> = (0..y.len()).filter(|&i| y[i] == 0.0).collect();
        if positives.len() + negatives.len() != y.len() {
            return Err(PipelineError::transform("labels must be 0 or 1"));
        }
        if positives.is_empty() || negatives.is_empty() {
            return Err(PipelineError::transform(
                "resampling needs both classes in the training split",
            ));
        }

        let (minority_rows, majority_label) = if positives.len() <= negatives.len() {
            (&positives, 0.0)
        } else {
            (&negatives, 1.0)
        };
        let minority_label = 1.0 - majority_label;
        let majority_count = y.len() - minority_rows.len();
        let n_to_generate = majority_count - minority_rows.len();
        let synthetic = self.oversample(x, minority_rows, n_to_generate);

        let n_original = x.nrows();
        let n_features = x.ncols();
        let n_total = n_original + synthetic.len();
        let balanced_x = Array2::from_shape_fn((n_total, n_features), |(i, j)| {
            if i < n_original {
                x[[i, j]]
            } else {
                synthetic[i - n_original][j]
            }
        });
        let balanced_y = Array1::from_shape_fn(n_total, |i| {
            if i < n_original { y[i] } else { minority_label }
        });

        let removed = Self::tomek_majority(&balanced_x, &balanced_y, majority_label);
        let keep: Vec<usize> = (0..n_total).filter(|i| removed.binary_search(i).is_err()).collect();

        tracing::debug!(
            original = n_original,
            synthetic = synthetic.len(),
            tomek_removed = removed.len(),
            "Resampled training split"
        );

        Ok(ResampleResult {
            x: balanced_x.select(ndarray::Axis(0), &keep),
            y: balanced_y.select(ndarray::Axis(0), &keep),
            n_synthetic: synthetic.len(),
            n_removed: removed.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn count(y: &Array1<f64>, label: f64) -> usize {
        y.iter().filter(|v| **v == label).count()
    }

    #[test]
    fn test_minority_is_oversampled_to_majority() {
        let x = Array2::from_shape_fn((12, 2), |(i, j)| {
            if i < 9 { i as f64 + j as f64 } else { 100.0 + i as f64 * 2.0 + j as f64 }
        });
        let y = Array1::from_shape_fn(12, |i| if i < 9 { 0.0 } else { 1.0 });
        let out = SmoteTomek::default().fit_resample(&x, &y).unwrap();

        assert_eq!(out.n_synthetic, 6);
        assert_eq!(out.n_removed, 0);
        assert_eq!(count(&out.y, 0.0), 9);
        assert_eq!(count(&out.y, 1.0), 9);
        for row in out.x.rows().into_iter().skip(12) {
            assert!(row[0] >= 118.0 && row[0] <= 122.0);
        }
    }

    #[test]
    fn test_resampling_is_deterministic() {
        let x = Array2::from_shape_fn((10, 3), |(i, j)| (i * 3 + j) as f64 * 0.7);
        let y = Array1::from_shape_fn(10, |i| if i % 4 == 0 { 1.0 } else { 0.0 });
        let a = SmoteTomek::new(5, 7).fit_resample(&x, &y).unwrap();
        let b = SmoteTomek::new(5, 7).fit_resample(&x, &y).unwrap();
        assert_eq!(a.x, b.x);
        assert_eq!(a.y, b.y);
    }

    #[test]
    fn test_tomek_link_removes_majority_member() {
        // rows 1 and 2 are mutual nearest neighbours with opposite labels
        let x = array![[0.0], [5.0], [5.1], [20.0]];
        let y = array![0.0, 0.0, 1.0, 1.0];
        let out = SmoteTomek::default().fit_resample(&x, &y).unwrap();
        assert_eq!(out.n_synthetic, 0);
        assert_eq!(out.n_removed, 1);
        assert_eq!(out.x, array![[0.0], [5.1], [20.0]]);
        assert_eq!(out.y, array![0.0, 1.0, 1.0]);
    }

    #[test]
    fn test_duplicate_rows_do_not_form_links_within_a_class() {
        let x = array![[1.0], [1.0], [1.0], [9.0], [9.0], [9.0]];
        let y = array![0.0, 0.0, 0.0, 1.0, 1.0, 1.0];
        let out = SmoteTomek::default().fit_resample(&x, &y).unwrap();
        assert_eq!(out.n_synthetic, 0);
        assert_eq!(out.n_removed, 0);
        assert_eq!(out.x, x);
    }

    #[test]
    fn test_single_class_is_rejected() {
        let x = array![[1.0], [2.0]];
        let y = array![0.0, 0.0];
        assert!(SmoteTomek::default().fit_resample(&x, &y).is_err());
    }
}

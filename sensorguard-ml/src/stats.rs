//! Two-sample Kolmogorov-Smirnov test.
//!
//! The statistic is the largest gap between the two empirical CDFs. The
//! p-value uses the asymptotic Kolmogorov distribution with Stephens'
//! small-sample correction.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KsResult {
    pub statistic: f64,
    pub p_value: f64,
}

/// Compare two samples. `NaN` values are ignored.
///
/// An empty side (after dropping `NaN`) gives no evidence of a difference
/// and yields `statistic = 0`, `p_value = 1`.
pub fn ks_2samp(a: &[f64], b: &[f64]) -> KsResult {
    let mut a: Vec<f64> = a.iter().copied().filter(|v| !v.is_nan()).collect();
    let mut b: Vec<f64> = b.iter().copied().filter(|v| !v.is_nan()).collect();
    if a.is_empty() || b.is_empty() {
        return KsResult {
            statistic: 0.0,
            p_value: 1.0,
        };
    }
    a.sort_by(|x, y| x.partial_cmp(y).unwrap_or(Ordering::Equal));
    b.sort_by(|x, y| x.partial_cmp(y).unwrap_or(Ordering::Equal));

    let statistic = ks_statistic(&a, &b);
    let n1 = a.len() as f64;
    let n2 = b.len() as f64;
    let en = (n1 * n2 / (n1 + n2)).sqrt();
    let p_value = kolmogorov_q((en + 0.12 + 0.11 / en) * statistic);

    KsResult { statistic, p_value }
}

/// Largest ECDF gap between two sorted samples.
fn ks_statistic(a: &[f64], b: &[f64]) -> f64 {
    let (n1, n2) = (a.len() as f64, b.len() as f64);
    let (mut i, mut j) = (0usize, 0usize);
    let mut d: f64 = 0.0;
    while i < a.len() && j < b.len() {
        let x = a[i].min(b[j]);
        while i < a.len() && a[i] <= x {
            i += 1;
        }
        while j < b.len() && b[j] <= x {
            j += 1;
        }
        d = d.max((i as f64 / n1 - j as f64 / n2).abs());
    }
    d
}

/// Survival function of the Kolmogorov distribution.
fn kolmogorov_q(lambda: f64) -> f64 {
    const EPS1: f64 = 1e-3;
    const EPS2: f64 = 1e-8;

    if lambda < 0.2 {
        return 1.0;
    }
    let a2 = -2.0 * lambda * lambda;
    let mut fac = 2.0;
    let mut sum = 0.0;
    let mut term_prev: f64 = 0.0;
    for k in 1..=100 {
        let kf = k as f64;
        let term = fac * (a2 * kf * kf).exp();
        sum += term;
        if term.abs() <= EPS1 * term_prev || term.abs() <= EPS2 * sum {
            return sum.clamp(0.0, 1.0);
        }
        fac = -fac;
        term_prev = term.abs();
    }
    1.0
}

/// Map text values to their rank in the sorted union of both samples.
///
/// Missing cells map to `NaN`.
pub fn rank_categories(a: &[Option<&str>], b: &[Option<&str>]) -> (Vec<f64>, Vec<f64>) {
    let mut categories: Vec<&str> = a.iter().chain(b).filter_map(|v| *v).collect();
    categories.sort_unstable();
    categories.dedup();
    let rank = |v: &Option<&str>| match v {
        Some(s) => categories
            .binary_search(s)
            .map(|r| r as f64)
            .unwrap_or(f64::NAN),
        None => f64::NAN,
    };
    (a.iter().map(rank).collect(), b.iter().map(rank).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_samples_have_p_one() {
        let a: Vec<f64> = (0..50).map(|i| (i % 7) as f64).collect();
        let r = ks_2samp(&a, &a);
        assert_eq!(r.statistic, 0.0);
        assert!((r.p_value - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_disjoint_samples_drift() {
        let a: Vec<f64> = (0..50).map(|i| i as f64).collect();
        let b: Vec<f64> = (100..150).map(|i| i as f64).collect();
        let r = ks_2samp(&a, &b);
        assert_eq!(r.statistic, 1.0);
        assert!(r.p_value < 1e-6);
    }

    #[test]
    fn test_statistic_on_partial_overlap() {
        let a = [1.0, 2.0, 3.0, 4.0];
        let b = [3.0, 4.0, 5.0, 6.0];
        let r = ks_2samp(&a, &b);
        assert!((r.statistic - 0.5).abs() < 1e-12);
        assert!(r.p_value > 0.05);
    }

    #[test]
    fn test_nan_values_are_ignored() {
        let a = [1.0, f64::NAN, 2.0];
        let b = [1.0, 2.0, f64::NAN, f64::NAN];
        let r = ks_2samp(&a, &b);
        assert_eq!(r.statistic, 0.0);
        assert_eq!(r.p_value, 1.0);
    }

    #[test]
    fn test_empty_side_is_not_drift() {
        let r = ks_2samp(&[f64::NAN], &[1.0, 2.0]);
        assert_eq!(r.p_value, 1.0);
    }

    #[test]
    fn test_kolmogorov_q_is_monotone() {
        let mut last = 1.0;
        for step in 1..40 {
            let q = kolmogorov_q(step as f64 * 0.1);
            assert!(q <= last + 1e-12);
            assert!((0.0..=1.0).contains(&q));
            last = q;
        }
        assert!((kolmogorov_q(1.36) - 0.049).abs() < 0.002);
    }

    #[test]
    fn test_rank_categories() {
        let (a, b) = rank_categories(&[Some("pos"), Some("neg"), None], &[Some("neg")]);
        assert_eq!(a[0], 1.0);
        assert_eq!(a[1], 0.0);
        assert!(a[2].is_nan());
        assert_eq!(b, vec![0.0]);
    }
}

//! Feature transforms.
//!
//! A [`Transformer`] holds hyperparameters and learns from training data;
//! fitting yields a [`FittedTransformer`] that only applies what it learned.
//! The pipeline uses [`FeaturePipeline`]: constant imputation followed by
//! robust scaling. Its fitted form, [`FeatureTransform`], is what gets
//! persisted and bundled with the classifier.

use crate::error::PipelineError;
use ndarray::{Array2, Axis};
use serde::{Deserialize, Serialize};

/// Unfitted transformer.
pub trait Transformer {
    type Fitted: FittedTransformer;

    /// Learn parameters from `data`.
    fn fit(&self, data: &Array2<f64>) -> Result<Self::Fitted, PipelineError>;

    fn fit_transform(
        &self,
        data: &Array2<f64>,
    ) -> Result<(Self::Fitted, Array2<f64>), PipelineError> {
        let fitted = self.fit(data)?;
        let out = fitted.transform(data)?;
        Ok((fitted, out))
    }
}

/// Fitted transformer, ready to apply to new rows.
pub trait FittedTransformer {
    fn transform(&self, data: &Array2<f64>) -> Result<Array2<f64>, PipelineError>;

    fn n_features_in(&self) -> usize;

    fn check_width(&self, data: &Array2<f64>) -> Result<(), PipelineError> {
        if data.ncols() != self.n_features_in() {
            return Err(PipelineError::transform(format!(
                "expected {} features, got {}",
                self.n_features_in(),
                data.ncols()
            )));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Constant imputer
// ---------------------------------------------------------------------------

/// Replace `NaN` with a constant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimpleImputer {
    pub fill_value: f64,
}

impl Default for SimpleImputer {
    fn default() -> Self {
        Self { fill_value: 0.0 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedSimpleImputer {
    pub fill_value: f64,
    pub n_features: usize,
}

impl Transformer for SimpleImputer {
    type Fitted = FittedSimpleImputer;

    fn fit(&self, data: &Array2<f64>) -> Result<Self::Fitted, PipelineError> {
        Ok(FittedSimpleImputer {
            fill_value: self.fill_value,
            n_features: data.ncols(),
        })
    }
}

impl FittedTransformer for FittedSimpleImputer {
    fn transform(&self, data: &Array2<f64>) -> Result<Array2<f64>, PipelineError> {
        self.check_width(data)?;
        let fill = self.fill_value;
        Ok(data.mapv(|v| if v.is_nan() { fill } else { v }))
    }

    fn n_features_in(&self) -> usize {
        self.n_features
    }
}

// ---------------------------------------------------------------------------
// Robust scaler
// ---------------------------------------------------------------------------

/// Center by the median and scale by the interquartile range.
///
/// A feature with zero IQR keeps a scale of 1.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RobustScaler {
    pub quantile_range: (f64, f64),
}

impl Default for RobustScaler {
    fn default() -> Self {
        Self {
            quantile_range: (25.0, 75.0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedRobustScaler {
    pub center: Vec<f64>,
    pub scale: Vec<f64>,
}

/// Linear-interpolated percentile of sorted data.
fn percentile(sorted: &[f64], q: f64) -> f64 {
    let n = sorted.len();
    if n == 0 {
        return 0.0;
    }
    let idx = (q / 100.0 * (n - 1) as f64).clamp(0.0, (n - 1) as f64);
    let lower = idx.floor() as usize;
    let upper = (lower + 1).min(n - 1);
    let frac = idx - lower as f64;
    sorted[lower] * (1.0 - frac) + sorted[upper] * frac
}

impl Transformer for RobustScaler {
    type Fitted = FittedRobustScaler;

    fn fit(&self, data: &Array2<f64>) -> Result<Self::Fitted, PipelineError> {
        let (low, high) = self.quantile_range;
        if !(0.0..100.0).contains(&low) || high <= low || high > 100.0 {
            return Err(PipelineError::transform(format!(
                "invalid quantile range ({low}, {high})"
            )));
        }
        if data.nrows() == 0 {
            return Err(PipelineError::transform("cannot fit scaler on empty data"));
        }

        let mut center = Vec::with_capacity(data.ncols());
        let mut scale = Vec::with_capacity(data.ncols());
        for column in data.axis_iter(Axis(1)) {
            if column.iter().any(|v| !v.is_finite()) {
                return Err(PipelineError::transform(
                    "scaler input contains non-finite values",
                ));
            }
            let mut sorted: Vec<f64> = column.to_vec();
            sorted.sort_by(|a, b| a.total_cmp(b));
            center.push(percentile(&sorted, 50.0));
            let iqr = percentile(&sorted, high) - percentile(&sorted, low);
            scale.push(if iqr == 0.0 { 1.0 } else { iqr });
        }
        Ok(FittedRobustScaler { center, scale })
    }
}

impl FittedTransformer for FittedRobustScaler {
    fn transform(&self, data: &Array2<f64>) -> Result<Array2<f64>, PipelineError> {
        self.check_width(data)?;
        let mut out = data.clone();
        for (j, mut column) in out.axis_iter_mut(Axis(1)).enumerate() {
            let (c, s) = (self.center[j], self.scale[j]);
            column.mapv_inplace(|v| (v - c) / s);
        }
        Ok(out)
    }

    fn n_features_in(&self) -> usize {
        self.center.len()
    }
}

// ---------------------------------------------------------------------------
// Imputer + scaler
// ---------------------------------------------------------------------------

/// Constant imputation followed by robust scaling.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeaturePipeline {
    pub imputer: SimpleImputer,
    pub scaler: RobustScaler,
}

/// Fitted [`FeaturePipeline`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureTransform {
    pub imputer: FittedSimpleImputer,
    pub scaler: FittedRobustScaler,
}

impl Transformer for FeaturePipeline {
    type Fitted = FeatureTransform;

    fn fit(&self, data: &Array2<f64>) -> Result<Self::Fitted, PipelineError> {
        let (imputer, imputed) = self.imputer.fit_transform(data)?;
        let scaler = self.scaler.fit(&imputed)?;
        Ok(FeatureTransform { imputer, scaler })
    }
}

impl FittedTransformer for FeatureTransform {
    fn transform(&self, data: &Array2<f64>) -> Result<Array2<f64>, PipelineError> {
        let imputed = self.imputer.transform(data)?;
        self.scaler.transform(&imputed)
    }

    fn n_features_in(&self) -> usize {
        self.imputer.n_features_in()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn data() -> Array2<f64> {
        array![
            [1.0, 10.0, 5.0],
            [2.0, f64::NAN, 5.0],
            [3.0, 30.0, 5.0],
            [4.0, 40.0, 5.0],
            [100.0, 50.0, 5.0],
        ]
    }

    #[test]
    fn test_imputer_fills_nan_with_constant() {
        let fitted = SimpleImputer::default().fit(&data()).unwrap();
        let out = fitted.transform(&data()).unwrap();
        assert_eq!(out[[1, 1]], 0.0);
        assert_eq!(out[[0, 1]], 10.0);
    }

    #[test]
    fn test_robust_scaler_uses_median_and_iqr() {
        let x = array![[1.0], [2.0], [3.0], [4.0], [100.0]];
        let fitted = RobustScaler::default().fit(&x).unwrap();
        assert_eq!(fitted.center, vec![3.0]);
        assert_eq!(fitted.scale, vec![2.0]);
        let out = fitted.transform(&x).unwrap();
        assert_eq!(out[[0, 0]], -1.0);
        assert_eq!(out[[4, 0]], 48.5);
    }

    #[test]
    fn test_constant_feature_keeps_unit_scale() {
        let fitted = FeaturePipeline::default().fit(&data()).unwrap();
        assert_eq!(fitted.scaler.scale[2], 1.0);
        let out = fitted.transform(&data()).unwrap();
        assert!(out.column(2).iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_transform_is_idempotent_for_same_input() {
        let fitted = FeaturePipeline::default().fit(&data()).unwrap();
        let first = fitted.transform(&data()).unwrap();
        let second = fitted.transform(&data()).unwrap();
        assert_eq!(first, second);
        assert!(first.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_width_mismatch_is_rejected() {
        let fitted = FeaturePipeline::default().fit(&data()).unwrap();
        let err = fitted.transform(&array![[1.0, 2.0]]).unwrap_err();
        assert!(matches!(err, PipelineError::Transform(_)));
    }

    #[test]
    fn test_fit_on_train_applies_to_test_without_refit() {
        let fitted = FeaturePipeline::default().fit(&data()).unwrap();
        let test = array![[3.0, 30.0, 5.0]];
        let before = fitted.clone();
        let out = fitted.transform(&test).unwrap();
        assert_eq!(fitted, before);
        assert_eq!(out[[0, 0]], 0.0);
    }
}

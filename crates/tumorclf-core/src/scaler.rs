//! Per-feature standardization.

use crate::{CoreError, Result};
use ndarray::{Array1, Array2, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

/// Standardizes features as `(x - mean) / scale`.
///
/// A scaler only exists once fitted, so there is no way to transform with
/// unfitted parameters. `scale` is the population standard deviation of the
/// fitting rows; constant features keep `scale = 1`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    mean: Vec<f64>,
    scale: Vec<f64>,
    n_samples_seen: usize,
}

impl StandardScaler {
    pub fn fit(x: ArrayView2<'_, f64>) -> Result<Self> {
        if x.nrows() == 0 || x.ncols() == 0 {
            return Err(CoreError::InvalidInput(format!(
                "cannot fit a scaler on a {}x{} matrix",
                x.nrows(),
                x.ncols()
            )));
        }

        let mean = x
            .mean_axis(Axis(0))
            .ok_or_else(|| CoreError::InvalidInput("empty matrix".to_string()))?;
        let scale = x.var_axis(Axis(0), 0.0).mapv(|var| {
            let std = var.sqrt();
            if std < 10.0 * f64::EPSILON {
                1.0
            } else {
                std
            }
        });

        Ok(Self {
            mean: mean.to_vec(),
            scale: scale.to_vec(),
            n_samples_seen: x.nrows(),
        })
    }

    pub fn transform(&self, x: ArrayView2<'_, f64>) -> Result<Array2<f64>> {
        if x.ncols() != self.n_features() {
            return Err(CoreError::FeatureMismatch {
                expected: self.n_features(),
                got: x.ncols(),
            });
        }

        let mean = Array1::from(self.mean.clone());
        let scale = Array1::from(self.scale.clone());
        Ok((&x - &mean) / &scale)
    }

    /// Fit on `x` and return the scaled copy of `x`.
    pub fn fit_transform(x: ArrayView2<'_, f64>) -> Result<(Self, Array2<f64>)> {
        let scaler = Self::fit(x)?;
        let scaled = scaler.transform(x)?;
        Ok((scaler, scaled))
    }

    pub fn n_features(&self) -> usize {
        self.mean.len()
    }

    pub fn n_samples_seen(&self) -> usize {
        self.n_samples_seen
    }

    pub fn mean(&self) -> &[f64] {
        &self.mean
    }

    pub fn scale(&self) -> &[f64] {
        &self.scale
    }

    pub fn to_json(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(self)?)
    }

    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        let scaler: Self = serde_json::from_slice(bytes)?;
        if scaler.mean.len() != scaler.scale.len() {
            return Err(CoreError::InvalidInput(format!(
                "scaler has {} means but {} scales",
                scaler.mean.len(),
                scaler.scale.len()
            )));
        }
        Ok(scaler)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn fit_uses_population_std() {
        let x = array![[1.0, 10.0], [3.0, 10.0]];
        let scaler = StandardScaler::fit(x.view()).unwrap();
        assert_eq!(scaler.mean(), &[2.0, 10.0]);
        // Constant column falls back to unit scale.
        assert_eq!(scaler.scale(), &[1.0, 1.0]);

        let scaled = scaler.transform(x.view()).unwrap();
        assert_abs_diff_eq!(scaled[[0, 0]], -1.0);
        assert_abs_diff_eq!(scaled[[1, 0]], 1.0);
        assert_abs_diff_eq!(scaled[[1, 1]], 0.0);
    }

    #[test]
    fn fit_transform_centers_columns() {
        let x = array![[1.0, 2.0], [2.0, 4.0], [6.0, 9.0]];
        let (_, scaled) = StandardScaler::fit_transform(x.view()).unwrap();
        for col in scaled.columns() {
            assert_abs_diff_eq!(col.mean().unwrap(), 0.0, epsilon = 1e-12);
            assert_abs_diff_eq!(col.var(0.0), 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn transform_rejects_wrong_width() {
        let scaler = StandardScaler::fit(array![[1.0, 2.0], [3.0, 4.0]].view()).unwrap();
        let err = scaler.transform(array![[1.0, 2.0, 3.0]].view()).unwrap_err();
        assert!(matches!(
            err,
            CoreError::FeatureMismatch {
                expected: 2,
                got: 3
            }
        ));
    }

    #[test]
    fn json_round_trip_keeps_parameters() {
        let scaler = StandardScaler::fit(array![[1.0, 5.0], [3.0, 9.0]].view()).unwrap();
        let restored = StandardScaler::from_json(&scaler.to_json().unwrap()).unwrap();
        assert_eq!(scaler, restored);
    }

    #[test]
    fn empty_matrix_is_rejected() {
        let x = Array2::<f64>::zeros((0, 3));
        assert!(StandardScaler::fit(x.view()).is_err());
    }
}

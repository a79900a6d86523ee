//! Random-forest classifier with a fixed input width.

use crate::{CoreError, Result};
use ndarray::{ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};
use smartcore::ensemble::random_forest_classifier::{
    RandomForestClassifier, RandomForestClassifierParameters,
};
use smartcore::linalg::basic::matrix::DenseMatrix;
use std::collections::BTreeSet;
use std::fmt;

type Forest = RandomForestClassifier<f64, u32, DenseMatrix<f64>, Vec<u32>>;

/// Seed used for every forest fit so repeated runs are reproducible.
pub const FOREST_SEED: u64 = 42;

/// Hyperparameters of the ensemble.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForestParams {
    /// Number of trees.
    pub n_estimators: u16,
    /// Maximum tree depth; `None` grows trees until leaves are pure.
    pub max_depth: Option<u16>,
    pub seed: u64,
}

impl ForestParams {
    pub fn new(n_estimators: u16, max_depth: Option<u16>) -> Self {
        Self {
            n_estimators,
            max_depth,
            seed: FOREST_SEED,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.n_estimators == 0 {
            return Err(CoreError::InvalidHyperparameter(
                "n_estimators must be at least 1".to_string(),
            ));
        }
        if self.max_depth == Some(0) {
            return Err(CoreError::InvalidHyperparameter(
                "max_depth must be at least 1 when set".to_string(),
            ));
        }
        Ok(())
    }

    fn estimator_parameters(&self) -> RandomForestClassifierParameters {
        let params = RandomForestClassifierParameters::default()
            .with_n_trees(self.n_estimators)
            .with_seed(self.seed);
        match self.max_depth {
            Some(depth) => params.with_max_depth(depth),
            None => params,
        }
    }
}

impl Default for ForestParams {
    fn default() -> Self {
        Self::new(100, None)
    }
}

impl fmt::Display for ForestParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.max_depth {
            Some(depth) => write!(f, "n_estimators={}, max_depth={}", self.n_estimators, depth),
            None => write!(f, "n_estimators={}, max_depth=None", self.n_estimators),
        }
    }
}

/// Fitted forest plus the shape information needed to validate inputs.
#[derive(Serialize, Deserialize)]
pub struct ForestClassifier {
    params: ForestParams,
    n_features: usize,
    classes: Vec<u32>,
    forest: Forest,
}

impl ForestClassifier {
    pub fn fit(x: ArrayView2<'_, f64>, y: ArrayView1<'_, u32>, params: ForestParams) -> Result<Self> {
        params.validate()?;
        if x.nrows() == 0 {
            return Err(CoreError::InvalidInput(
                "cannot fit on 0 samples".to_string(),
            ));
        }
        if x.nrows() != y.len() {
            return Err(CoreError::InvalidInput(format!(
                "{} rows but {} labels",
                x.nrows(),
                y.len()
            )));
        }

        let matrix = to_dense(x)?;
        let labels = y.to_vec();
        let classes: Vec<u32> = labels
            .iter()
            .copied()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let forest = Forest::fit(&matrix, &labels, params.estimator_parameters())?;

        Ok(Self {
            params,
            n_features: x.ncols(),
            classes,
            forest,
        })
    }

    pub fn predict(&self, x: ArrayView2<'_, f64>) -> Result<Vec<u32>> {
        if x.ncols() != self.n_features {
            return Err(CoreError::FeatureMismatch {
                expected: self.n_features,
                got: x.ncols(),
            });
        }
        if x.nrows() == 0 {
            return Err(CoreError::InvalidInput(
                "found array with 0 sample(s) while a minimum of 1 is required".to_string(),
            ));
        }

        let matrix = to_dense(x)?;
        Ok(self.forest.predict(&matrix)?)
    }

    pub fn params(&self) -> &ForestParams {
        &self.params
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn classes(&self) -> &[u32] {
        &self.classes
    }

    pub fn to_json(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

impl fmt::Debug for ForestClassifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ForestClassifier")
            .field("params", &self.params)
            .field("n_features", &self.n_features)
            .field("classes", &self.classes)
            .finish_non_exhaustive()
    }
}

fn to_dense(x: ArrayView2<'_, f64>) -> Result<DenseMatrix<f64>> {
    let values: Vec<f64> = x.iter().copied().collect();
    Ok(DenseMatrix::new(x.nrows(), x.ncols(), values, false)?)
}

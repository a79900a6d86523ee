//! Tabular classification datasets.
//!
//! The built-in dataset is the Breast Cancer Wisconsin (Diagnostic) table:
//! 569 rows, 30 numeric features and a binary label where `0` is malignant
//! and `1` is benign.

use crate::{CoreError, Result};
use ndarray::{Array1, Array2};
use std::collections::BTreeMap;

/// Class names of the built-in dataset, indexed by label.
pub const BREAST_CANCER_TARGET_NAMES: [&str; 2] = ["malignant", "benign"];

/// Column names of the built-in dataset, in column order.
pub const BREAST_CANCER_FEATURE_NAMES: [&str; 30] = [
    "mean radius",
    "mean texture",
    "mean perimeter",
    "mean area",
    "mean smoothness",
    "mean compactness",
    "mean concavity",
    "mean concave points",
    "mean symmetry",
    "mean fractal dimension",
    "radius error",
    "texture error",
    "perimeter error",
    "area error",
    "smoothness error",
    "compactness error",
    "concavity error",
    "concave points error",
    "symmetry error",
    "fractal dimension error",
    "worst radius",
    "worst texture",
    "worst perimeter",
    "worst area",
    "worst smoothness",
    "worst compactness",
    "worst concavity",
    "worst concave points",
    "worst symmetry",
    "worst fractal dimension",
];

/// Feature matrix plus labels and the ordered feature names.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub features: Array2<f64>,
    pub labels: Array1<u32>,
    pub feature_names: Vec<String>,
    pub target_names: Vec<String>,
}

impl Dataset {
    pub fn new(
        features: Array2<f64>,
        labels: Array1<u32>,
        feature_names: Vec<String>,
        target_names: Vec<String>,
    ) -> Result<Self> {
        if features.nrows() != labels.len() {
            return Err(CoreError::Dataset(format!(
                "{} feature rows but {} labels",
                features.nrows(),
                labels.len()
            )));
        }
        if features.ncols() != feature_names.len() {
            return Err(CoreError::Dataset(format!(
                "{} feature columns but {} feature names",
                features.ncols(),
                feature_names.len()
            )));
        }

        Ok(Self {
            features,
            labels,
            feature_names,
            target_names,
        })
    }

    /// Load the Breast Cancer Wisconsin (Diagnostic) dataset bundled with smartcore.
    pub fn breast_cancer() -> Result<Self> {
        let raw = smartcore::dataset::breast_cancer::load_dataset();
        let values: Vec<f64> = raw.data.iter().map(|v| f64::from(*v)).collect();
        let features = Array2::from_shape_vec((raw.num_samples, raw.num_features), values)?;
        let labels = Array1::from_vec(raw.target);

        Self::new(
            features,
            labels,
            BREAST_CANCER_FEATURE_NAMES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            BREAST_CANCER_TARGET_NAMES
                .iter()
                .map(|s| s.to_string())
                .collect(),
        )
    }

    pub fn n_samples(&self) -> usize {
        self.features.nrows()
    }

    pub fn n_features(&self) -> usize {
        self.features.ncols()
    }

    /// Number of rows per label, ordered by label.
    pub fn class_counts(&self) -> BTreeMap<u32, usize> {
        class_counts(self.labels.iter().copied())
    }
}

pub fn class_counts(labels: impl IntoIterator<Item = u32>) -> BTreeMap<u32, usize> {
    let mut counts = BTreeMap::new();
    for label in labels {
        *counts.entry(label).or_insert(0) += 1;
    }
    counts
}

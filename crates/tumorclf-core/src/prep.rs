//! Data preparation: split, then scale with parameters learned from the
//! training partition only.

use crate::dataset::Dataset;
use crate::scaler::StandardScaler;
use crate::split::stratified_split;
use crate::Result;
use ndarray::{Array1, Array2, Axis};
use tracing::debug;

pub const DEFAULT_TEST_SIZE: f64 = 0.2;
pub const DEFAULT_SEED: u64 = 42;

/// Scaled partitions plus the scaler fitted on the training rows.
#[derive(Debug, Clone)]
pub struct PreparedData {
    pub x_train: Array2<f64>,
    pub x_test: Array2<f64>,
    pub y_train: Array1<u32>,
    pub y_test: Array1<u32>,
    pub scaler: StandardScaler,
    pub feature_names: Vec<String>,
}

/// Load the built-in dataset and prepare it.
pub fn load_and_preprocess(test_size: f64, seed: u64) -> Result<PreparedData> {
    let dataset = Dataset::breast_cancer()?;
    prepare(&dataset, test_size, seed)
}

pub fn prepare(dataset: &Dataset, test_size: f64, seed: u64) -> Result<PreparedData> {
    let labels = dataset.labels.to_vec();
    let split = stratified_split(&labels, test_size, seed)?;

    let x_train = dataset.features.select(Axis(0), &split.train);
    let x_test = dataset.features.select(Axis(0), &split.test);
    let y_train = dataset.labels.select(Axis(0), &split.train);
    let y_test = dataset.labels.select(Axis(0), &split.test);

    let (scaler, x_train_scaled) = StandardScaler::fit_transform(x_train.view())?;
    let x_test_scaled = scaler.transform(x_test.view())?;

    debug!(
        train_rows = x_train_scaled.nrows(),
        test_rows = x_test_scaled.nrows(),
        features = scaler.n_features(),
        "Prepared dataset"
    );

    Ok(PreparedData {
        x_train: x_train_scaled,
        x_test: x_test_scaled,
        y_train,
        y_test,
        scaler,
        feature_names: dataset.feature_names.clone(),
    })
}

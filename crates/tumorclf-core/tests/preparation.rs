use approx::assert_abs_diff_eq;
use ndarray::{Array2, Axis};
use tumorclf_core::{
    class_counts, load_and_preprocess, prepare, stratified_split, Dataset, ForestClassifier,
    ForestParams, StandardScaler, DEFAULT_SEED, DEFAULT_TEST_SIZE,
};

#[test]
fn same_seed_yields_identical_partitions() {
    let a = load_and_preprocess(DEFAULT_TEST_SIZE, DEFAULT_SEED).unwrap();
    let b = load_and_preprocess(DEFAULT_TEST_SIZE, DEFAULT_SEED).unwrap();

    assert_eq!(a.x_train, b.x_train);
    assert_eq!(a.x_test, b.x_test);
    assert_eq!(a.y_train, b.y_train);
    assert_eq!(a.y_test, b.y_test);
    assert_eq!(a.scaler, b.scaler);
}

#[test]
fn partitions_keep_class_ratio() {
    let data = load_and_preprocess(0.2, 42).unwrap();
    assert_eq!(data.x_train.nrows(), 455);
    assert_eq!(data.x_test.nrows(), 114);
    assert_eq!(data.x_train.ncols(), 30);
    assert_eq!(data.feature_names.len(), 30);

    let test_counts = class_counts(data.y_test.iter().copied());
    assert_eq!(test_counts.get(&0), Some(&42));
    assert_eq!(test_counts.get(&1), Some(&72));

    let train_counts = class_counts(data.y_train.iter().copied());
    assert_eq!(train_counts.get(&0), Some(&170));
    assert_eq!(train_counts.get(&1), Some(&285));
}

#[test]
fn scaler_is_fitted_on_training_rows_only() {
    let dataset = Dataset::breast_cancer().unwrap();
    let split = stratified_split(dataset.labels.as_slice().unwrap(), 0.2, 42).unwrap();
    let raw_train: Array2<f64> = dataset.features.select(Axis(0), &split.train);
    let expected = StandardScaler::fit(raw_train.view()).unwrap();

    let data = prepare(&dataset, 0.2, 42).unwrap();
    assert_eq!(data.scaler.n_samples_seen(), 455);
    for (got, want) in data.scaler.mean().iter().zip(expected.mean()) {
        assert_abs_diff_eq!(*got, *want, epsilon = 1e-9);
    }

    // Training columns are standardized; the held-out rows are not exactly.
    for col in data.x_train.columns() {
        assert_abs_diff_eq!(col.mean().unwrap(), 0.0, epsilon = 1e-9);
    }
}

#[test]
fn held_out_rows_do_not_move_the_scaler() {
    let dataset = Dataset::breast_cancer().unwrap();
    let baseline = prepare(&dataset, 0.2, 42).unwrap();

    let split = stratified_split(dataset.labels.as_slice().unwrap(), 0.2, 42).unwrap();
    let mut tampered = dataset.clone();
    for &row in &split.test {
        tampered.features.row_mut(row).fill(1.0e6);
    }
    let data = prepare(&tampered, 0.2, 42).unwrap();

    assert_eq!(data.scaler, baseline.scaler);
    assert_eq!(data.scaler.scale(), baseline.scaler.scale());
    assert_eq!(data.x_train, baseline.x_train);
    assert_ne!(data.x_test, baseline.x_test);
}

#[test]
fn forest_scores_well_on_held_out_rows() {
    let data = load_and_preprocess(0.2, 42).unwrap();
    let model =
        ForestClassifier::fit(data.x_train.view(), data.y_train.view(), ForestParams::new(20, Some(5)))
            .unwrap();
    let predictions = model.predict(data.x_test.view()).unwrap();

    let correct = predictions
        .iter()
        .zip(data.y_test.iter())
        .filter(|(p, y)| p == y)
        .count();
    assert!(correct as f64 / predictions.len() as f64 > 0.85);
}

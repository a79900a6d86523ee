use std::sync::Arc;
use tempfile::TempDir;
use tumorclf_core::{ForestClassifier, StandardScaler, SCALER_ARTIFACT_PATH};
use tumorclf_tracking::{FileStore, RunStatus, RunsUri, TrackingStore};
use tumorclf_train::{
    run_batch, train_model, FailurePolicy, RunConfig, TrainError, TrainSettings,
};

struct Fixture {
    root: TempDir,
    store: Arc<dyn TrackingStore>,
    settings: TrainSettings,
}

fn fixture() -> Fixture {
    let root = tempfile::tempdir().unwrap();
    let store: Arc<dyn TrackingStore> = Arc::new(FileStore::new(root.path().join("mlruns")));
    let settings = TrainSettings {
        work_dir: root.path().join("work"),
        ..TrainSettings::default()
    };
    Fixture {
        root,
        store,
        settings,
    }
}

/// Run ids of an experiment, read from the file store layout.
fn run_ids(f: &Fixture, experiment_id: &str) -> Vec<String> {
    let dir = f.root.path().join("mlruns").join(experiment_id);
    std::fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap())
        .filter(|entry| entry.path().is_dir())
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .collect()
}

#[tokio::test]
async fn run_logs_artifacts_and_registers_model() {
    let f = fixture();
    let params = tumorclf_core::ForestParams::new(10, Some(4));

    let summary = train_model(f.store.clone(), &f.settings, params, "Quick")
        .await
        .unwrap();
    assert_eq!(summary.model_version, 1);
    assert!(summary.metrics.accuracy > 0.85);
    assert!(summary.metrics.f1_score > 0.85);

    let run = f.store.get_run(&summary.run_id).await.unwrap();
    assert_eq!(run.status, RunStatus::Finished);
    assert_eq!(run.run_name, "Quick");

    let version = f
        .store
        .get_model_version("ClassificationModel", "1")
        .await
        .unwrap();
    let source: RunsUri = version.source.parse().unwrap();
    assert_eq!(source.run_id, summary.run_id);

    let model_bytes = f
        .store
        .read_artifact(&source.run_id, &source.join("model.json"))
        .await
        .unwrap();
    let model = ForestClassifier::from_json(&model_bytes).unwrap();
    assert_eq!(model.n_features(), 30);

    let scaler_bytes = f
        .store
        .read_artifact(&summary.run_id, SCALER_ARTIFACT_PATH)
        .await
        .unwrap();
    let scaler = StandardScaler::from_json(&scaler_bytes).unwrap();
    assert_eq!(scaler.n_samples_seen(), 455);

    let svg = f
        .store
        .read_artifact(&summary.run_id, "confusion_matrix.svg")
        .await
        .unwrap();
    assert!(String::from_utf8_lossy(&svg).contains("Confusion Matrix (Acc: "));

    assert!(f
        .store
        .read_artifact(&summary.run_id, "model/input_example.json")
        .await
        .is_ok());
    assert!(f.settings.work_dir.join("scaler.json").exists());
}

#[tokio::test]
async fn invalid_hyperparameters_mark_run_failed() {
    let f = fixture();
    let params = tumorclf_core::ForestParams::new(0, None);

    let err = train_model(f.store.clone(), &f.settings, params, "Broken")
        .await
        .unwrap_err();
    assert!(matches!(err, TrainError::Core(_)));

    let experiment = f
        .store
        .get_or_create_experiment(&f.settings.experiment_name)
        .await
        .unwrap();
    let run_ids = run_ids(&f, &experiment.experiment_id);
    assert_eq!(run_ids.len(), 1);
    let run = f.store.get_run(&run_ids[0]).await.unwrap();
    assert_eq!(run.run_name, "Broken");
    assert_eq!(run.status, RunStatus::Failed);
    assert!(run.end_time.is_some());

    // No version was registered
    assert!(f
        .store
        .get_model_version("ClassificationModel", "1")
        .await
        .is_err());
}

#[tokio::test]
async fn abort_policy_stops_at_first_failure() {
    let f = fixture();
    let runs = vec![
        RunConfig::new("Broken", 0, Some(2)),
        RunConfig::new("Good", 5, Some(3)),
    ];

    let err = run_batch(f.store.clone(), &f.settings, &runs, FailurePolicy::Abort)
        .await
        .unwrap_err();
    match err {
        TrainError::RunFailed { run_name, .. } => assert_eq!(run_name, "Broken"),
        other => panic!("unexpected error: {other}"),
    }
    assert!(f
        .store
        .get_model_version("ClassificationModel", "1")
        .await
        .is_err());
}

#[tokio::test]
async fn skip_policy_continues_and_versions_increment() {
    let f = fixture();
    let runs = vec![
        RunConfig::new("First", 5, Some(3)),
        RunConfig::new("Broken", 0, None),
        RunConfig::new("Second", 5, Some(5)),
    ];

    let outcome = run_batch(f.store.clone(), &f.settings, &runs, FailurePolicy::Skip)
        .await
        .unwrap();
    assert!(!outcome.is_success());
    assert_eq!(outcome.failed.len(), 1);
    assert_eq!(outcome.failed[0].0, "Broken");

    let versions: Vec<u32> = outcome.completed.iter().map(|s| s.model_version).collect();
    assert_eq!(versions, vec![1, 2]);
}

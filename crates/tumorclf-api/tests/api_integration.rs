use axum_test::TestServer;
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::TempDir;
use tumorclf_api::{create_router, AppState, ServingState};
use tumorclf_core::{Dataset, ForestParams};
use tumorclf_tracking::{FileStore, ModelUri, TrackingStore};
use tumorclf_train::{train_model, TrainSettings};

struct ReadyService {
    _root: TempDir,
    server: TestServer,
}

/// Train a small forest into a scratch store and serve version 1.
async fn ready_service() -> ReadyService {
    let root = tempfile::tempdir().unwrap();
    let store: Arc<dyn TrackingStore> = Arc::new(FileStore::new(root.path().join("mlruns")));
    let settings = TrainSettings {
        work_dir: root.path().join("work"),
        ..TrainSettings::default()
    };
    train_model(store.clone(), &settings, ForestParams::new(10, Some(4)), "Serve")
        .await
        .unwrap();

    let serving = ServingState::load(
        store.as_ref(),
        &ModelUri::new(settings.model_name.as_str(), "1"),
    )
    .await;
    assert!(serving.model().is_some(), "model should load: {:?}", serving);

    let server = TestServer::new(create_router(AppState::new(serving))).unwrap();
    ReadyService {
        _root: root,
        server,
    }
}

fn unready_server() -> TestServer {
    let state = AppState::new(ServingState::unready("no registry"));
    TestServer::new(create_router(state)).unwrap()
}

fn sample_row() -> Vec<f64> {
    Dataset::breast_cancer().unwrap().features.row(0).to_vec()
}

#[tokio::test]
async fn health_reports_unready() {
    let server = unready_server();
    let resp = server.get("/health").expect_failure().await;
    assert_eq!(resp.status_code(), 503);
    let body: Value = resp.json();
    assert_eq!(
        body,
        json!({"status": "unhealthy", "reason": "Model or Scaler not loaded"})
    );
}

#[tokio::test]
async fn predict_before_load_is_unavailable() {
    let server = unready_server();
    let resp = server
        .post("/predict")
        .json(&json!({ "features": [sample_row()] }))
        .expect_failure()
        .await;
    assert_eq!(resp.status_code(), 503);
    let body: Value = resp.json();
    assert_eq!(body["error"], "Model/Scaler not loaded. Check server logs.");
}

#[tokio::test]
async fn health_reports_served_version() {
    let service = ready_service().await;
    let resp = service.server.get("/health").await;
    assert_eq!(resp.status_code(), 200);
    let body: Value = resp.json();
    assert_eq!(body, json!({"status": "healthy", "model_version": "1"}));
}

#[tokio::test]
async fn predict_single_row() {
    let service = ready_service().await;
    let resp = service
        .server
        .post("/predict")
        .json(&json!({ "features": [sample_row()] }))
        .await;
    assert_eq!(resp.status_code(), 200);

    let body: Value = resp.json();
    let predictions = body["predictions"].as_array().unwrap();
    assert_eq!(predictions.len(), 1);
    let label = predictions[0].as_u64().unwrap();
    assert!(label == 0 || label == 1);
}

#[tokio::test]
async fn predictions_follow_request_order() {
    let service = ready_service().await;
    let dataset = Dataset::breast_cancer().unwrap();
    // Malignant and benign rows interleaved
    let rows: Vec<Vec<f64>> = [0, 19, 1, 20, 21, 2]
        .iter()
        .map(|&i| dataset.features.row(i).to_vec())
        .collect();

    let resp = service
        .server
        .post("/predict")
        .json(&json!({ "features": rows }))
        .await;
    assert_eq!(resp.status_code(), 200);
    let batch: Vec<u64> = resp.json::<Value>()["predictions"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p.as_u64().unwrap())
        .collect();

    let mut one_by_one = Vec::new();
    for row in &rows {
        let resp = service
            .server
            .post("/predict")
            .json(&json!({ "features": [row] }))
            .await;
        one_by_one.push(resp.json::<Value>()["predictions"][0].as_u64().unwrap());
    }

    assert_eq!(batch, one_by_one);
    assert!(batch.contains(&0) && batch.contains(&1));
}

#[tokio::test]
async fn missing_features_key_is_bad_request() {
    let service = ready_service().await;
    let resp = service
        .server
        .post("/predict")
        .json(&json!({ "wrong_key": [sample_row()] }))
        .expect_failure()
        .await;
    assert_eq!(resp.status_code(), 400);
    let body: Value = resp.json();
    assert_eq!(body, json!({"error": "Missing 'features' key in JSON"}));
}

#[tokio::test]
async fn wrong_row_width_is_processing_error() {
    let service = ready_service().await;
    let resp = service
        .server
        .post("/predict")
        .json(&json!({ "features": [[1.0, 2.0, 3.0]] }))
        .expect_failure()
        .await;
    assert_eq!(resp.status_code(), 500);
    let body: Value = resp.json();
    assert!(body["error"].as_str().unwrap().contains("features"));
}

#[tokio::test]
async fn malformed_json_is_processing_error() {
    let service = ready_service().await;
    let resp = service
        .server
        .post("/predict")
        .text("{not json")
        .expect_failure()
        .await;
    assert_eq!(resp.status_code(), 500);
    let body: Value = resp.json();
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn missing_version_leaves_service_unready() {
    let root = tempfile::tempdir().unwrap();
    let store = FileStore::new(root.path());
    let serving = ServingState::load(&store, &ModelUri::new("ClassificationModel", "3")).await;

    match &serving {
        ServingState::Unready { reason } => assert!(reason.contains("not found")),
        ServingState::Ready(_) => panic!("nothing was registered"),
    }

    let server = TestServer::new(create_router(AppState::new(serving))).unwrap();
    let resp = server.get("/health").expect_failure().await;
    assert_eq!(resp.status_code(), 503);
}

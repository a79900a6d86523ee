use crate::report::render_confusion_matrix;
use crate::Result;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use tumorclf_core::{
    load_and_preprocess, ConfusionMatrix, EvaluationMetrics, ForestClassifier, ForestParams,
    PreparedData, TumorClfConfig, INPUT_EXAMPLE_FILE_NAME, MODEL_ARTIFACT_DIR, MODEL_FILE_NAME,
    SCALER_ARTIFACT_PATH,
};
use tumorclf_tracking::{ActiveRun, RunStatus, RunsUri, TrackingStore};

const CONFUSION_MATRIX_FILE: &str = "confusion_matrix.svg";

/// Where and how a training run is recorded.
#[derive(Debug, Clone)]
pub struct TrainSettings {
    pub experiment_name: String,
    pub model_name: String,
    pub test_size: f64,
    pub seed: u64,
    /// Local copies of the artifacts are written here before upload
    pub work_dir: PathBuf,
}

impl TrainSettings {
    pub fn from_config(config: &TumorClfConfig) -> Self {
        Self {
            experiment_name: config.tracking.experiment_name.clone(),
            model_name: config.tracking.model_name.clone(),
            test_size: config.training.test_size,
            seed: config.training.seed,
            work_dir: config.training.work_dir.clone(),
        }
    }
}

impl Default for TrainSettings {
    fn default() -> Self {
        Self::from_config(&TumorClfConfig::default())
    }
}

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub run_name: String,
    pub run_id: String,
    pub params: ForestParams,
    pub metrics: EvaluationMetrics,
    pub model_version: u32,
}

/// Sample input stored next to the model, in pandas "split" orientation.
#[derive(Debug, Serialize)]
struct InputExample<'a> {
    columns: &'a [String],
    data: Vec<Vec<f64>>,
}

struct Evaluated {
    data: PreparedData,
    model: ForestClassifier,
    matrix: ConfusionMatrix,
}

/// Train one forest, log everything to a new run and register the model.
///
/// The run ends `FINISHED` on success. On any failure it is marked `FAILED`
/// and the original error is returned.
#[instrument(skip(store, settings, params), fields(params = %params))]
pub async fn train_model(
    store: Arc<dyn TrackingStore>,
    settings: &TrainSettings,
    params: ForestParams,
    run_name: &str,
) -> Result<RunSummary> {
    let experiment = store
        .get_or_create_experiment(&settings.experiment_name)
        .await?;
    let run = ActiveRun::start(store.clone(), &experiment.experiment_id, run_name).await?;
    info!(run_id = %run.run_id(), "Training {} with {}", run_name, params);

    match execute(store.as_ref(), &run, settings, params).await {
        Ok((metrics, model_version)) => {
            let run_id = run.run_id().to_string();
            run.finish(RunStatus::Finished).await?;
            info!(
                accuracy = metrics.accuracy,
                f1_score = metrics.f1_score,
                model_version,
                "Run {} complete",
                run_name
            );
            Ok(RunSummary {
                run_name: run_name.to_string(),
                run_id,
                params,
                metrics,
                model_version,
            })
        }
        Err(e) => {
            if let Err(finish_err) = run.finish(RunStatus::Failed).await {
                warn!("Could not mark run {} as failed: {}", run_name, finish_err);
            }
            Err(e)
        }
    }
}

async fn execute(
    store: &dyn TrackingStore,
    run: &ActiveRun,
    settings: &TrainSettings,
    params: ForestParams,
) -> Result<(EvaluationMetrics, u32)> {
    run.log_param("n_estimators", params.n_estimators).await?;
    run.log_param("max_depth", max_depth_param(&params)).await?;
    run.log_param("model_type", "RandomForest").await?;

    let (test_size, seed) = (settings.test_size, settings.seed);
    let Evaluated {
        data,
        model,
        matrix,
    } = tokio::task::spawn_blocking(move || -> Result<Evaluated> {
        let data = load_and_preprocess(test_size, seed)?;
        let model = ForestClassifier::fit(data.x_train.view(), data.y_train.view(), params)?;
        let predictions = model.predict(data.x_test.view())?;
        let matrix = ConfusionMatrix::from_predictions(&data.y_test.to_vec(), &predictions)?;
        Ok(Evaluated {
            data,
            model,
            matrix,
        })
    })
    .await??;

    let metrics = EvaluationMetrics::from(&matrix);
    run.log_metric("accuracy", metrics.accuracy).await?;
    run.log_metric("f1_score", metrics.f1_score).await?;

    tokio::fs::create_dir_all(&settings.work_dir).await?;

    let image = settings.work_dir.join(CONFUSION_MATRIX_FILE);
    tokio::fs::write(&image, render_confusion_matrix(&matrix, metrics.accuracy)).await?;
    run.log_artifact(&image, None).await?;

    let (scaler_dir, scaler_file) = split_artifact_path(SCALER_ARTIFACT_PATH);
    let scaler_path = settings.work_dir.join(scaler_file);
    tokio::fs::write(&scaler_path, data.scaler.to_json()?).await?;
    run.log_artifact(&scaler_path, scaler_dir).await?;

    let model_dir = settings.work_dir.join(MODEL_ARTIFACT_DIR);
    tokio::fs::create_dir_all(&model_dir).await?;
    let model_path = model_dir.join(MODEL_FILE_NAME);
    tokio::fs::write(&model_path, model.to_json()?).await?;
    let example_path = write_input_example(&model_dir, &data).await?;
    run.log_artifact(&model_path, Some(MODEL_ARTIFACT_DIR)).await?;
    run.log_artifact(&example_path, Some(MODEL_ARTIFACT_DIR)).await?;

    let source = RunsUri::new(run.run_id(), MODEL_ARTIFACT_DIR).to_string();
    let version = store
        .create_model_version(&settings.model_name, &source, run.run_id())
        .await?;
    info!(
        "Registered {} version {} from {}",
        version.name, version.version, source
    );

    Ok((metrics, version.version))
}

async fn write_input_example(model_dir: &Path, data: &PreparedData) -> Result<PathBuf> {
    let first_row = data
        .x_train
        .outer_iter()
        .next()
        .map(|row| row.to_vec())
        .unwrap_or_default();
    let example = InputExample {
        columns: &data.feature_names,
        data: vec![first_row],
    };
    let path = model_dir.join(INPUT_EXAMPLE_FILE_NAME);
    tokio::fs::write(&path, serde_json::to_vec_pretty(&example)?).await?;
    Ok(path)
}

fn max_depth_param(params: &ForestParams) -> String {
    params
        .max_depth
        .map_or_else(|| "None".to_string(), |depth| depth.to_string())
}

/// `"dir/file"` -> `(Some("dir"), "file")`
fn split_artifact_path(path: &str) -> (Option<&str>, &str) {
    match path.rsplit_once('/') {
        Some((dir, file)) => (Some(dir), file),
        None => (None, path),
    }
}

use crate::error::LoadError;
use ndarray::ArrayView2;
use std::sync::Arc;
use tracing::{error, info};
use tumorclf_core::{CoreError, ForestClassifier, StandardScaler, MODEL_FILE_NAME, SCALER_ARTIFACT_PATH};
use tumorclf_tracking::{ModelUri, RunsUri, TrackingStore};

/// A registered model version together with the scaler of its run.
#[derive(Debug)]
pub struct LoadedModel {
    pub name: String,
    pub version: String,
    pub run_id: String,
    model: ForestClassifier,
    scaler: StandardScaler,
}

impl LoadedModel {
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        run_id: impl Into<String>,
        model: ForestClassifier,
        scaler: StandardScaler,
    ) -> Result<Self, LoadError> {
        if model.n_features() != scaler.n_features() {
            return Err(LoadError::IncompatibleArtifacts {
                model: model.n_features(),
                scaler: scaler.n_features(),
            });
        }
        Ok(Self {
            name: name.into(),
            version: version.into(),
            run_id: run_id.into(),
            model,
            scaler,
        })
    }

    /// Resolve `uri` in the registry and download the model and scaler artifacts.
    pub async fn fetch(store: &dyn TrackingStore, uri: &ModelUri) -> Result<Self, LoadError> {
        let version = store.get_model_version(&uri.name, &uri.version).await?;
        let source: RunsUri = version.source.parse()?;

        let model_bytes = store
            .read_artifact(&source.run_id, &source.join(MODEL_FILE_NAME))
            .await?;
        let model = ForestClassifier::from_json(&model_bytes)?;

        let scaler_bytes = store
            .read_artifact(&version.run_id, SCALER_ARTIFACT_PATH)
            .await?;
        let scaler = StandardScaler::from_json(&scaler_bytes)?;

        Self::new(
            version.name,
            uri.version.clone(),
            version.run_id,
            model,
            scaler,
        )
    }

    /// Scale raw rows and predict one label per row.
    pub fn predict(&self, rows: ArrayView2<'_, f64>) -> Result<Vec<u32>, CoreError> {
        let scaled = self.scaler.transform(rows)?;
        self.model.predict(scaled.view())
    }

    pub fn n_features(&self) -> usize {
        self.scaler.n_features()
    }
}

/// Whether the service has a model to serve. Fixed for the process lifetime.
#[derive(Debug)]
pub enum ServingState {
    Unready { reason: String },
    Ready(LoadedModel),
}

impl ServingState {
    /// Load `uri` once; a failure is logged and yields `Unready`.
    pub async fn load(store: &dyn TrackingStore, uri: &ModelUri) -> Self {
        info!("Loading {} from {}", uri, store.location());
        match LoadedModel::fetch(store, uri).await {
            Ok(model) => {
                info!(
                    run_id = %model.run_id,
                    features = model.n_features(),
                    "Model and scaler loaded for {}",
                    uri
                );
                ServingState::Ready(model)
            }
            Err(e) => {
                error!("Error loading model/scaler for {}: {}", uri, e);
                ServingState::Unready {
                    reason: e.to_string(),
                }
            }
        }
    }

    pub fn unready(reason: impl Into<String>) -> Self {
        ServingState::Unready {
            reason: reason.into(),
        }
    }

    pub fn model(&self) -> Option<&LoadedModel> {
        match self {
            ServingState::Ready(model) => Some(model),
            ServingState::Unready { .. } => None,
        }
    }
}

/// Shared, read-only context handed to every handler.
#[derive(Clone)]
pub struct AppState {
    serving: Arc<ServingState>,
}

impl AppState {
    pub fn new(serving: ServingState) -> Self {
        Self {
            serving: Arc::new(serving),
        }
    }

    pub fn serving(&self) -> &ServingState {
        &self.serving
    }
}

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TrackingError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Tracking server returned {status}: {error_code}: {message}")]
    Api {
        status: u16,
        error_code: String,
        message: String,
    },

    #[error("Invalid tracking URI: {0}")]
    InvalidUri(String),

    #[error("Experiment not found: {0}")]
    ExperimentNotFound(String),

    #[error("Run not found: {0}")]
    RunNotFound(String),

    #[error("Model version not found: {name} version {version}")]
    ModelVersionNotFound { name: String, version: String },

    #[error("Artifact not found: {path} in run {run_id}")]
    ArtifactNotFound { run_id: String, path: String },

    #[error("Invalid artifact path: {0}")]
    InvalidArtifactPath(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),
}

impl TrackingError {
    pub fn is_not_found(&self) -> bool {
        match self {
            TrackingError::ExperimentNotFound(_)
            | TrackingError::RunNotFound(_)
            | TrackingError::ModelVersionNotFound { .. }
            | TrackingError::ArtifactNotFound { .. } => true,
            TrackingError::Api { error_code, .. } => error_code == "RESOURCE_DOES_NOT_EXIST",
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, TrackingError>;

use thiserror::Error;
use tumorclf_core::CoreError;
use tumorclf_tracking::TrackingError;

#[derive(Error, Debug)]
pub enum TrainError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Tracking error: {0}")]
    Tracking(#[from] TrackingError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Training task failed: {0}")]
    Task(String),

    #[error("Run {run_name} failed: {source}")]
    RunFailed {
        run_name: String,
        #[source]
        source: Box<TrainError>,
    },
}

impl From<tokio::task::JoinError> for TrainError {
    fn from(err: tokio::task::JoinError) -> Self {
        TrainError::Task(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, TrainError>;

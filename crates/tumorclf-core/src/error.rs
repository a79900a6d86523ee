use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Dataset error: {0}")]
    Dataset(String),

    #[error("Invalid split: {0}")]
    InvalidSplit(String),

    #[error("X has {got} features, but the estimator is expecting {expected} features as input")]
    FeatureMismatch { expected: usize, got: usize },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid hyperparameter: {0}")]
    InvalidHyperparameter(String),

    #[error("Model error: {0}")]
    Model(String),
}

impl From<smartcore::error::Failed> for CoreError {
    fn from(err: smartcore::error::Failed) -> Self {
        CoreError::Model(err.to_string())
    }
}

impl From<ndarray::ShapeError> for CoreError {
    fn from(err: ndarray::ShapeError) -> Self {
        CoreError::InvalidInput(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tumorclf_core::CoreError;
use tumorclf_tracking::TrackingError;

/// Request failures of the inference endpoints.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Model/Scaler not loaded. Check server logs.")]
    NotReady,

    #[error("Missing 'features' key in JSON")]
    MissingFeatures,

    #[error("{0}")]
    MalformedBody(String),

    #[error("{0}")]
    Inference(String),
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        ApiError::Inference(err.to_string())
    }
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::NotReady => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::MissingFeatures => StatusCode::BAD_REQUEST,
            ApiError::MalformedBody(_) | ApiError::Inference(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

/// Why the registered model could not be loaded at startup.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error(transparent)]
    Tracking(#[from] TrackingError),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("model expects {model} features but the scaler was fitted on {scaler}")]
    IncompatibleArtifacts { model: usize, scaler: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_follow_wire_contract() {
        assert_eq!(ApiError::NotReady.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(ApiError::MissingFeatures.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ApiError::MalformedBody("eof".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );

        let mismatch: ApiError = CoreError::FeatureMismatch {
            expected: 30,
            got: 2,
        }
        .into();
        assert_eq!(mismatch.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(mismatch.to_string().contains("expecting 30 features"));
    }
}

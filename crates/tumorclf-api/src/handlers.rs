use crate::{ApiError, ApiResult, AppState, ServingState};
use axum::{body::Bytes, extract::State, http::StatusCode, response::IntoResponse, Json};
use ndarray::Array2;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::debug;

#[derive(Debug, Serialize)]
pub struct PredictResponse {
    pub predictions: Vec<u32>,
}

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    match state.serving() {
        ServingState::Ready(model) => (
            StatusCode::OK,
            Json(json!({
                "status": "healthy",
                "model_version": model.version,
            })),
        ),
        ServingState::Unready { .. } => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "status": "unhealthy",
                "reason": "Model or Scaler not loaded",
            })),
        ),
    }
}

/// The body is taken as raw bytes so that JSON problems map onto the
/// service's own error responses instead of axum's rejections.
pub async fn predict(State(state): State<AppState>, body: Bytes) -> ApiResult<Json<PredictResponse>> {
    let model = state.serving().model().ok_or(ApiError::NotReady)?;

    let payload: Value =
        serde_json::from_slice(&body).map_err(|e| ApiError::MalformedBody(e.to_string()))?;
    let features = payload.get("features").ok_or(ApiError::MissingFeatures)?;

    let rows = decode_rows(features)?;
    let predictions = model.predict(rows.view())?;
    debug!(rows = predictions.len(), "Served prediction");

    Ok(Json(PredictResponse { predictions }))
}

/// Decode `[[f64, ...], ...]` into a row-major matrix.
fn decode_rows(features: &Value) -> ApiResult<Array2<f64>> {
    let rows = features
        .as_array()
        .ok_or_else(|| ApiError::Inference("Expected 2D array, got a scalar or object".to_string()))?;
    if rows.is_empty() {
        return Err(ApiError::Inference(
            "Found array with 0 sample(s) while a minimum of 1 is required".to_string(),
        ));
    }

    let mut width = None;
    let mut values = Vec::new();
    for (i, row) in rows.iter().enumerate() {
        let cells = row.as_array().ok_or_else(|| {
            ApiError::Inference("Expected 2D array, got 1D array instead".to_string())
        })?;
        match width {
            None => width = Some(cells.len()),
            Some(w) if w != cells.len() => {
                return Err(ApiError::Inference(format!(
                    "Inhomogeneous rows: row 0 has {} values, row {} has {}",
                    w,
                    i,
                    cells.len()
                )))
            }
            Some(_) => {}
        }
        for cell in cells {
            let value = cell.as_f64().ok_or_else(|| {
                ApiError::Inference(format!("Could not convert {} to float", cell))
            })?;
            values.push(value);
        }
    }

    Array2::from_shape_vec((rows.len(), width.unwrap_or(0)), values)
        .map_err(|e| ApiError::Inference(e.to_string()))
}

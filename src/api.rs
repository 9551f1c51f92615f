//! HTTP front door.
//!
//! - `GET /` greeting page
//! - `GET /health` liveness
//! - `POST /predict` price prediction

use std::{path::PathBuf, sync::Arc};

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::error::PredictError;
use crate::handler::PredictionService;
use crate::model::Predictor;
use crate::types::PredictionResponse;

#[derive(Clone)]
pub struct AppState {
    service: PredictionService,
    index_path: Arc<PathBuf>,
}

impl AppState {
    pub fn new(predictor: Arc<dyn Predictor>, index_path: impl Into<PathBuf>) -> Self {
        Self {
            service: PredictionService::new(predictor),
            index_path: Arc::new(index_path.into()),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/predict", post(predict))
        .with_state(state)
        .layer(CorsLayer::very_permissive())
        .layer(TraceLayer::new_for_http())
}

impl IntoResponse for PredictError {
    fn into_response(self) -> Response {
        let status = match &self {
            PredictError::InvalidInput { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            PredictError::InferenceFailure(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = json!({ "error": self.to_string(), "kind": self.kind() });
        (status, Json(body)).into_response()
    }
}

async fn index(State(state): State<AppState>) -> Html<String> {
    let path = state.index_path.as_path();
    match tokio::fs::read_to_string(path).await {
        Ok(content) => {
            tracing::debug!(path = %path.display(), bytes = content.len(), "served index");
            Html(content)
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "index page unavailable");
            let dir = path
                .parent()
                .map(|p| p.display().to_string())
                .unwrap_or_default();
            Html(format!("<h1>index.html not found in {dir}</h1>"))
        }
    }
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "healthy" }))
}

async fn predict(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<PredictionResponse>, Response> {
    let Json(payload) = payload.map_err(|e| {
        tracing::warn!(error = %e, "rejected request body");
        (
            e.status(),
            Json(json!({ "error": e.body_text(), "kind": "invalid_input" })),
        )
            .into_response()
    })?;

    // Inference may block; keep it off the async workers.
    let service = state.service.clone();
    let result = tokio::task::spawn_blocking(move || service.handle(&payload))
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "prediction task failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": e.to_string(), "kind": "inference_failure" })),
            )
                .into_response()
        })?;

    match result {
        Ok(out) => {
            tracing::info!(predicted_price = out.predicted_price, "prediction ok");
            Ok(Json(out))
        }
        Err(e) => {
            match &e {
                PredictError::InvalidInput { .. } => tracing::warn!(error = %e, "invalid input"),
                PredictError::InferenceFailure(_) => tracing::error!(error = %e, "prediction error"),
            }
            Err(e.into_response())
        }
    }
}

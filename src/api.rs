use std::sync::Arc;

use shuttle_axum::axum::{
    extract::{rejection::JsonRejection, State},
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use tower_http::cors::CorsLayer;

use crate::alerts::{AlertPreferenceInput, PreferenceError, PreferenceStore};
use crate::analyze::AnalysisCache;
use crate::quake::{Event, SourceFetcher};

#[derive(Clone)]
pub struct AppState {
    pub fetcher: Arc<SourceFetcher>,
    pub analysis: Arc<AnalysisCache>,
    pub preferences: Arc<PreferenceStore>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(|| async { "BD Quake Monitor Backend is Running!" }))
        .route("/health", get(|| async { "OK" }))
        .route("/api/earthquakes", get(earthquakes))
        .route("/api/analyze", post(analyze))
        .route("/api/alerts", post(save_alert))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

/// Client-visible failures.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(&'static str),
    Preference(PreferenceError),
    Upstream,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, Json(json!({ "error": msg }))).into_response()
            }
            ApiError::Upstream => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Failed to fetch earthquake data" })),
            )
                .into_response(),
            ApiError::Preference(PreferenceError::Validation(v)) => (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": "Invalid input", "details": v.details() })),
            )
                .into_response(),
            ApiError::Preference(e @ PreferenceError::IdentityConflict { .. }) => (
                StatusCode::CONFLICT,
                Json(json!({ "error": "Conflicting identities", "details": e.to_string() })),
            )
                .into_response(),
            ApiError::Preference(PreferenceError::Storage(e)) => {
                tracing::error!(error = %e, "failed to save alert preference");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": "Failed to save alert preference" })),
                )
                    .into_response()
            }
        }
    }
}

async fn earthquakes(State(state): State<AppState>) -> Result<Response, ApiError> {
    match state.fetcher.get().await {
        Ok(collection) => Ok(Json(collection).into_response()),
        Err(e) => {
            tracing::error!(error = %e, "failed to fetch earthquake data");
            Err(ApiError::Upstream)
        }
    }
}

#[derive(serde::Deserialize)]
struct AnalyzeReq {
    #[serde(default)]
    quakes: Option<Vec<Event>>,
}

async fn analyze(
    State(state): State<AppState>,
    body: Result<Json<AnalyzeReq>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(req) = body.map_err(|_| ApiError::BadRequest("Invalid request body"))?;
    let quakes = req
        .quakes
        .ok_or(ApiError::BadRequest("No earthquake data provided"))?;

    let (result, outcome) = state.analysis.analyze_with_outcome(&quakes).await;
    let mut resp = Json(result).into_response();
    resp.headers_mut().insert(
        "X-AI-Cache",
        HeaderValue::from_static(outcome.header_value()),
    );
    Ok(resp)
}

async fn save_alert(
    State(state): State<AppState>,
    body: Result<Json<AlertPreferenceInput>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(input) = body.map_err(|_| ApiError::BadRequest("Invalid input"))?;
    let outcome = state
        .preferences
        .upsert(input)
        .await
        .map_err(ApiError::Preference)?;

    let body = if outcome.merged {
        json!({ "success": true, "id": outcome.id, "message": "Updated existing preferences" })
    } else {
        json!({ "success": true, "id": outcome.id })
    };
    Ok(Json(body).into_response())
}

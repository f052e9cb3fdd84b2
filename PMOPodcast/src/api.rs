//! API HTTP de contrôle
//!
//! De la glu, pas de logique métier : chaque route délègue au pipeline ou
//! au routeur de dispatch. `/dispatch` accepte l'enveloppe brute du
//! protocole, ce qui permet de piloter n'importe quel module sans route
//! dédiée.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router as AxumRouter,
};
use pmodispatch::{Request, Router};
use pmomodel::Preference;
use pmopipeline::{Pipeline, PipelineError};
use serde_json::{json, Value};
use tracing::warn;

#[derive(Clone)]
pub struct ApiState {
    router: Arc<Router>,
    pipeline: Arc<Pipeline>,
}

impl ApiState {
    pub fn new(router: Arc<Router>, pipeline: Arc<Pipeline>) -> Self {
        Self { router, pipeline }
    }
}

pub fn build_router(state: ApiState) -> AxumRouter {
    AxumRouter::new()
        .route("/status", get(status))
        .route("/run", post(trigger_run))
        .route("/drain", post(trigger_drain))
        .route("/pending", get(pending))
        .route("/preferences", get(list_preferences).post(add_preference))
        .route("/modules", get(list_modules))
        .route("/modules/{name}", get(describe_module))
        .route("/dispatch", post(dispatch))
        .with_state(state)
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({"error": message.into()}))).into_response()
}

async fn status(State(state): State<ApiState>) -> Response {
    let pending = state
        .router
        .read("queue", "queue://pending")
        .await
        .ok()
        .and_then(|v| v["entries"].as_array().map(Vec::len))
        .unwrap_or(0);
    let processed = state
        .router
        .read("queue", "queue://processed/count")
        .await
        .ok()
        .and_then(|v| v["count"].as_u64())
        .unwrap_or(0);

    Json(json!({
        "state": state.pipeline.state(),
        "running": state.pipeline.is_running(),
        "pending": pending,
        "processed": processed,
        "modules": state.router.module_names(),
    }))
    .into_response()
}

async fn trigger_run(State(state): State<ApiState>) -> Response {
    match state.pipeline.run().await {
        Ok(summary) => Json(summary).into_response(),
        Err(PipelineError::AlreadyRunning) => {
            error_response(StatusCode::CONFLICT, "A run is already in progress")
        }
        Err(err) => error_response(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
    }
}

async fn trigger_drain(State(state): State<ApiState>) -> Response {
    match state.pipeline.drain().await {
        Ok(summary) => Json(summary).into_response(),
        Err(PipelineError::AlreadyRunning) => {
            error_response(StatusCode::CONFLICT, "A run is already in progress")
        }
        Err(err) => error_response(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
    }
}

async fn pending(State(state): State<ApiState>) -> Response {
    match state.router.read("queue", "queue://pending").await {
        Ok(entries) => Json(entries).into_response(),
        Err(err) => error_response(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
    }
}

async fn list_preferences(State(state): State<ApiState>) -> Json<Vec<Preference>> {
    Json(state.pipeline.preferences().await)
}

async fn add_preference(
    State(state): State<ApiState>,
    Json(preference): Json<Preference>,
) -> Response {
    if let Err(err) = preference.validate() {
        return error_response(StatusCode::BAD_REQUEST, err.to_string());
    }

    // Persister pour les prochains démarrages, puis activer immédiatement
    use pmopipeline::PipelineConfigExt;
    if let Err(err) = pmoconfig::get_config().push_preference(&preference) {
        warn!(error=%err, "Preference not persisted to configuration");
    }
    state.pipeline.add_preference(preference.clone()).await;
    (StatusCode::CREATED, Json(preference)).into_response()
}

async fn list_modules(State(state): State<ApiState>) -> Response {
    Json(state.router.describe_all()).into_response()
}

async fn describe_module(
    State(state): State<ApiState>,
    Path(name): Path<String>,
) -> Response {
    match state.router.describe(&name) {
        Ok(description) => Json(description).into_response(),
        Err(err) => error_response(StatusCode::NOT_FOUND, err.to_string()),
    }
}

/// Enveloppe brute du protocole : `{"id", "module", "kind", "target", "arguments"}`
async fn dispatch(State(state): State<ApiState>, Json(body): Json<Value>) -> Response {
    let request: Request = match serde_json::from_value(body) {
        Ok(request) => request,
        Err(err) => {
            return error_response(StatusCode::BAD_REQUEST, format!("Invalid envelope: {}", err))
        }
    };
    Json(state.router.dispatch(request).await).into_response()
}

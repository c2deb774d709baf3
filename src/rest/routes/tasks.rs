// rest/routes/tasks.rs — Task lifecycle routes.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::registry::{RegistryError, TaskPatch};
use crate::AppContext;

fn not_found() -> (StatusCode, Json<Value>) {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": "Task not found" })),
    )
}

/// Create a task on first reference, patch it on every later call.
/// The body is optional; an absent or empty body creates with defaults.
pub async fn upsert_task(
    State(ctx): State<Arc<AppContext>>,
    Path(id): Path<String>,
    patch: Option<Json<TaskPatch>>,
) -> Json<Value> {
    let patch = patch.map(|Json(p)| p).unwrap_or_default();
    let task = ctx.registry.upsert(&id, patch);
    Json(json!({ "ok": true, "task": task }))
}

#[derive(Deserialize)]
pub struct AppendLogRequest {
    pub message: String,
    #[serde(default = "default_level")]
    pub level: String,
}

fn default_level() -> String {
    "info".to_string()
}

pub async fn append_log(
    State(ctx): State<Arc<AppContext>>,
    Path(id): Path<String>,
    Json(body): Json<AppendLogRequest>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    match ctx.registry.append_log(&id, &body.message, &body.level) {
        Ok(log) => Ok(Json(json!({ "ok": true, "log": log }))),
        Err(RegistryError::NotFound { .. }) => Err(not_found()),
    }
}

#[derive(Deserialize, Default)]
pub struct CompleteRequest {
    pub summary: Option<String>,
}

pub async fn complete_task(
    State(ctx): State<Arc<AppContext>>,
    Path(id): Path<String>,
    body: Option<Json<CompleteRequest>>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let body = body.map(|Json(b)| b).unwrap_or_default();
    match ctx.registry.complete(&id, body.summary) {
        Ok(task) => Ok(Json(json!({ "ok": true, "task": task }))),
        Err(RegistryError::NotFound { .. }) => Err(not_found()),
    }
}

#[derive(Deserialize, Default)]
pub struct FailRequest {
    pub error: Option<String>,
}

pub async fn fail_task(
    State(ctx): State<Arc<AppContext>>,
    Path(id): Path<String>,
    body: Option<Json<FailRequest>>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let body = body.map(|Json(b)| b).unwrap_or_default();
    match ctx.registry.fail(&id, body.error) {
        Ok(task) => Ok(Json(json!({ "ok": true, "task": task }))),
        Err(RegistryError::NotFound { .. }) => Err(not_found()),
    }
}

pub async fn clear_finished(State(ctx): State<Arc<AppContext>>) -> Json<Value> {
    let ids = ctx.registry.clear_finished();
    Json(json!({ "ok": true, "cleared": ids.len(), "ids": ids }))
}

use std::collections::HashMap;

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Map, Value};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use super::error::{ApiError, ErrorBody};
use super::routes::ApiState;
use crate::backend::{Operation, Request};
use crate::request_span;

fn ensure_mount(state: &ApiState, mount: &str) -> Result<(), ApiError> {
    if mount == state.mount {
        Ok(())
    } else {
        Err(ApiError::NotFound(format!("no backend mounted at '{mount}'")))
    }
}

fn is_truthy(value: &str) -> bool {
    !matches!(value.trim().to_ascii_lowercase().as_str(), "" | "0" | "false")
}

/// Run a request through the backend and render the outcome.
///
/// The request is cancelled if this future is dropped, e.g. when the client
/// disconnects.
async fn dispatch(state: &ApiState, request: Request) -> Result<Response, ApiError> {
    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();

    let span = request_span!(request.operation, request.path);
    let outcome =
        state.backend.handle_request(request.with_cancel(cancel)).instrument(span).await?;

    Ok(match outcome {
        None => StatusCode::NO_CONTENT.into_response(),
        Some(response) => match response.error_message() {
            Some(message) => {
                let body = ErrorBody { errors: vec![message.to_string()] };
                (StatusCode::BAD_REQUEST, Json(body)).into_response()
            }
            None => (StatusCode::OK, Json(json!({ "data": response.data }))).into_response(),
        },
    })
}

async fn read(
    state: ApiState,
    path: String,
    mut params: HashMap<String, String>,
) -> Result<Response, ApiError> {
    let operation = match params.remove("help") {
        Some(flag) if is_truthy(&flag) => Operation::Help,
        _ => Operation::Read,
    };
    let data = params.into_iter().map(|(k, v)| (k, Value::String(v))).collect();
    let request = Request::new(operation, path, state.storage.clone()).with_data(data);
    dispatch(&state, request).await
}

/// `GET /v1/{mount}/{*path}`
pub async fn read_handler(
    State(state): State<ApiState>,
    Path((mount, path)): Path<(String, String)>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Response, ApiError> {
    ensure_mount(&state, &mount)?;
    read(state, path, params).await
}

/// `GET /v1/{mount}`: help for the whole mount.
pub async fn mount_help_handler(
    State(state): State<ApiState>,
    Path(mount): Path<String>,
) -> Result<Response, ApiError> {
    ensure_mount(&state, &mount)?;
    let request = Request::new(Operation::Help, "", state.storage.clone());
    dispatch(&state, request).await
}

/// `POST`/`PUT /v1/{mount}/{*path}`: create or update, chosen by existence.
pub async fn write_handler(
    State(state): State<ApiState>,
    Path((mount, path)): Path<(String, String)>,
    body: Bytes,
) -> Result<Response, ApiError> {
    ensure_mount(&state, &mount)?;

    let data: Map<String, Value> = if body.iter().all(u8::is_ascii_whitespace) {
        Map::new()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| ApiError::BadRequest(format!("invalid JSON body: {e}")))?
    };

    let probe = Request::new(Operation::Update, path.clone(), state.storage.clone());
    let operation = if state.backend.existence_check(&probe).await? {
        Operation::Update
    } else {
        Operation::Create
    };

    let request = Request::new(operation, path, state.storage.clone()).with_data(data);
    dispatch(&state, request).await
}

/// `GET /health`
pub async fn health_handler() -> impl IntoResponse {
    Json(json!({ "status": "ok", "version": crate::VERSION }))
}

/// `GET /metrics`
pub async fn metrics_handler(State(state): State<ApiState>) -> Result<String, ApiError> {
    state
        .metrics
        .as_ref()
        .map(|handle| handle.render())
        .ok_or_else(|| ApiError::NotFound("metrics are disabled".to_string()))
}

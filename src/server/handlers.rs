use axum::body::{Body, Bytes};
use axum::extract::{Path, Query, State};
use axum::http::{Method, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};
use std::collections::HashMap;
use tracing::info;

use super::{AppState, SSR_STREAM_BUFFER};
use crate::ssr::{ChannelSink, InboundRequest};
use crate::trip::page_number;
use crate::Error;

const DEFAULT_USER_LIMIT: u64 = 10;

/// JSON error answer: `{"error": <user message>}`.
#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    Internal(Error),
}

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        ApiError::Internal(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(message) => (StatusCode::NOT_FOUND, message),
            ApiError::Internal(e) => {
                tracing::error!(
                    error = %e,
                    code = e.error_code().map(|c| c.code()).unwrap_or("-"),
                    "request failed"
                );
                (StatusCode::INTERNAL_SERVER_ERROR, e.user_message())
            }
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

pub async fn create_trip(
    State(state): State<AppState>,
    method: Method,
    body: Bytes,
) -> Response {
    if method == Method::GET {
        info!("API route /api/create-trip was accessed via GET");
    }
    let outcome = state.pipeline.handle(&method, &body).await;
    (outcome.status, Json(outcome.body)).into_response()
}

pub async fn list_trips(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<Value>, ApiError> {
    let page = page_number(params.get("page").map(String::as_str));
    let trips = state.catalog.list_page(page).await?;
    Ok(Json(json!({ "trips": trips.trips, "total": trips.total, "page": page })))
}

pub async fn get_trip(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    match state.catalog.get(&id).await? {
        Some(trip) => Ok(Json(trip)),
        None => Err(ApiError::NotFound(format!("Trip {} not found", id))),
    }
}

fn number_param(params: &HashMap<String, String>, key: &str, default: u64) -> u64 {
    params
        .get(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

pub async fn list_users(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<Value>, ApiError> {
    let limit = number_param(&params, "limit", DEFAULT_USER_LIMIT);
    let offset = number_param(&params, "offset", 0);
    let page = state.users.list(limit, offset).await?;
    Ok(Json(json!({ "users": page.users, "total": page.total })))
}

pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Everything outside `/api` is a page: render it through the SSR bridge.
///
/// The bridge runs in its own task and streams into the response; the handler
/// returns as soon as the head is ready.
pub async fn render_page(State(state): State<AppState>, request: Request<Body>) -> Response {
    let inbound = InboundRequest::from_http(request);
    let (mut sink, pending) = ChannelSink::new(SSR_STREAM_BUFFER);
    let bridge = state.ssr.clone();
    tokio::spawn(async move {
        bridge.handle(inbound, &mut sink).await;
    });
    pending.into_response().await
}

//! tracemsg HTTP REST API
//!
//! Axum-based HTTP server exposing trace insert and range query.
//!
//! Architecture: each endpoint has a thin axum handler that delegates to an
//! inner function. The inner functions are directly testable without axum
//! dispatch machinery.
//!
//! Endpoints:
//! - POST /api/traces/insert: stamp and persist one trace message
//! - GET  /api/traces/range: stream traces with `from <= ts <= to`

use std::sync::Arc;

use axum::body::Body;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use bytes::Bytes;
use futures::stream::{self, StreamExt, TryStreamExt};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::trace::TraceLayer;
use tracemsg_core::config::HttpConfig;
use tracemsg_core::{DateRange, NewTrace, TraceError, TraceMessage, TraceStream};

use crate::subsystems::trace_service::TraceService;

pub const NDJSON: &str = "application/x-ndjson";

/// Shared state for all HTTP handlers
#[derive(Clone)]
pub struct HttpState {
    pub service: TraceService,
}

/// Build the Axum router with all endpoints
pub fn build_router(state: Arc<HttpState>) -> Router {
    Router::new()
        .route("/api/traces/insert", post(insert_handler))
        .route("/api/traces/range", get(range_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the HTTP server on the configured address.
/// Gracefully shuts down when the broadcast shutdown signal fires.
pub async fn start_http_server(
    config: &HttpConfig,
    service: TraceService,
    mut shutdown: broadcast::Receiver<()>,
) -> anyhow::Result<()> {
    let addr = format!("{}:{}", config.host, config.port);
    let state = Arc::new(HttpState { service });

    let app = build_router(state);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("tracemsg HTTP API listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
            tracing::info!("HTTP server shutting down...");
        })
        .await?;

    Ok(())
}

// ============================================================================
// Request / Response DTOs
// ============================================================================

#[derive(Debug, Deserialize, Default)]
pub struct RangeParams {
    pub from: Option<String>,
    pub to: Option<String>,
}

/// Standard HTTP error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub status: String,
}

impl ErrorResponse {
    pub fn new(msg: impl Into<String>) -> Self {
        Self {
            error: msg.into(),
            status: "error".to_string(),
        }
    }
}

/// Errors surfaced at the HTTP boundary. Driver details stay in the logs.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("trace storage unavailable")]
    StorageFailure,

    #[error("internal server error")]
    Internal,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::StorageFailure | ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<TraceError> for ApiError {
    fn from(err: TraceError) -> Self {
        match err {
            e if e.is_client_error() => ApiError::BadRequest(e.to_string()),
            TraceError::Storage(_) | TraceError::MissingId => ApiError::StorageFailure,
            _ => ApiError::Internal,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(ErrorResponse::new(self.to_string()))).into_response()
    }
}

/// How a range result is framed on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamFormat {
    JsonArray,
    NdJson,
}

impl StreamFormat {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let wants_ndjson = headers
            .get(header::ACCEPT)
            .and_then(|v| v.to_str().ok())
            .map(|accept| accept.split(',').any(|part| part.trim().starts_with(NDJSON)))
            .unwrap_or(false);
        if wants_ndjson {
            StreamFormat::NdJson
        } else {
            StreamFormat::JsonArray
        }
    }

    fn content_type(self) -> HeaderValue {
        match self {
            StreamFormat::JsonArray => HeaderValue::from_static("application/json"),
            StreamFormat::NdJson => HeaderValue::from_static(NDJSON),
        }
    }
}

// ============================================================================
// Inner (directly testable) business logic functions
// ============================================================================

/// Inner insert: stamps and persists, returning (status_code, json_body).
pub async fn insert_inner(service: &TraceService, new: NewTrace) -> (StatusCode, serde_json::Value) {
    match service.insert(new).await {
        Ok(saved) => match serde_json::to_value(&saved) {
            Ok(body) => (StatusCode::OK, body),
            Err(e) => error_body(ApiError::from(TraceError::from(e))),
        },
        Err(e) => error_body(ApiError::from(e)),
    }
}

/// Inner range: validates both bounds before any store access, then opens
/// the result stream.
pub async fn range_inner(service: &TraceService, params: RangeParams) -> Result<TraceStream, ApiError> {
    let from = params
        .from
        .ok_or_else(|| ApiError::BadRequest("query parameter 'from' is required".to_string()))?;
    let to = params
        .to
        .ok_or_else(|| ApiError::BadRequest("query parameter 'to' is required".to_string()))?;

    let range = DateRange::parse(&from, &to)?;
    Ok(service.find_in_range(&range).await?)
}

// ============================================================================
// Axum handler wrappers (thin: delegate to inner functions)
// ============================================================================

pub async fn insert_handler(
    State(state): State<Arc<HttpState>>,
    payload: Result<Json<NewTrace>, JsonRejection>,
) -> impl IntoResponse {
    let new = match payload {
        Ok(Json(new)) => new,
        Err(rejection) => {
            let (status, body) = error_body(ApiError::BadRequest(rejection.body_text()));
            return (status, Json(body));
        }
    };
    let (status, body) = insert_inner(&state.service, new).await;
    (status, Json(body))
}

pub async fn range_handler(
    State(state): State<Arc<HttpState>>,
    headers: HeaderMap,
    params: Result<Query<RangeParams>, QueryRejection>,
) -> Response {
    let params = match params {
        Ok(Query(p)) => p,
        Err(rejection) => return ApiError::BadRequest(rejection.body_text()).into_response(),
    };

    let format = StreamFormat::from_headers(&headers);
    match range_inner(&state.service, params).await {
        Ok(traces) => (
            [(header::CONTENT_TYPE, format.content_type())],
            streaming_body(traces, format),
        )
            .into_response(),
        Err(e) => e.into_response(),
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn error_body(err: ApiError) -> (StatusCode, serde_json::Value) {
    let status = err.status();
    let body = serde_json::to_value(ErrorResponse::new(err.to_string()))
        .unwrap_or_else(|_| serde_json::json!({ "error": "internal server error", "status": "error" }));
    (status, body)
}

/// Encode records as they arrive from the store. Nothing is buffered beyond
/// the record being written; dropping the body drops the store cursor.
pub fn streaming_body(traces: TraceStream, format: StreamFormat) -> Body {
    let mut first = true;
    let items = traces
        .map(move |item| -> Result<Bytes, TraceError> {
            let record: TraceMessage = item?;
            let mut buf = Vec::with_capacity(128);
            match format {
                StreamFormat::JsonArray => {
                    if !first {
                        buf.push(b',');
                    }
                    serde_json::to_writer(&mut buf, &record)?;
                }
                StreamFormat::NdJson => {
                    serde_json::to_writer(&mut buf, &record)?;
                    buf.push(b'\n');
                }
            }
            first = false;
            Ok(Bytes::from(buf))
        })
        .inspect_err(|e| tracing::error!(error = %e, "Range stream aborted"));

    match format {
        StreamFormat::JsonArray => {
            let open = stream::once(async { Ok::<Bytes, TraceError>(Bytes::from_static(b"[")) });
            let close = stream::once(async { Ok::<Bytes, TraceError>(Bytes::from_static(b"]")) });
            Body::from_stream(open.chain(items).chain(close))
        }
        StreamFormat::NdJson => Body::from_stream(items),
    }
}

// ============================================================================
// Unit Tests: call inner functions directly
// ============================================================================

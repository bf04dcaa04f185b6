use axum::{
    body::{to_bytes, Body},
    extract::{Request, State},
    http::{
        header::{CONNECTION, CONTENT_LENGTH, SET_COOKIE, TRANSFER_ENCODING},
        HeaderValue, StatusCode,
    },
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;
use tracing::{debug_span, warn, Instrument};
use uuid::Uuid;

use crate::models::{
    Communication, Comparison, ComparisonResult, InboundRequest, PipelineFailure, ProxyError, ProxyResult,
    SharedConfig,
};
use crate::services::{BackendFetcher, ErrorData, EventSink, Orchestrator, ProxyEvents, StatsStore};

/// Largest inbound body the proxy buffers for replay.
pub const MAX_BODY_SIZE: usize = 10 * 1024 * 1024;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub orchestrator: Orchestrator,
    pub config: SharedConfig,
    pub stats: Arc<StatsStore>,
    pub events: Arc<dyn EventSink>,
}

impl AppStateInner {
    pub fn new(config: SharedConfig, fetcher: Arc<dyn BackendFetcher>) -> AppState {
        let stats = Arc::new(StatsStore::new());
        let events: Arc<dyn EventSink> = Arc::new(ProxyEvents::new(stats.clone()));
        Arc::new(Self {
            orchestrator: Orchestrator::new(config.clone(), fetcher, events.clone()),
            config,
            stats,
            events,
        })
    }
}

/// Liveness probe; never proxied.
pub async fn health() -> StatusCode {
    StatusCode::OK
}

/// Replays any inbound request against the configured backends and answers with the verdict.
pub async fn proxy(State(state): State<AppState>, request: Request) -> ProxyResult<Response> {
    let (parts, body) = request.into_parts();
    let body = to_bytes(body, MAX_BODY_SIZE)
        .await
        .map_err(|e| ProxyError::InternalError(format!("Cannot read request body: {}", e)))?;
    let inbound = InboundRequest::new(parts.method, parts.uri, parts.headers, body);

    let span = debug_span!(
        "comparison",
        request_id = %Uuid::new_v4(),
        method = %inbound.method,
        path = %inbound.path()
    );
    match state.orchestrator.compare(&inbound).instrument(span).await {
        Ok(comparison) => {
            report(&state, &inbound, &comparison.result).await;
            Ok(comparison_response(comparison))
        }
        Err(failure) => failure_response(failure),
    }
}

async fn report(state: &AppState, request: &InboundRequest, result: &ComparisonResult) {
    let method = request.method.as_str();
    let path = request.path();

    if result.equal_content {
        state
            .events
            .record_success(method, path, result.primary_elapsed, result.candidate_elapsed)
            .await;
    } else {
        let mut error = ErrorData::new(&request.uri.to_string(), &request.body, &request.headers);
        error.header_diff = result.diff.headers_diff.clone().unwrap_or_default();
        error.body_diff = result.diff.body_diff.clone().unwrap_or_default();
        error.status_diff = result.diff.status_diff.clone().unwrap_or_default();
        state.events.record_error(method, path, error).await;
    }
}

fn comparison_response(comparison: Comparison) -> Response {
    let Comparison {
        result,
        primary,
        policy,
    } = comparison;

    if policy.mirroring {
        return mirror(primary);
    }

    let status = if result.equal_content {
        StatusCode::OK
    } else {
        StatusCode::PRECONDITION_FAILED
    };

    if policy.return_result {
        (status, Json(result)).into_response()
    } else {
        status.into_response()
    }
}

fn failure_response(failure: PipelineFailure) -> ProxyResult<Response> {
    match failure.primary {
        Some(primary) if failure.policy.mirroring => Ok(mirror(primary)),
        _ => Err(failure.error),
    }
}

/// Answers with Primary's response as if the proxy were not there.
fn mirror(primary: Communication) -> Response {
    let status = StatusCode::from_u16(primary.status_code).unwrap_or(StatusCode::BAD_GATEWAY);

    let mut headers = primary.headers;
    for hop_by_hop in [CONTENT_LENGTH, TRANSFER_ENCODING, CONNECTION] {
        headers.remove(hop_by_hop);
    }
    headers.remove(SET_COOKIE);
    for cookie in &primary.cookies {
        match HeaderValue::from_str(cookie) {
            Ok(value) => {
                headers.append(SET_COOKIE, value);
            }
            Err(e) => warn!(error = %e, "Dropping unrepresentable cookie from Primary"),
        }
    }

    let mut response = Response::new(Body::from(primary.content));
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    response
}

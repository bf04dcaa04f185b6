use axum::{extract::State, http::StatusCode, Json};
use utoipa::OpenApi;

use crate::handlers::proxy_handlers::AppState;
use crate::models::{
    ComparisonResult, ConfigUpdate, DifferenceDescription, DifferenceMode, ProxyConfig, ProxyResult,
};
use crate::services::{Entry, ErrorData, UrlCall};

/// Current configuration
#[utoipa::path(
    get,
    path = "/configuration",
    responses(
        (status = 200, description = "Configuration in use", body = ProxyConfig)
    ),
    tag = "Admin"
)]
pub async fn get_configuration(State(state): State<AppState>) -> Json<ProxyConfig> {
    let config = state.config.lock().await;
    Json(config.clone())
}

/// Update the configuration. Waits for any in-flight comparison to finish.
#[utoipa::path(
    put,
    path = "/configuration",
    request_body = ConfigUpdate,
    responses(
        (status = 200, description = "Configuration updated", body = ProxyConfig),
        (status = 400, description = "Invalid mode, boolean or URL")
    ),
    tag = "Admin"
)]
pub async fn update_configuration(
    State(state): State<AppState>,
    Json(update): Json<ConfigUpdate>,
) -> ProxyResult<Json<ProxyConfig>> {
    let mut config = state.config.lock().await;
    config.apply_update(update)?;
    Ok(Json(config.clone()))
}

/// Per endpoint successes, regressions and average latencies
#[utoipa::path(
    get,
    path = "/stats",
    responses(
        (status = 200, description = "Stats per endpoint", body = [Entry])
    ),
    tag = "Admin"
)]
pub async fn get_stats(State(state): State<AppState>) -> Json<Vec<Entry>> {
    Json(state.stats.entries().await)
}

/// Clear the collected stats
#[utoipa::path(
    delete,
    path = "/stats",
    responses(
        (status = 204, description = "Stats cleared")
    ),
    tag = "Admin"
)]
pub async fn reset_stats(State(state): State<AppState>) -> StatusCode {
    state.stats.reset().await;
    StatusCode::NO_CONTENT
}

#[derive(OpenApi)]
#[openapi(
    paths(get_configuration, update_configuration, get_stats, reset_stats),
    components(schemas(
        ProxyConfig,
        ConfigUpdate,
        DifferenceMode,
        Entry,
        UrlCall,
        ErrorData,
        ComparisonResult,
        DifferenceDescription
    )),
    tags((name = "Admin", description = "Live configuration and stats of the proxy"))
)]
pub struct ApiDoc;

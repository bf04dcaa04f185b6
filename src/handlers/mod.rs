pub mod admin_handlers;
pub mod proxy_handlers;

use axum::{
    http::Method,
    routing::get,
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub use proxy_handlers::{AppState, AppStateInner};

/// Every path except the health probe is replayed against the backends.
pub fn proxy_router(state: AppState) -> Router {
    Router::new()
        .route("/healthdif", get(proxy_handlers::health))
        .fallback(proxy_handlers::proxy)
        .with_state(state)
        .layer(RequestBodyLimitLayer::new(proxy_handlers::MAX_BODY_SIZE))
        .layer(TraceLayer::new_for_http())
}

pub fn admin_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::PUT, Method::DELETE])
        .allow_origin(Any);

    Router::new()
        .route(
            "/configuration",
            get(admin_handlers::get_configuration).put(admin_handlers::update_configuration),
        )
        .route("/stats", get(admin_handlers::get_stats).delete(admin_handlers::reset_stats))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", admin_handlers::ApiDoc::openapi()))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

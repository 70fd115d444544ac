pub mod grid;
pub mod health;
pub mod locations;
pub mod page;
pub mod timeline;

use axum::{Router, routing::get};
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

use crate::common::AppState;

#[derive(OpenApi)]
#[openapi(
    paths(
        health::healthz,
        locations::list_locations,
        grid::get_grid,
        timeline::get_timeline,
    ),
    components(
        schemas(
            health::HealthResponse,
            crate::directory::LocationOption,
            crate::directory::LocationId,
            crate::hires::EventRecord,
            grid::GridRow,
            crate::hires::TimelineOptions,
            crate::hires::TimelineSeries,
            crate::hires::RangeBar,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "locations", description = "Location directory"),
        (name = "grid", description = "Classified controller events"),
        (name = "timeline", description = "Grouped interval timeline"),
    ),
    info(
        title = "Hi-Res Event Viewer API",
        description = "Viewer for traffic-signal controller high-resolution event logs",
        version = "0.1.0"
    )
)]
struct ApiDoc;

pub fn build_router(state: AppState) -> Router {
    tracing::info!(
        directory_shape = ?state.config.directory_shape,
        query_shape = ?state.config.query_shape,
        upstream_concurrent = state.config.upstream_concurrent_limit,
        "Building router"
    );

    let api_routes = Router::new()
        .route("/locations", get(locations::list_locations))
        .route("/grid", get(grid::get_grid))
        .route("/timeline", get(timeline::get_timeline))
        .layer(RequestBodyLimitLayer::new(64 * 1024));

    // Health check routes
    let health_routes = Router::new().route("/healthz", get(health::healthz));

    // OpenAPI documentation
    let docs_routes = Router::new().merge(Scalar::with_url("/docs", ApiDoc::openapi()));

    Router::new()
        .route("/", get(page::viewer_page))
        .route("/timeline", get(timeline::timeline_page))
        .nest("/api", api_routes)
        .merge(health_routes)
        .merge(docs_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(
                    CorsLayer::new()
                        .allow_origin(Any)
                        .allow_methods(Any)
                        .allow_headers(Any),
                )
                .layer(CompressionLayer::new()),
        )
        .with_state(state)
}

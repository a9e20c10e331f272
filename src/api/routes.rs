//! HTTP route definitions

use crate::api::handlers;
use crate::api::models::GenerateNoteRequest;
use crate::config::CorsConfig;
use axum::{
    http::{header, HeaderValue, Method},
    routing::post,
    Router,
};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    info(
        title = "MedScribe Gateway API",
        version = "0.1.0",
        description = "Expands or summarizes clinical shorthand through a streaming text generation backend.",
        license(name = "MIT"),
    ),
    paths(handlers::generate_note),
    components(schemas(GenerateNoteRequest)),
    tags(
        (name = "Notes", description = "Clinical note generation"),
    )
)]
pub struct ApiDoc;

/// Build the CORS policy from the configured allow-list
pub fn cors_layer(config: &CorsConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::POST])
        .allow_headers([header::CONTENT_TYPE])
}

/// Create the main application router
pub fn create_router(state: Arc<crate::AppState>) -> Router {
    let api_routes = Router::new()
        .route("/generate", post(handlers::generate_note))
        .layer(cors_layer(&state.settings.cors));

    let router = Router::new().nest("/api", api_routes);

    // Docs are opt-in so the default surface stays a single route
    let router = if state.settings.server.docs_enabled {
        router.merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
    } else {
        router
    };

    router
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

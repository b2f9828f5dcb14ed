use crate::api_docs::ApiDoc;
use crate::middleware::http_logger::http_logger;
use crate::routes;
use crate::state::AppState;
use axum::Router;
use axum::middleware;
use http::header;
use std::path::PathBuf;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{
    ServiceBuilderExt,
    cors::{AllowOrigin, Any, CorsLayer},
    propagate_header::PropagateHeaderLayer,
    services::ServeDir,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Router settings that come from configuration.
#[derive(Debug, Clone)]
pub struct AppOptions {
    pub swagger_enabled: bool,
    /// `*` or a comma-separated origin list.
    pub cors_allowed_origins: String,
    /// Served under `/files` when set.
    pub upload_dir: Option<PathBuf>,
}

impl Default for AppOptions {
    fn default() -> Self {
        Self {
            swagger_enabled: false,
            cors_allowed_origins: "*".to_string(),
            upload_dir: None,
        }
    }
}

pub fn create_app(state: AppState, options: &AppOptions) -> Router {
    let mut router = Router::new()
        .merge(routes::health::create_route())
        .merge(routes::signup::create_route())
        .merge(routes::import::create_route())
        .merge(routes::cache::create_route())
        .merge(routes::selection::create_route())
        .merge(routes::maintenance::create_route())
        .merge(routes::files::create_route());

    if let Some(upload_dir) = &options.upload_dir {
        router = router.nest_service("/files", ServeDir::new(upload_dir));
    }

    let mut router = router
        .layer(middleware::from_fn_with_state(state.clone(), http_logger))
        .with_state(state);

    if options.swagger_enabled {
        let swagger_ui =
            SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi());
        router = router.merge(swagger_ui);
    }

    let sensitive_headers: Arc<[_]> = vec![header::AUTHORIZATION, header::COOKIE].into();

    let middleware = ServiceBuilder::new()
        .layer(cors_layer(&options.cors_allowed_origins))
        .layer(PropagateHeaderLayer::new(header::HeaderName::from_static(
            "x-request-id",
        )))
        .sensitive_request_headers(sensitive_headers.clone())
        .sensitive_response_headers(sensitive_headers)
        .compression();

    router.layer(middleware)
}

fn cors_layer(allowed_origins: &str) -> CorsLayer {
    let allowed_headers = [header::CONTENT_TYPE, header::ACCEPT, header::ACCEPT_LANGUAGE];
    let allowed_methods = [
        http::Method::GET,
        http::Method::POST,
        http::Method::DELETE,
        http::Method::OPTIONS,
    ];

    if allowed_origins.trim() == "*" {
        // Credentials cannot be combined with a wildcard origin.
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(allowed_methods)
            .allow_headers(allowed_headers)
            .allow_credentials(false);
    }

    let origins: Vec<http::HeaderValue> = allowed_origins
        .split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .filter_map(|origin| origin.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(allowed_methods)
        .allow_headers(allowed_headers)
        .allow_credentials(true)
}

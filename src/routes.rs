//! Application routing.
//!
//! # Route Groups
//!
//! - `/health`, `/ready` - Liveness and readiness (outside the pipeline)
//! - `/docs`, `/docs/openapi.json` - API description (only with `DOCS_ENABLED`)
//! - `/api/v1/projects...`, `/api/v1/tasks...` - Resource endpoints wrapped
//!   in the request pipeline (see [`crate::pipeline`])
//!
//! The body-size limit and request timeout apply to every route.

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::get;
use tower_http::timeout::TimeoutLayer;
use tracing::info;

use crate::handlers;
use crate::pipeline::Pipeline;
use crate::state::AppState;

/// Build the application router with all routes and middleware configured.
pub fn build_router(state: AppState) -> Router {
    let config = state.config.clone();

    let pipeline = Pipeline::standard(&state);
    info!(stages = ?pipeline.stage_names(), "API pipeline assembled");

    let api = Router::new()
        .route(
            "/v1/projects",
            get(handlers::list_projects).post(handlers::create_project),
        )
        .route(
            "/v1/projects/{id}",
            get(handlers::get_project)
                .put(handlers::update_project)
                .delete(handlers::delete_project),
        )
        .route(
            "/v1/projects/{id}/tasks",
            get(handlers::list_project_tasks).post(handlers::create_task),
        )
        .route(
            "/v1/tasks/{id}",
            get(handlers::get_task)
                .put(handlers::update_task)
                .delete(handlers::delete_task),
        )
        .fallback(handlers::not_found);
    let api = pipeline.apply(api);

    let mut router = Router::new()
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check));

    if config.docs_enabled {
        info!("API documentation endpoints enabled");
        router = router
            .route("/docs", get(handlers::docs_redirect))
            .route(handlers::docs::OPENAPI_PATH, get(handlers::openapi_document));
    } else {
        info!("API documentation endpoints disabled");
    }

    info!(
        max_size_kb = config.max_request_body_size / 1024,
        timeout_secs = config.request_timeout.as_secs(),
        "Request limits configured"
    );

    router
        .nest("/api", api)
        .layer(DefaultBodyLimit::max(config.max_request_body_size))
        .layer(TimeoutLayer::new(config.request_timeout))
        .with_state(state)
}

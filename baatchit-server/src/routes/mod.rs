//! Axum router construction.
//!
//! [`build`] assembles the complete application router, including:
//! - Middleware layers (CORS, per-request trace-ID injection, request body cap)
//! - Optional Swagger UI / OpenAPI spec endpoint (disable with `BAATCHIT_ENABLE_SWAGGER=false`)
//! - Banner and health routes
//! - Chat `/api` routes used by the polling UI

mod api;
pub mod doc;
mod health;

use std::sync::Arc;

use axum::{Router, middleware};
use utoipa_swagger_ui::SwaggerUi;

use crate::middleware::{cors, trace};
use crate::state::AppState;

/// Build the complete Axum [`Router`] for the application.
pub fn build(state: Arc<AppState>) -> Router {
    let mut app = Router::new()
        .merge(health::router())
        .nest("/api", api::router());

    if state.config.enable_swagger {
        app = app.merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", doc::get_docs()));
    }

    app
        // Last layer is outermost, so CORS headers also reach body-cap rejections.
        .layer(middleware::from_fn(trace::trace_middleware))
        .layer(cors::cors_layer(&state.config))
        .with_state(state)
}

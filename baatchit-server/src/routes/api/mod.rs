pub mod history;
pub mod messages;

use std::sync::Arc;

use axum::Router;
use utoipa::OpenApi;

use crate::state::AppState;

/// Routes nested under `/api`, consumed by the chat UI.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .merge(messages::router())
        .merge(history::router())
}

pub fn api_docs() -> utoipa::openapi::OpenApi {
    let mut spec = messages::MessagesApi::openapi();
    spec.merge(history::HistoryApi::openapi());
    spec
}

// ── Tests ──────────────────────────────────────────────────────────────────────

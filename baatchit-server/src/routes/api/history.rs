use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};
use utoipa::OpenApi;

use crate::entities::{ConversationMessage, ConversationStatus, ConversationStore};
use crate::error::ServerError;
use crate::schemas::api::history::ConversationResponse;
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
    paths(get_history),
    components(schemas(ConversationResponse, ConversationMessage, ConversationStatus))
)]
pub struct HistoryApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/history/{session_id}", get(get_history))
}

/// Conversation record for polling clients (`GET /api/history/{session_id}`).
///
/// An unknown session is not an error: the response carries an empty history
/// and an empty intelligence map.
#[utoipa::path(
    get,
    path = "/api/history/{session_id}",
    tag = "chat",
    params(("session_id" = String, Path, description = "Client session identifier")),
    responses(
        (status = 200, description = "Conversation (possibly empty)", body = ConversationResponse),
        (status = 500, description = "Storage failure"),
    )
)]
pub async fn get_history(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<Json<ConversationResponse>, ServerError> {
    let response = match state.store.find_by_session(&session_id).await? {
        Some(conversation) => ConversationResponse::from(conversation),
        None => ConversationResponse::empty(session_id),
    };
    Ok(Json(response))
}

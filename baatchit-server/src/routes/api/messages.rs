use std::sync::Arc;

use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use tracing::debug;
use utoipa::OpenApi;

use crate::entities::Sender;
use crate::error::ServerError;
use crate::schemas::api::messages::{PostMessageRequest, PostMessageResponse};
use crate::state::AppState;

/// Maximum accepted message length in bytes.
const MAX_MESSAGE_BYTES: usize = 16 * 1024;

#[derive(OpenApi)]
#[openapi(
    paths(post_message),
    components(schemas(PostMessageRequest, PostMessageResponse, Sender))
)]
pub struct MessagesApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/messages", post(post_message))
}

/// Relay one chat message (`POST /api/messages`).
///
/// Succeeds even when the agent is unavailable; the agent's side of the turn
/// is then a fallback notice. Only a storage failure yields 500.
#[utoipa::path(
    post,
    path = "/api/messages",
    tag = "chat",
    request_body = PostMessageRequest,
    responses(
        (status = 201, description = "Message relayed", body = PostMessageResponse),
        (status = 400, description = "Missing, blank or malformed fields"),
        (status = 413, description = "Request body too large"),
        (status = 500, description = "Storage failure"),
    )
)]
pub async fn post_message(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<PostMessageRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<PostMessageResponse>), ServerError> {
    let Json(req) = payload?;
    if req.session_id.trim().is_empty() {
        return Err(ServerError::BadRequest("sessionId must not be empty".into()));
    }
    if req.message.trim().is_empty() {
        return Err(ServerError::BadRequest("message must not be empty".into()));
    }
    if req.message.len() > MAX_MESSAGE_BYTES {
        return Err(ServerError::BadRequest(format!(
            "message too large ({} bytes); maximum is {} bytes",
            req.message.len(),
            MAX_MESSAGE_BYTES,
        )));
    }

    let sender = req.sender.unwrap_or(Sender::User);
    debug!(session_id = %req.session_id, sender = sender.as_str(), len = req.message.len(), "inbound message");

    let outcome = state
        .relay
        .handle_incoming_message(&req.session_id, &req.message, sender)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(PostMessageResponse {
            status: "success".into(),
            history_count: outcome.history_len,
        }),
    ))
}

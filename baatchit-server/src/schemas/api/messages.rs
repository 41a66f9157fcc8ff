use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::entities::Sender;

/// Request body for `POST /api/messages`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PostMessageRequest {
    /// Client-generated conversation identifier.
    pub session_id: String,
    /// Message text.
    pub message: String,
    /// Defaults to `"user"`. An agent-side sender stores the message without
    /// calling the agent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender: Option<Sender>,
}

/// Response body for `POST /api/messages`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PostMessageResponse {
    /// Always `"success"`.
    pub status: String,
    /// History length after this turn.
    pub history_count: usize,
}

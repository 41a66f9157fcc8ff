use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::entities::{Conversation, ConversationMessage, ConversationStatus, Intelligence};

/// Response body for `GET /api/history/{sessionId}`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConversationResponse {
    pub session_id: String,
    pub history: Vec<ConversationMessage>,
    /// Category → indicators, e.g. `{"upiIds": ["x@upi"]}`.
    #[schema(value_type = Object)]
    pub extracted_intelligence: Intelligence,
    pub is_scam_detected: bool,
    /// Absent until the conversation exists.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ConversationStatus>,
    /// Epoch milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<i64>,
    /// Epoch milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<i64>,
}

impl ConversationResponse {
    /// The shape returned for a session that has no messages yet.
    pub fn empty(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            history: Vec::new(),
            extracted_intelligence: Intelligence::default(),
            is_scam_detected: false,
            status: None,
            created_at: None,
            updated_at: None,
        }
    }
}

impl From<Conversation> for ConversationResponse {
    fn from(conversation: Conversation) -> Self {
        Self {
            session_id: conversation.session_id,
            history: conversation.history,
            extracted_intelligence: conversation.extracted_intelligence,
            is_scam_detected: conversation.is_scam_detected,
            status: Some(conversation.status),
            created_at: Some(conversation.created_at),
            updated_at: Some(conversation.updated_at),
        }
    }
}

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{ConversationMessage, Intelligence, MergePolicy};

/// Lifecycle status of a conversation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ConversationStatus {
    #[default]
    Active,
    Completed,
    Flagged,
}

impl ConversationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConversationStatus::Active => "active",
            ConversationStatus::Completed => "completed",
            ConversationStatus::Flagged => "flagged",
        }
    }
}

impl std::str::FromStr for ConversationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(ConversationStatus::Active),
            "completed" => Ok(ConversationStatus::Completed),
            "flagged" => Ok(ConversationStatus::Flagged),
            other => Err(format!("unknown conversation status '{other}'")),
        }
    }
}

/// A row in `conversations` joined with its ordered history.
#[derive(Debug, Clone)]
pub struct Conversation {
    pub session_id: String,
    pub history: Vec<ConversationMessage>,
    pub extracted_intelligence: Intelligence,
    pub is_scam_detected: bool,
    pub status: ConversationStatus,
    /// Epoch milliseconds.
    pub created_at: i64,
    /// Epoch milliseconds.
    pub updated_at: i64,
}

/// Everything the agent side contributes to one relay turn, written in a
/// single transaction.
#[derive(Debug, Clone)]
pub struct AgentTurn {
    pub reply: ConversationMessage,
    pub intelligence: Option<Intelligence>,
    pub merge: MergePolicy,
    pub scam_detected: Option<bool>,
}

impl AgentTurn {
    /// A turn that only appends `reply`.
    pub fn reply_only(reply: ConversationMessage) -> Self {
        Self {
            reply,
            intelligence: None,
            merge: MergePolicy::default(),
            scam_detected: None,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn status_round_trips_through_column_text() {
        for status in [
            ConversationStatus::Active,
            ConversationStatus::Completed,
            ConversationStatus::Flagged,
        ] {
            assert_eq!(status.as_str().parse::<ConversationStatus>().unwrap(), status);
        }
        assert!("deleted".parse::<ConversationStatus>().is_err());
    }
}

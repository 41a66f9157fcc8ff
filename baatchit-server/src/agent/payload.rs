//! Wire types for the external agent.

use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::entities::{ConversationMessage, Intelligence};

/// Deployment-wide metadata sent with every request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentMetadata {
    pub channel: String,
    pub language: String,
    pub locale: String,
}

impl AgentMetadata {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            channel: cfg.agent_channel.clone(),
            language: cfg.agent_language.clone(),
            locale: cfg.agent_locale.clone(),
        }
    }
}

/// Body of `POST <agent-url>`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentRequest {
    pub session_id: String,
    /// The message that triggered this call.
    pub message: ConversationMessage,
    /// Full history, ending with `message`.
    pub conversation_history: Vec<ConversationMessage>,
    pub metadata: AgentMetadata,
}

/// Body the agent answers with.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentReply {
    pub reply: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extracted_intelligence: Option<Intelligence>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scam_detected: Option<bool>,
}

#[cfg(test)]
impl AgentReply {
    pub fn text(reply: impl Into<String>) -> Self {
        Self {
            reply: reply.into(),
            extracted_intelligence: None,
            scam_detected: None,
        }
    }
}

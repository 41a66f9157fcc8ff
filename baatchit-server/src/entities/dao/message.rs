use chrono::Utc;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Which side of the conversation produced a message.
///
/// `"client"` and `"scammer"` are accepted on input for older clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    #[serde(alias = "client")]
    User,
    #[serde(alias = "scammer")]
    Agent,
}

impl Sender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sender::User => "user",
            Sender::Agent => "agent",
        }
    }
}

impl std::str::FromStr for Sender {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" | "client" => Ok(Sender::User),
            "agent" | "scammer" => Ok(Sender::Agent),
            other => Err(format!("unknown sender '{other}'")),
        }
    }
}

/// A single history entry, as stored in `conversation_messages` and as sent
/// to the agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ConversationMessage {
    pub sender: Sender,
    pub text: String,
    /// Epoch milliseconds. Dates in RFC 3339 form are normalised on input.
    #[serde(deserialize_with = "epoch_millis::deserialize")]
    pub timestamp: i64,
}

impl ConversationMessage {
    /// Build a message stamped with the current time.
    pub fn now(sender: Sender, text: impl Into<String>) -> Self {
        Self {
            sender,
            text: text.into(),
            timestamp: Utc::now().timestamp_millis(),
        }
    }
}

/// Accepts either an integer epoch-ms value or a date string.
pub(crate) mod epoch_millis {
    use chrono::DateTime;
    use serde::{Deserialize, Deserializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Millis(i64),
        Date(String),
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<i64, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Raw::deserialize(deserializer)? {
            Raw::Millis(ms) => Ok(ms),
            Raw::Date(s) => DateTime::parse_from_rfc3339(&s)
                .map(|dt| dt.timestamp_millis())
                .map_err(serde::de::Error::custom),
        }
    }
}

pub mod conversation;
pub mod intelligence;
pub mod message;

pub use conversation::{AgentTurn, Conversation, ConversationStatus};
pub use intelligence::{Intelligence, MergePolicy};
pub use message::{ConversationMessage, Sender};

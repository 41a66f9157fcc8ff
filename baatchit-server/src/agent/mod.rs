//! Client side of the external AI agent.
//!
//! [`AgentClient`] is the seam the relay depends on; [`HttpAgentClient`] is
//! the production implementation.

pub mod http;
pub mod payload;

pub use http::HttpAgentClient;
pub use payload::{AgentMetadata, AgentReply, AgentRequest};

use std::future::Future;

use thiserror::Error;

/// Why an agent call produced no usable reply.
#[derive(Debug, Error)]
pub enum AgentError {
    /// Connection failure or timeout.
    #[error("agent request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The agent answered with a non-2xx status.
    #[error("agent returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// The body was not the expected JSON shape.
    #[error("agent response is malformed: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("agent returned an empty reply")]
    EmptyReply,
}

pub trait AgentClient: Send + Sync + 'static {
    /// Send one conversation turn and wait for the agent's answer.
    fn send(
        &self,
        request: &AgentRequest,
    ) -> impl Future<Output = Result<AgentReply, AgentError>> + Send;
}

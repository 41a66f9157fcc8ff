//! reqwest-backed [`AgentClient`].

use std::time::Duration;

use reqwest::Client;
use tracing::debug;

use super::{AgentClient, AgentError, AgentReply, AgentRequest};
use crate::config::Config;

pub const API_KEY_HEADER: &str = "x-api-key";

#[derive(Debug, Clone)]
pub struct HttpAgentClient {
    client: Client,
    url: String,
    api_key: Option<String>,
}

impl HttpAgentClient {
    pub fn new(
        url: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, AgentError> {
        let client = Client::builder()
            .user_agent(concat!("baatchit-server/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            url: url.into(),
            api_key,
        })
    }

    pub fn from_config(cfg: &Config) -> Result<Self, AgentError> {
        Self::new(cfg.agent_url.clone(), cfg.agent_api_key.clone(), cfg.agent_timeout)
    }
}

impl AgentClient for HttpAgentClient {
    async fn send(&self, request: &AgentRequest) -> Result<AgentReply, AgentError> {
        let mut builder = self.client.post(&self.url).json(request);
        if let Some(key) = &self.api_key {
            builder = builder.header(API_KEY_HEADER, key);
        }

        let resp = builder.send().await?;
        let status = resp.status();
        let body = resp.text().await?;
        debug!(status = status.as_u16(), body_len = body.len(), "agent responded");

        if !status.is_success() {
            return Err(AgentError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let reply: AgentReply = serde_json::from_str(&body)?;
        if reply.reply.trim().is_empty() {
            return Err(AgentError::EmptyReply);
        }
        Ok(reply)
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────

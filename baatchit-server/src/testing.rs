//! Shared fixtures for unit tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Router;
use tokio::sync::Notify;

use crate::agent::{AgentClient, AgentError, AgentReply, AgentRequest, HttpAgentClient};
use crate::config::Config;
use crate::entities::SqliteStore;
use crate::state::AppState;

/// In-process [`AgentClient`] that plays back canned results and records
/// every request it receives. Once the script runs out it answers `"ok"`.
pub struct ScriptedAgent {
    replies: Mutex<VecDeque<Result<AgentReply, AgentError>>>,
    requests: Mutex<Vec<AgentRequest>>,
    /// When set, the first call parks until the gate is notified.
    gate: Option<Arc<Notify>>,
}

impl ScriptedAgent {
    pub fn new(replies: Vec<Result<AgentReply, AgentError>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
            gate: None,
        }
    }

    pub fn gated(gate: Arc<Notify>, replies: Vec<Result<AgentReply, AgentError>>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::new(replies)
        }
    }

    pub fn requests(&self) -> Vec<AgentRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl AgentClient for ScriptedAgent {
    async fn send(&self, request: &AgentRequest) -> Result<AgentReply, AgentError> {
        let call_index = {
            let mut requests = self.requests.lock().unwrap();
            requests.push(request.clone());
            requests.len() - 1
        };

        if call_index == 0 {
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
        }

        let next = self.replies.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Ok(AgentReply::text("ok")))
    }
}

/// Poll until `agent` has received at least `calls` requests.
pub async fn wait_for_calls(agent: &ScriptedAgent, calls: usize) {
    for _ in 0..200 {
        if agent.requests().len() >= calls {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("agent never received {calls} call(s)");
}

/// Serve `app` on an ephemeral local port and return the `/agent` URL.
pub async fn spawn_fake_agent(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}/agent")
}

/// Application state over an in-memory store, relaying to `agent_url`.
pub async fn test_state(agent_url: String) -> Arc<AppState> {
    let mut config = Config::from_lookup(|_| None);
    config.agent_url = agent_url;
    config.agent_timeout = Duration::from_secs(2);
    config.fallback_reply = "agent offline".into();
    let agent = HttpAgentClient::from_config(&config).unwrap();
    Arc::new(AppState::new(config, SqliteStore::memory().await, agent))
}

//! Shared application state injected into every Axum handler.

use std::collections::HashMap;
use std::sync::Arc;

use crate::agent::HttpAgentClient;
use crate::config::Config;
use crate::entities::SqliteStore;
use crate::services::relay::RelayService;

/// Idle lock entries are pruned once the map grows past this size.
const PRUNE_THRESHOLD: usize = 1024;

/// One async mutex per session ID, serialising relay turns for that session.
pub struct SessionLocks {
    locks: std::sync::Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl std::fmt::Debug for SessionLocks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = self.locks.lock().map(|l| l.len()).unwrap_or(0);
        write!(f, "SessionLocks({count} sessions)")
    }
}

impl SessionLocks {
    pub fn new() -> Self {
        Self {
            locks: std::sync::Mutex::new(HashMap::new()),
        }
    }

    /// Return the lock for `session_id`, creating it on first use.
    pub fn lock_for(&self, session_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut map = self.locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if map.len() > PRUNE_THRESHOLD {
            // Only the map holds an idle lock.
            map.retain(|_, lock| Arc::strong_count(lock) > 1);
        }
        Arc::clone(map.entry(session_id.to_owned()).or_default())
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.locks.lock().map(|l| l.len()).unwrap_or(0)
    }
}

impl Default for SessionLocks {
    fn default() -> Self {
        Self::new()
    }
}

/// The relay as wired in production.
pub type Relay = RelayService<SqliteStore, HttpAgentClient>;

/// State shared across all HTTP handlers.
#[derive(Clone, Debug)]
pub struct AppState {
    /// Server configuration (env-derived).
    pub config: Arc<Config>,
    /// Conversation store, also used directly for history reads.
    pub store: Arc<SqliteStore>,
    /// Message relay between clients and the agent.
    pub relay: Arc<Relay>,
}

impl AppState {
    pub fn new(config: Config, store: SqliteStore, agent: HttpAgentClient) -> Self {
        let store = Arc::new(store);
        let relay = RelayService::new(Arc::clone(&store), Arc::new(agent), &config);
        Self {
            config: Arc::new(config),
            store,
            relay: Arc::new(relay),
        }
    }
}

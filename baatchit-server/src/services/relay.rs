//! Relay between inbound chat messages and the external agent.
//!
//! One call walks `Received → UserMsgAppended → AgentCallAttempted →
//! {AgentReplyAppended | FallbackAppended} → Persisted → Acknowledged`.
//! Agent failures degrade to a fallback reply; only storage errors fail the
//! call. Turns for the same session are serialised through [`SessionLocks`].

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::agent::{AgentClient, AgentMetadata, AgentRequest};
use crate::config::Config;
use crate::entities::{AgentTurn, ConversationMessage, ConversationStore, MergePolicy, Sender};
use crate::state::SessionLocks;

/// Per-deployment knobs the relay needs from [`Config`].
#[derive(Debug, Clone)]
pub struct RelaySettings {
    pub metadata: AgentMetadata,
    pub fallback_reply: String,
    pub merge: MergePolicy,
}

impl RelaySettings {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            metadata: AgentMetadata::from_config(cfg),
            fallback_reply: cfg.fallback_reply.clone(),
            merge: cfg.intel_merge,
        }
    }
}

/// How the agent side of a turn was filled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentOutcome {
    Replied,
    Fallback,
    /// The inbound message came from the agent side; no call was made.
    Skipped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayOutcome {
    /// History length after the turn was persisted.
    pub history_len: usize,
    pub agent: AgentOutcome,
}

#[derive(Debug)]
pub struct RelayService<S, A> {
    store: Arc<S>,
    agent: Arc<A>,
    locks: SessionLocks,
    settings: RelaySettings,
}

impl<S: ConversationStore, A: AgentClient> RelayService<S, A> {
    pub fn new(store: Arc<S>, agent: Arc<A>, cfg: &Config) -> Self {
        Self::with_settings(store, agent, RelaySettings::from_config(cfg))
    }

    pub fn with_settings(store: Arc<S>, agent: Arc<A>, settings: RelaySettings) -> Self {
        Self {
            store,
            agent,
            locks: SessionLocks::new(),
            settings,
        }
    }

    /// Append `text` to the session, ask the agent for a reply and persist it.
    pub async fn handle_incoming_message(
        &self,
        session_id: &str,
        text: &str,
        sender: Sender,
    ) -> Result<RelayOutcome, sqlx::Error> {
        let lock = self.locks.lock_for(session_id);
        let _turn = lock.lock().await;

        // Persisted before the agent call so it survives an agent failure.
        let message = ConversationMessage::now(sender, text);
        let conversation = self
            .store
            .upsert_append_message(session_id, message.clone())
            .await?;

        if sender == Sender::Agent {
            debug!(session_id, "agent-side message stored without calling the agent");
            return Ok(RelayOutcome {
                history_len: conversation.history.len(),
                agent: AgentOutcome::Skipped,
            });
        }

        let request = AgentRequest {
            session_id: session_id.to_owned(),
            message,
            conversation_history: conversation.history,
            metadata: self.settings.metadata.clone(),
        };

        let (turn, outcome) = match self.agent.send(&request).await {
            Ok(reply) => {
                info!(
                    session_id,
                    reply_len = reply.reply.len(),
                    has_intelligence = reply.extracted_intelligence.is_some(),
                    "agent replied"
                );
                let turn = AgentTurn {
                    reply: ConversationMessage::now(Sender::Agent, reply.reply),
                    intelligence: reply.extracted_intelligence,
                    merge: self.settings.merge,
                    scam_detected: reply.scam_detected,
                };
                (turn, AgentOutcome::Replied)
            }
            Err(e) => {
                warn!(session_id, error = %e, "agent call failed; appending fallback reply");
                let reply = ConversationMessage::now(Sender::Agent, &self.settings.fallback_reply);
                (AgentTurn::reply_only(reply), AgentOutcome::Fallback)
            }
        };

        let conversation = self.store.record_agent_turn(session_id, turn).await?;
        Ok(RelayOutcome {
            history_len: conversation.history.len(),
            agent: outcome,
        })
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod test {
    use super::*;
    use crate::agent::{AgentError, AgentReply};
    use crate::entities::SqliteStore;
    use crate::testing::{ScriptedAgent, wait_for_calls};
    use serde_json::json;
    use std::time::Duration;
    use tokio::sync::Notify;
    use tracing_test::traced_test;

    const FALLBACK: &str = "agent offline";

    fn settings(merge: MergePolicy) -> RelaySettings {
        RelaySettings {
            metadata: AgentMetadata {
                channel: "SMS".into(),
                language: "English".into(),
                locale: "IN".into(),
            },
            fallback_reply: FALLBACK.into(),
            merge,
        }
    }

    async fn relay_with(
        agent: ScriptedAgent,
        merge: MergePolicy,
    ) -> (
        Arc<RelayService<SqliteStore, ScriptedAgent>>,
        Arc<SqliteStore>,
        Arc<ScriptedAgent>,
    ) {
        let store = Arc::new(SqliteStore::memory().await);
        let agent = Arc::new(agent);
        let relay = RelayService::with_settings(Arc::clone(&store), Arc::clone(&agent), settings(merge));
        (Arc::new(relay), store, agent)
    }

    fn snapshot_reply(reply: &str, intel: serde_json::Value) -> AgentReply {
        AgentReply {
            reply: reply.into(),
            extracted_intelligence: Some(serde_json::from_value(intel).unwrap()),
            scam_detected: None,
        }
    }

    #[tokio::test]
    async fn success_appends_user_and_reply() {
        let agent = ScriptedAgent::new(vec![Ok(AgentReply::text("who is this?"))]);
        let (relay, store, agent) = relay_with(agent, MergePolicy::Replace).await;

        let outcome = relay
            .handle_incoming_message("s1", "hello", Sender::User)
            .await
            .unwrap();
        assert_eq!(outcome, RelayOutcome { history_len: 2, agent: AgentOutcome::Replied });

        let convo = store.find_by_session("s1").await.unwrap().unwrap();
        assert_eq!(convo.history[0].sender, Sender::User);
        assert_eq!(convo.history[0].text, "hello");
        assert_eq!(convo.history[1].sender, Sender::Agent);
        assert_eq!(convo.history[1].text, "who is this?");

        let sent = agent.requests();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].session_id, "s1");
        assert_eq!(sent[0].message.text, "hello");
        assert_eq!(sent[0].conversation_history, vec![sent[0].message.clone()]);
        assert_eq!(sent[0].metadata.channel, "SMS");
    }

    #[tokio::test]
    #[traced_test]
    async fn agent_failure_appends_fallback_and_still_succeeds() {
        let agent = ScriptedAgent::new(vec![Err(AgentError::Status {
            status: 502,
            body: "bad gateway".into(),
        })]);
        let (relay, store, _) = relay_with(agent, MergePolicy::Replace).await;

        let outcome = relay
            .handle_incoming_message("s1", "hello", Sender::User)
            .await
            .unwrap();
        assert_eq!(outcome.agent, AgentOutcome::Fallback);
        assert_eq!(outcome.history_len, 2);

        let convo = store.find_by_session("s1").await.unwrap().unwrap();
        assert_eq!(convo.history.len(), 2);
        assert_eq!(convo.history[0].text, "hello");
        assert_eq!(convo.history[1].sender, Sender::Agent);
        assert_eq!(convo.history[1].text, FALLBACK);
        assert!(convo.extracted_intelligence.is_empty());
        assert!(logs_contain("agent call failed"));
        assert!(logs_contain("bad gateway"));
    }

    #[tokio::test]
    async fn later_snapshot_replaces_earlier_one() {
        let agent = ScriptedAgent::new(vec![
            Ok(snapshot_reply("ok", json!({ "upiIds": ["a@upi"], "scamType": "kyc" }))),
            Ok(snapshot_reply("go on", json!({ "phishingLinks": ["http://bad.test"] }))),
        ]);
        let (relay, store, _) = relay_with(agent, MergePolicy::Replace).await;

        relay.handle_incoming_message("s1", "one", Sender::User).await.unwrap();
        relay.handle_incoming_message("s1", "two", Sender::User).await.unwrap();

        let convo = store.find_by_session("s1").await.unwrap().unwrap();
        assert_eq!(convo.history.len(), 4);
        assert_eq!(
            convo.extracted_intelligence,
            serde_json::from_value(json!({ "phishingLinks": ["http://bad.test"] })).unwrap()
        );
    }

    #[tokio::test]
    async fn reply_without_snapshot_keeps_intelligence() {
        let agent = ScriptedAgent::new(vec![
            Ok(snapshot_reply("ok", json!({ "upiIds": ["a@upi"] }))),
            Ok(AgentReply::text("and then?")),
        ]);
        let (relay, store, _) = relay_with(agent, MergePolicy::Replace).await;

        relay.handle_incoming_message("s1", "one", Sender::User).await.unwrap();
        relay.handle_incoming_message("s1", "two", Sender::User).await.unwrap();

        let convo = store.find_by_session("s1").await.unwrap().unwrap();
        assert_eq!(convo.extracted_intelligence.get("upiIds"), Some(&json!(["a@upi"])));
    }

    #[tokio::test]
    async fn accumulate_policy_keeps_earlier_indicators() {
        let agent = ScriptedAgent::new(vec![
            Ok(snapshot_reply("ok", json!({ "upiIds": ["a@upi"] }))),
            Ok(snapshot_reply("ok", json!({ "upiIds": ["b@upi"] }))),
        ]);
        let (relay, store, _) = relay_with(agent, MergePolicy::Accumulate).await;

        relay.handle_incoming_message("s1", "one", Sender::User).await.unwrap();
        relay.handle_incoming_message("s1", "two", Sender::User).await.unwrap();

        let convo = store.find_by_session("s1").await.unwrap().unwrap();
        assert_eq!(convo.extracted_intelligence.get("upiIds"), Some(&json!(["a@upi", "b@upi"])));
    }

    #[tokio::test]
    async fn scam_verdict_flags_conversation() {
        let agent = ScriptedAgent::new(vec![Ok(AgentReply {
            reply: "please share the OTP".into(),
            extracted_intelligence: None,
            scam_detected: Some(true),
        })]);
        let (relay, store, _) = relay_with(agent, MergePolicy::Replace).await;

        relay.handle_incoming_message("s1", "hi", Sender::User).await.unwrap();

        let convo = store.find_by_session("s1").await.unwrap().unwrap();
        assert!(convo.is_scam_detected);
        assert_eq!(convo.status, crate::entities::ConversationStatus::Flagged);
    }

    #[tokio::test]
    async fn agent_side_message_skips_the_agent() {
        let (relay, store, agent) = relay_with(ScriptedAgent::new(vec![]), MergePolicy::Replace).await;

        let outcome = relay
            .handle_incoming_message("s1", "manual reply", Sender::Agent)
            .await
            .unwrap();
        assert_eq!(outcome, RelayOutcome { history_len: 1, agent: AgentOutcome::Skipped });
        assert!(agent.requests().is_empty());

        let convo = store.find_by_session("s1").await.unwrap().unwrap();
        assert_eq!(convo.history[0].sender, Sender::Agent);
    }

    #[tokio::test]
    async fn history_sent_to_agent_grows_each_turn() {
        let agent = ScriptedAgent::new(vec![]);
        let (relay, _, agent) = relay_with(agent, MergePolicy::Replace).await;

        for text in ["a", "b", "c"] {
            relay.handle_incoming_message("s1", text, Sender::User).await.unwrap();
        }

        let lens: Vec<_> = agent
            .requests()
            .iter()
            .map(|r| r.conversation_history.len())
            .collect();
        assert_eq!(lens, [1, 3, 5]);
    }

    #[tokio::test]
    async fn storage_failure_is_surfaced() {
        let (relay, store, agent) = relay_with(ScriptedAgent::new(vec![]), MergePolicy::Replace).await;
        store.close().await;

        let result = relay.handle_incoming_message("s1", "hello", Sender::User).await;
        assert!(result.is_err());
        assert!(agent.requests().is_empty());
    }

    #[tokio::test]
    async fn concurrent_posts_to_one_session_do_not_interleave() {
        let gate = Arc::new(Notify::new());
        let agent = ScriptedAgent::gated(
            Arc::clone(&gate),
            vec![Ok(AgentReply::text("reply A")), Ok(AgentReply::text("reply B"))],
        );
        let (relay, store, agent) = relay_with(agent, MergePolicy::Replace).await;

        let first = {
            let relay = Arc::clone(&relay);
            tokio::spawn(async move { relay.handle_incoming_message("s1", "first", Sender::User).await })
        };
        // First turn is now parked inside the agent call.
        wait_for_calls(&agent, 1).await;

        let second = {
            let relay = Arc::clone(&relay);
            tokio::spawn(async move { relay.handle_incoming_message("s1", "second", Sender::User).await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;

        // The second turn waits on the session lock and has not read or written.
        let convo = store.find_by_session("s1").await.unwrap().unwrap();
        assert_eq!(convo.history.len(), 1);
        assert_eq!(agent.requests().len(), 1);

        gate.notify_one();
        first.await.unwrap().unwrap();
        second.await.unwrap().unwrap();

        let convo = store.find_by_session("s1").await.unwrap().unwrap();
        let texts: Vec<_> = convo.history.iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, ["first", "reply A", "second", "reply B"]);

        // The second agent call saw the first turn in full.
        assert_eq!(agent.requests()[1].conversation_history.len(), 3);
    }

    #[tokio::test]
    async fn other_sessions_are_not_blocked() {
        let gate = Arc::new(Notify::new());
        let agent = ScriptedAgent::gated(Arc::clone(&gate), vec![]);
        let (relay, store, agent) = relay_with(agent, MergePolicy::Replace).await;

        let parked = {
            let relay = Arc::clone(&relay);
            tokio::spawn(async move { relay.handle_incoming_message("slow", "hi", Sender::User).await })
        };
        wait_for_calls(&agent, 1).await;

        relay.handle_incoming_message("fast", "hi", Sender::User).await.unwrap();
        let fast = store.find_by_session("fast").await.unwrap().unwrap();
        assert_eq!(fast.history.len(), 2);

        gate.notify_one();
        parked.await.unwrap().unwrap();
    }
}

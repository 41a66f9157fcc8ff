use std::future::Future;

use chrono::Utc;
use sqlx::SqliteConnection;
use tracing::warn;

use crate::entities::SqliteStore;
use crate::entities::dao::{
    AgentTurn, Conversation, ConversationMessage, ConversationStatus, Intelligence, MergePolicy,
    Sender,
};

pub trait ConversationStore: Send + Sync + 'static {
    /// Load a conversation with its full history. A miss is `Ok(None)`.
    fn find_by_session(
        &self,
        session_id: &str,
    ) -> impl Future<Output = Result<Option<Conversation>, sqlx::Error>> + Send;

    /// Create the conversation if needed and append one message to it.
    fn upsert_append_message(
        &self,
        session_id: &str,
        message: ConversationMessage,
    ) -> impl Future<Output = Result<Conversation, sqlx::Error>> + Send;

    /// Fold an intelligence snapshot into the stored one.
    fn merge_intelligence(
        &self,
        session_id: &str,
        snapshot: Intelligence,
        policy: MergePolicy,
    ) -> impl Future<Output = Result<(), sqlx::Error>> + Send;

    /// Append the agent's reply and apply its intelligence and scam verdict
    /// in one transaction.
    fn record_agent_turn(
        &self,
        session_id: &str,
        turn: AgentTurn,
    ) -> impl Future<Output = Result<Conversation, sqlx::Error>> + Send;
}

impl ConversationStore for SqliteStore {
    async fn find_by_session(&self, session_id: &str) -> Result<Option<Conversation>, sqlx::Error> {
        let mut conn = self.pool.acquire().await?;
        load_conversation(&mut conn, session_id).await
    }

    async fn upsert_append_message(
        &self,
        session_id: &str,
        message: ConversationMessage,
    ) -> Result<Conversation, sqlx::Error> {
        let now = Utc::now().timestamp_millis();
        let mut tx = self.pool.begin().await?;
        ensure_conversation(&mut tx, session_id, now).await?;
        insert_message(&mut tx, session_id, &message).await?;
        touch(&mut tx, session_id, now).await?;
        let conversation = load_conversation(&mut tx, session_id)
            .await?
            .ok_or(sqlx::Error::RowNotFound)?;
        tx.commit().await?;
        Ok(conversation)
    }

    async fn merge_intelligence(
        &self,
        session_id: &str,
        snapshot: Intelligence,
        policy: MergePolicy,
    ) -> Result<(), sqlx::Error> {
        let now = Utc::now().timestamp_millis();
        let mut tx = self.pool.begin().await?;
        ensure_conversation(&mut tx, session_id, now).await?;
        write_intelligence(&mut tx, session_id, snapshot, policy).await?;
        touch(&mut tx, session_id, now).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn record_agent_turn(
        &self,
        session_id: &str,
        turn: AgentTurn,
    ) -> Result<Conversation, sqlx::Error> {
        let now = Utc::now().timestamp_millis();
        let mut tx = self.pool.begin().await?;
        ensure_conversation(&mut tx, session_id, now).await?;
        insert_message(&mut tx, session_id, &turn.reply).await?;

        if let Some(snapshot) = turn.intelligence {
            write_intelligence(&mut tx, session_id, snapshot, turn.merge).await?;
        }

        if turn.scam_detected == Some(true) {
            sqlx::query(
                "UPDATE conversations SET is_scam_detected = 1, status = ?1 WHERE session_id = ?2",
            )
            .bind(ConversationStatus::Flagged.as_str())
            .bind(session_id)
            .execute(&mut *tx)
            .await?;
        }

        touch(&mut tx, session_id, now).await?;
        let conversation = load_conversation(&mut tx, session_id)
            .await?
            .ok_or(sqlx::Error::RowNotFound)?;
        tx.commit().await?;
        Ok(conversation)
    }
}

// ── private helpers ──────────────────────────────────────────────────────────

async fn ensure_conversation(
    conn: &mut SqliteConnection,
    session_id: &str,
    now: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO conversations (session_id, status, created_at, updated_at) \
         VALUES (?1, ?2, ?3, ?3) \
         ON CONFLICT(session_id) DO NOTHING",
    )
    .bind(session_id)
    .bind(ConversationStatus::Active.as_str())
    .bind(now)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

async fn insert_message(
    conn: &mut SqliteConnection,
    session_id: &str,
    message: &ConversationMessage,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO conversation_messages (session_id, sender, text, timestamp_ms) \
         VALUES (?1, ?2, ?3, ?4)",
    )
    .bind(session_id)
    .bind(message.sender.as_str())
    .bind(&message.text)
    .bind(message.timestamp)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

async fn touch(conn: &mut SqliteConnection, session_id: &str, now: i64) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE conversations SET updated_at = ?1 WHERE session_id = ?2")
        .bind(now)
        .bind(session_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

async fn write_intelligence(
    conn: &mut SqliteConnection,
    session_id: &str,
    snapshot: Intelligence,
    policy: MergePolicy,
) -> Result<(), sqlx::Error> {
    let merged = match policy {
        MergePolicy::Replace => snapshot,
        MergePolicy::Accumulate => {
            let row: Option<(String,)> = sqlx::query_as(
                "SELECT extracted_intelligence FROM conversations WHERE session_id = ?1",
            )
            .bind(session_id)
            .fetch_optional(&mut *conn)
            .await?;
            let mut current = row
                .map(|(raw,)| decode_intelligence(session_id, &raw))
                .unwrap_or_default();
            current.apply(snapshot, policy);
            current
        }
    };

    let encoded = serde_json::to_string(&merged).map_err(|e| sqlx::Error::Encode(Box::new(e)))?;
    sqlx::query("UPDATE conversations SET extracted_intelligence = ?1 WHERE session_id = ?2")
        .bind(&encoded)
        .bind(session_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

async fn load_conversation(
    conn: &mut SqliteConnection,
    session_id: &str,
) -> Result<Option<Conversation>, sqlx::Error> {
    let row: Option<(String, bool, String, i64, i64)> = sqlx::query_as(
        "SELECT status, is_scam_detected, extracted_intelligence, created_at, updated_at \
         FROM conversations WHERE session_id = ?1",
    )
    .bind(session_id)
    .fetch_optional(&mut *conn)
    .await?;

    let Some((status, is_scam_detected, intelligence, created_at, updated_at)) = row else {
        return Ok(None);
    };

    let rows: Vec<(String, String, i64)> = sqlx::query_as(
        "SELECT sender, text, timestamp_ms FROM conversation_messages \
         WHERE session_id = ?1 ORDER BY id ASC",
    )
    .bind(session_id)
    .fetch_all(&mut *conn)
    .await?;

    let history = rows
        .into_iter()
        .map(|(sender, text, timestamp)| ConversationMessage {
            sender: sender.parse().unwrap_or_else(|e: String| {
                warn!(session_id, raw = %sender, error = %e, "unknown message sender; treating as user");
                Sender::User
            }),
            text,
            timestamp,
        })
        .collect();

    Ok(Some(Conversation {
        session_id: session_id.to_owned(),
        history,
        extracted_intelligence: decode_intelligence(session_id, &intelligence),
        is_scam_detected,
        status: status.parse().unwrap_or_else(|e: String| {
            warn!(session_id, raw = %status, error = %e, "failed to parse conversation status; using active");
            ConversationStatus::Active
        }),
        created_at,
        updated_at,
    }))
}

fn decode_intelligence(session_id: &str, raw: &str) -> Intelligence {
    serde_json::from_str(raw).unwrap_or_else(|e| {
        warn!(session_id, error = %e, "stored intelligence is not a JSON object; using empty");
        Intelligence::default()
    })
}

// ── Tests ──────────────────────────────────────────────────────────────────────

//! Message-log collaborator for callers that keep chat history.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::classifier::classify;
use crate::session::Message;

/// Action recorded for every crisis: the fixed escalation script was sent.
pub const ACTION_CRISIS_SCRIPT: &str = "crisis_script";

/// Audit record of one crisis escalation, kept apart from the chat log so
/// follow-up can be tracked per session.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CrisisEvent {
    pub id: Uuid,
    pub session_id: String,
    /// The user message that triggered the escalation.
    pub message_id: Uuid,
    /// Lexicon terms that fired.
    pub matched: Vec<String>,
    pub action_taken: String,
    pub follow_up_required: bool,
    pub created_at: DateTime<Utc>,
}

impl CrisisEvent {
    /// Build the record for a user message answered with the crisis script.
    pub fn escalated(session_id: &str, user: &Message, reply: &Message) -> Self {
        Self {
            id: Uuid::new_v4(),
            session_id: session_id.to_string(),
            message_id: user.id,
            matched: classify(&user.body)
                .matched
                .into_iter()
                .map(str::to_string)
                .collect(),
            action_taken: ACTION_CRISIS_SCRIPT.to_string(),
            follow_up_required: true,
            created_at: reply.created_at,
        }
    }
}

/// Append-only storage of messages per session id.
#[async_trait]
pub trait MessageLog: Send + Sync {
    async fn append(&self, session_id: &str, message: &Message) -> anyhow::Result<()>;

    /// Messages of `session_id` in append order; empty for unknown ids.
    async fn list(&self, session_id: &str) -> anyhow::Result<Vec<Message>>;

    async fn record_crisis(&self, event: &CrisisEvent) -> anyhow::Result<()>;

    /// Crisis records of `session_id` in record order.
    async fn crisis_events(&self, session_id: &str) -> anyhow::Result<Vec<CrisisEvent>>;
}

/// Process-local log; lost on restart.
#[derive(Debug, Default)]
pub struct InMemoryMessageLog {
    inner: RwLock<HashMap<String, Vec<Message>>>,
    crises: RwLock<Vec<CrisisEvent>>,
}

impl InMemoryMessageLog {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MessageLog for InMemoryMessageLog {
    async fn append(&self, session_id: &str, message: &Message) -> anyhow::Result<()> {
        let mut map = self.inner.write().await;
        map.entry(session_id.to_string())
            .or_default()
            .push(message.clone());
        Ok(())
    }

    async fn list(&self, session_id: &str) -> anyhow::Result<Vec<Message>> {
        let map = self.inner.read().await;
        Ok(map.get(session_id).cloned().unwrap_or_default())
    }

    async fn record_crisis(&self, event: &CrisisEvent) -> anyhow::Result<()> {
        self.crises.write().await.push(event.clone());
        Ok(())
    }

    async fn crisis_events(&self, session_id: &str) -> anyhow::Result<Vec<CrisisEvent>> {
        let events = self.crises.read().await;
        Ok(events
            .iter()
            .filter(|e| e.session_id == session_id)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[tokio::test]
    async fn lists_per_session_in_append_order() {
        let log = InMemoryMessageLog::new();
        let a = Message::user("first", Utc::now(), None);
        let b = Message::user("second", Utc::now(), None);
        log.append("u1", &a).await.unwrap();
        log.append("u2", &b).await.unwrap();
        log.append("u1", &b).await.unwrap();

        let u1 = log.list("u1").await.unwrap();
        assert_eq!(u1, vec![a, b.clone()]);
        assert_eq!(log.list("u2").await.unwrap(), vec![b]);
        assert!(log.list("nobody").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn crisis_events_carry_trigger_terms_per_session() {
        use crate::classifier::Classification;

        let log = InMemoryMessageLog::new();
        let user = Message::user("I feel hopeless", Utc::now(), Some(Classification::Crisis));
        let reply = Message::bot_reply("call 988", Utc::now(), Classification::Crisis, user.id);
        log.record_crisis(&CrisisEvent::escalated("u1", &user, &reply))
            .await
            .unwrap();

        let events = log.crisis_events("u1").await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].message_id, user.id);
        assert_eq!(events[0].matched, vec!["hopeless".to_string()]);
        assert_eq!(events[0].action_taken, ACTION_CRISIS_SCRIPT);
        assert!(events[0].follow_up_required);
        assert!(log.crisis_events("u2").await.unwrap().is_empty());
    }
}

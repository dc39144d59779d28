//! Messages, append-only sessions, and the per-user session arena.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::classifier::Classification;

/// Session key used when the caller supplies no user id.
pub const ANONYMOUS: &str = "anonymous";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Bot,
}

/// One chat line. Immutable once built; sessions hand out clones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: Uuid,
    pub sender: Sender,
    pub body: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classification: Option<Classification>,
    /// For bot replies: the user message this answers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_reply_to: Option<Uuid>,
}

impl Message {
    pub fn user(
        body: impl Into<String>,
        created_at: DateTime<Utc>,
        classification: Option<Classification>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            sender: Sender::User,
            body: body.into(),
            created_at,
            classification,
            in_reply_to: None,
        }
    }

    pub fn bot_reply(
        body: impl Into<String>,
        created_at: DateTime<Utc>,
        classification: Classification,
        in_reply_to: Uuid,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            sender: Sender::Bot,
            body: body.into(),
            created_at,
            classification: Some(classification),
            in_reply_to: Some(in_reply_to),
        }
    }

    /// Unsolicited bot line (the greeting).
    pub fn bot(body: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            sender: Sender::Bot,
            body: body.into(),
            created_at,
            classification: Some(Classification::Normal),
            in_reply_to: None,
        }
    }

    pub fn is_crisis(&self) -> bool {
        self.classification == Some(Classification::Crisis)
    }
}

/// Ordered, append-only message log for one conversation.
///
/// Appends go through a single mutex so concurrent reply tasks land in a
/// well-defined order; the lock is never held across an await.
#[derive(Debug)]
pub struct Session {
    id: String,
    log: Mutex<Vec<Message>>,
    pending: AtomicUsize,
}

impl Session {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            log: Mutex::new(Vec::new()),
            pending: AtomicUsize::new(0),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub(crate) fn append(&self, message: Message) {
        self.log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(message);
    }

    /// Snapshot of the log in append order.
    pub fn messages(&self) -> Vec<Message> {
        self.log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.log.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True while at least one bot reply is still pending ("typing").
    pub fn is_typing(&self) -> bool {
        self.pending_replies() > 0
    }

    pub fn pending_replies(&self) -> usize {
        self.pending.load(Ordering::Acquire)
    }

    pub(crate) fn reply_scheduled(&self) {
        self.pending.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn reply_settled(&self) {
        self.pending.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Normalize an optional user id into a session key.
pub fn session_key(user_id: Option<&str>) -> String {
    match user_id.map(str::trim) {
        Some(id) if !id.is_empty() => id.to_string(),
        _ => ANONYMOUS.to_string(),
    }
}

/// Arena of sessions keyed by user id. Sessions share nothing but this map.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, Arc<Session>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, user_id: Option<&str>) -> Option<Arc<Session>> {
        let key = session_key(user_id);
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
            .cloned()
    }

    /// Return the session for `user_id`, creating it on first use. `init`
    /// runs once, under the registry lock, only for a freshly created session.
    pub fn get_or_create_with<F>(&self, user_id: Option<&str>, init: F) -> Arc<Session>
    where
        F: FnOnce(&Session),
    {
        if let Some(s) = self.get(user_id) {
            return s;
        }
        let key = session_key(user_id);
        let mut map = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        map.entry(key.clone())
            .or_insert_with(|| {
                let s = Session::new(key);
                init(&s);
                Arc::new(s)
            })
            .clone()
    }

    pub fn get_or_create(&self, user_id: Option<&str>) -> Arc<Session> {
        self.get_or_create_with(user_id, |_| {})
    }

    /// Forget a session. Pending replies still hold their own handle to it.
    pub fn discard(&self, user_id: Option<&str>) -> Option<Arc<Session>> {
        let key = session_key(user_id);
        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&key)
    }

    pub fn len(&self) -> usize {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

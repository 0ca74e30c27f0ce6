//! Conversation context store: one [`Session`] per active user interaction,
//! holding the in-progress record and the turn history.
//!
//! Turns within one session must be processed strictly in arrival order -
//! each merge depends on the record left by the previous turn - so the store
//! hands out each session behind its own mutex. Sessions are fully
//! independent; there is no cross-session locking.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use uuid::Uuid;

use fieldrep_core::InteractionRecord;

/// How many trailing turns are fed to the router and the extraction oracle.
/// Keeps oracle context bounded regardless of conversation length.
pub const HISTORY_WINDOW: usize = 8;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

/// One conversation message. Immutable once appended; ordering is arrival
/// order.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

/// One user's in-progress conversation plus its current record.
#[derive(Clone, Debug)]
pub struct Session {
    pub id: Uuid,
    record: InteractionRecord,
    turns: Vec<Turn>,
    bound_interaction_id: Option<i64>,
}

impl Session {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            record: InteractionRecord::default(),
            turns: Vec::new(),
            bound_interaction_id: None,
        }
    }

    pub fn append_turn(&mut self, role: Role, content: impl Into<String>) {
        self.turns.push(Turn { role, content: content.into(), timestamp: Utc::now() });
    }

    pub fn current_record(&self) -> &InteractionRecord {
        &self.record
    }

    pub fn replace_record(&mut self, record: InteractionRecord) {
        self.record = record;
    }

    /// Binds this session to a persisted interaction being edited. The
    /// loaded record is treated identically to a fresh in-progress one from
    /// here on.
    pub fn bind_interaction(&mut self, id: i64, record: InteractionRecord) {
        self.bound_interaction_id = Some(id);
        self.record = record;
    }

    pub fn bound_interaction_id(&self) -> Option<i64> {
        self.bound_interaction_id
    }

    /// Clears history, record, and any bound persisted id. Mirrors the
    /// explicit "clear form" action; the only way any field is ever cleared.
    pub fn reset(&mut self) {
        self.record = InteractionRecord::default();
        self.turns.clear();
        self.bound_interaction_id = None;
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn recent_turns(&self, window: usize) -> &[Turn] {
        let start = self.turns.len().saturating_sub(window);
        &self.turns[start..]
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

/// Hands out sessions keyed by id, each behind its own mutex so concurrent
/// requests for the same session serialize while distinct sessions proceed
/// in parallel.
#[derive(Default)]
pub struct SessionStore {
    sessions: Mutex<HashMap<Uuid, Arc<Mutex<Session>>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetches the session for `id`, creating a fresh one when `id` is
    /// absent or unknown. Returns the id actually in use.
    pub async fn get_or_create(&self, id: Option<Uuid>) -> (Uuid, Arc<Mutex<Session>>) {
        let mut sessions = self.sessions.lock().await;
        if let Some(id) = id {
            if let Some(existing) = sessions.get(&id) {
                return (id, Arc::clone(existing));
            }
        }
        let session = Session::new();
        let id = session.id;
        let handle = Arc::new(Mutex::new(session));
        sessions.insert(id, Arc::clone(&handle));
        (id, handle)
    }

    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }
}

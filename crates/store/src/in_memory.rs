//! In-memory session store: useful for testing and one-shot CLI runs.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use loopwright_core::error::SessionError;
use loopwright_core::session::{AgentDefinition, MessageRecord, SessionRecord, SessionStore};
use tokio::sync::RwLock;

struct SessionState {
    record: SessionRecord,
    messages: Vec<MessageRecord>,
}

/// Sessions and their message logs held in a map behind one `RwLock`.
///
/// The version compare-and-increment runs under the write lock, so it is
/// atomic with respect to every other caller.
#[derive(Clone, Default)]
pub struct InMemorySessionStore {
    sessions: Arc<RwLock<HashMap<String, SessionState>>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn create_session(
        &self,
        conversation_id: &str,
        definition: AgentDefinition,
    ) -> Result<SessionRecord, SessionError> {
        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(conversation_id) {
            return Err(SessionError::AlreadyExists(conversation_id.to_string()));
        }
        let now = Utc::now();
        let record = SessionRecord {
            conversation_id: conversation_id.to_string(),
            definition,
            version: 0,
            created_at: now,
            updated_at: now,
        };
        sessions.insert(
            conversation_id.to_string(),
            SessionState {
                record: record.clone(),
                messages: Vec::new(),
            },
        );
        Ok(record)
    }

    async fn get_session(&self, conversation_id: &str) -> Result<Option<SessionRecord>, SessionError> {
        Ok(self
            .sessions
            .read()
            .await
            .get(conversation_id)
            .map(|s| s.record.clone()))
    }

    async fn try_bump_version(&self, conversation_id: &str, expected: i64) -> Result<bool, SessionError> {
        let mut sessions = self.sessions.write().await;
        let state = sessions
            .get_mut(conversation_id)
            .ok_or_else(|| SessionError::NotFound(conversation_id.to_string()))?;
        if state.record.version != expected {
            return Ok(false);
        }
        state.record.version += 1;
        state.record.updated_at = Utc::now();
        Ok(true)
    }

    async fn append_message(&self, record: MessageRecord) -> Result<(), SessionError> {
        let mut sessions = self.sessions.write().await;
        let state = sessions
            .get_mut(&record.conversation_id)
            .ok_or_else(|| SessionError::NotFound(record.conversation_id.clone()))?;
        let last = state.messages.last().map(|m| m.seq).unwrap_or(0);
        if record.seq <= last {
            return Err(SessionError::SequenceOutOfOrder {
                conversation_id: record.conversation_id,
                seq: record.seq,
                last,
            });
        }
        state.messages.push(record);
        Ok(())
    }

    async fn messages(&self, conversation_id: &str) -> Result<Vec<MessageRecord>, SessionError> {
        Ok(self
            .sessions
            .read()
            .await
            .get(conversation_id)
            .map(|s| s.messages.clone())
            .unwrap_or_default())
    }
}

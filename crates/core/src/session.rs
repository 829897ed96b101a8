//! Session persistence boundary.
//!
//! A session record carries the agent configuration snapshot taken when the
//! conversation was created, plus a monotonic `version` used for optimistic
//! concurrency. Messages are stored append-only under a strictly increasing
//! sequence number.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::SessionError;
use crate::llm::ToolChoice;
use crate::message::Role;

/// Agent configuration frozen into a session at creation time.
///
/// Later edits to the agent's defaults never reach an existing session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentDefinition {
    /// Free-form agent type label (e.g. "react")
    pub agent_type: String,

    /// System prompt seeded at the top of every run
    pub system_prompt: String,

    /// Optional user turn appended after every act phase
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_step_prompt: Option<String>,

    /// Step budget per run
    pub max_steps: u32,

    /// Identical responses tolerated before stopping
    pub duplicate_threshold: u32,

    /// Tool choice policy passed to the model
    #[serde(default)]
    pub tool_choice: ToolChoice,

    /// Remote tool sources this session may use (empty = all)
    #[serde(default)]
    pub enabled_sources: Vec<String>,
}

impl Default for AgentDefinition {
    fn default() -> Self {
        Self {
            agent_type: "react".into(),
            system_prompt: "You are a helpful assistant that solves tasks step by step.".into(),
            next_step_prompt: None,
            max_steps: 10,
            duplicate_threshold: 2,
            tool_choice: ToolChoice::Auto,
            enabled_sources: Vec::new(),
        }
    }
}

/// A persisted conversation session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub conversation_id: String,
    pub definition: AgentDefinition,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One append-only message row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageRecord {
    pub conversation_id: String,
    pub seq: i64,
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl MessageRecord {
    pub fn new(conversation_id: impl Into<String>, seq: i64, role: Role, content: impl Into<String>) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            seq,
            role,
            content: content.into(),
            created_at: Utc::now(),
        }
    }
}

/// Storage for sessions and their message log.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// The name of this backend (e.g., "sqlite", "in_memory").
    fn name(&self) -> &str;

    /// Create a session with version 0. Fails if the id already exists.
    async fn create_session(
        &self,
        conversation_id: &str,
        definition: AgentDefinition,
    ) -> Result<SessionRecord, SessionError>;

    /// Fetch a session, or `None` when it does not exist.
    async fn get_session(&self, conversation_id: &str) -> Result<Option<SessionRecord>, SessionError>;

    /// Compare-and-increment the version.
    ///
    /// Returns `true` only when the stored version equalled `expected` and
    /// was atomically bumped to `expected + 1`.
    async fn try_bump_version(&self, conversation_id: &str, expected: i64) -> Result<bool, SessionError>;

    /// Append a message. `seq` must be greater than every stored seq for the session.
    async fn append_message(&self, record: MessageRecord) -> Result<(), SessionError>;

    /// All messages for a session in sequence order.
    async fn messages(&self, conversation_id: &str) -> Result<Vec<MessageRecord>, SessionError>;

    /// The highest stored sequence number, or 0 when the log is empty.
    async fn last_seq(&self, conversation_id: &str) -> Result<i64, SessionError> {
        Ok(self
            .messages(conversation_id)
            .await?
            .last()
            .map(|m| m.seq)
            .unwrap_or(0))
    }
}

//! Optimistic-concurrency gate in front of the runner.
//!
//! A turn is admitted only if it wins the compare-and-increment on the
//! session version. The gate is passed once, up front; nothing is held
//! across the LLM or tool calls of the run itself.

use std::sync::Arc;

use loopwright_core::error::SessionError;
use loopwright_core::message::Role;
use loopwright_core::session::{AgentDefinition, MessageRecord, SessionRecord, SessionStore};
use tracing::{debug, error, info, warn};

use crate::context::{ExecutionContext, RunDefaults, RunResult};
use crate::orchestrator::Runner;

const APPEND_ATTEMPTS: u32 = 3;

pub struct SessionGate {
    store: Arc<dyn SessionStore>,
    runner: Arc<dyn Runner>,
    defaults: RunDefaults,
}

impl SessionGate {
    pub fn new(store: Arc<dyn SessionStore>, runner: Arc<dyn Runner>) -> Self {
        Self {
            store,
            runner,
            defaults: RunDefaults::default(),
        }
    }

    pub fn with_defaults(mut self, defaults: RunDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    /// Snapshot `definition` into a new session at version 0.
    pub async fn create_session(
        &self,
        conversation_id: &str,
        definition: AgentDefinition,
    ) -> Result<SessionRecord, SessionError> {
        let record = self.store.create_session(conversation_id, definition).await?;
        info!(conversation_id = %conversation_id, "Session created");
        Ok(record)
    }

    pub async fn history(&self, conversation_id: &str) -> Result<Vec<MessageRecord>, SessionError> {
        self.store.messages(conversation_id).await
    }

    /// Run one turn if the session is still at `expected_version`.
    ///
    /// A caller that loses the race gets [`SessionError::VersionConflict`]
    /// and nothing is written on its behalf. Conflicts are never retried here.
    pub async fn run_turn(
        &self,
        conversation_id: &str,
        expected_version: i64,
        message: &str,
    ) -> Result<RunResult, SessionError> {
        let session = self
            .store
            .get_session(conversation_id)
            .await?
            .ok_or_else(|| SessionError::NotFound(conversation_id.to_string()))?;

        if !self
            .store
            .try_bump_version(conversation_id, expected_version)
            .await?
        {
            warn!(
                conversation_id = %conversation_id,
                expected = expected_version,
                "Version conflict, turn rejected"
            );
            return Err(SessionError::VersionConflict {
                conversation_id: conversation_id.to_string(),
                expected: expected_version,
            });
        }
        debug!(
            conversation_id = %conversation_id,
            version = expected_version + 1,
            "Turn admitted"
        );

        self.append(conversation_id, Role::User, message).await?;

        let ctx = ExecutionContext::new(conversation_id, message, &session.definition)
            .with_defaults(self.defaults);
        let result = self.runner.execute(ctx).await;

        // The run already happened; a lost answer row must not lose the result.
        if let Some(answer) = &result.answer {
            if let Err(e) = self.append(conversation_id, Role::Assistant, answer).await {
                error!(
                    conversation_id = %conversation_id,
                    trace_id = %result.trace_id,
                    error = %e,
                    "Failed to store the answer"
                );
            }
        }

        info!(
            conversation_id = %conversation_id,
            trace_id = %result.trace_id,
            success = result.success,
            reason = %result.termination_reason,
            "Turn finished"
        );
        Ok(result)
    }

    /// Run one turn against whatever version is current.
    ///
    /// Still loses to a concurrent turn that bumps the version between the
    /// read and the bump.
    pub async fn run_latest(
        &self,
        conversation_id: &str,
        message: &str,
    ) -> Result<RunResult, SessionError> {
        let version = self
            .store
            .get_session(conversation_id)
            .await?
            .map(|s| s.version)
            .ok_or_else(|| SessionError::NotFound(conversation_id.to_string()))?;
        self.run_turn(conversation_id, version, message).await
    }

    /// Append after the current tail, re-reading it if another turn got there first.
    async fn append(&self, conversation_id: &str, role: Role, content: &str) -> Result<(), SessionError> {
        let mut attempt = 1;
        loop {
            let seq = self.store.last_seq(conversation_id).await? + 1;
            let record = MessageRecord::new(conversation_id, seq, role, content);
            match self.store.append_message(record).await {
                Err(SessionError::SequenceOutOfOrder { .. }) if attempt < APPEND_ATTEMPTS => {
                    debug!(conversation_id = %conversation_id, seq, "Sequence taken, retrying append");
                    attempt += 1;
                }
                other => return other,
            }
        }
    }
}

//! Per-run execution context, the step-record audit log, and the run result.

use chrono::{DateTime, Utc};
use loopwright_config::AgentConfig;
use loopwright_core::llm::ToolChoice;
use loopwright_core::session::AgentDefinition;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::state_machine::AgentState;

/// Longest prompt summary kept in a [`StepRecord`], in characters.
pub const PROMPT_SUMMARY_CHARS: usize = 200;

/// Default cap on a single tool observation, in characters.
pub const DEFAULT_MAX_OBSERVATION_CHARS: usize = 8000;

/// Default number of consecutive empty responses tolerated.
pub const DEFAULT_EMPTY_THRESHOLD: u32 = 2;

/// Why a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TerminationReason {
    Completed,
    MaxSteps,
    EmptyResponse,
    DuplicateResponse,
    ToolTerminate,
    Error,
}

impl TerminationReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            TerminationReason::Completed => "COMPLETED",
            TerminationReason::MaxSteps => "MAX_STEPS",
            TerminationReason::EmptyResponse => "EMPTY_RESPONSE",
            TerminationReason::DuplicateResponse => "DUPLICATE_RESPONSE",
            TerminationReason::ToolTerminate => "TOOL_TERMINATE",
            TerminationReason::Error => "ERROR",
        }
    }
}

impl std::fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StepPhase {
    Think,
    Act,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRecord {
    pub name: String,
    pub arguments: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResultRecord {
    pub name: String,
    pub success: bool,
    pub output: String,
}

/// One immutable audit entry. Appended once per phase, never edited.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepRecord {
    pub step: u32,
    pub phase: StepPhase,
    pub prompt_summary: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCallRecord>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_results: Vec<ToolResultRecord>,
    pub duration_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl StepRecord {
    pub fn new(step: u32, phase: StepPhase, prompt: &str) -> Self {
        Self {
            step,
            phase,
            prompt_summary: truncate_chars(prompt, PROMPT_SUMMARY_CHARS),
            tool_calls: Vec::new(),
            tool_results: Vec::new(),
            duration_ms: 0,
            error: None,
            timestamp: Utc::now(),
        }
    }
}

/// Truncate to at most `max` characters (not bytes).
pub fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((cut, _)) => text[..cut].to_string(),
        None => text.to_string(),
    }
}

/// Run settings that are not part of a session's frozen definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunDefaults {
    pub empty_threshold: u32,
    pub knowledge_enabled: bool,
    pub max_observation_chars: usize,
}

impl Default for RunDefaults {
    fn default() -> Self {
        Self {
            empty_threshold: DEFAULT_EMPTY_THRESHOLD,
            knowledge_enabled: false,
            max_observation_chars: DEFAULT_MAX_OBSERVATION_CHARS,
        }
    }
}

impl RunDefaults {
    pub fn from_config(config: &AgentConfig) -> Self {
        Self {
            empty_threshold: config.empty_threshold,
            knowledge_enabled: config.knowledge_enabled,
            max_observation_chars: config.max_observation_chars,
        }
    }
}

/// Everything one run owns. Never shared between concurrent runs.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    pub conversation_id: String,
    pub trace_id: String,
    pub user_request: String,

    // Agent settings, fixed for the run
    pub system_prompt: String,
    pub next_step_prompt: Option<String>,
    pub tool_choice: ToolChoice,
    pub enabled_sources: Vec<String>,
    pub knowledge_enabled: bool,
    pub max_observation_chars: usize,

    // Loop bookkeeping
    pub step: u32,
    pub max_steps: u32,
    pub state: AgentState,
    pub last_content: Option<String>,

    // Termination policy state
    pub last_signature: Option<String>,
    pub empty_streak: u32,
    pub duplicate_streak: u32,
    pub empty_threshold: u32,
    pub duplicate_threshold: u32,

    pub termination_reason: Option<TerminationReason>,
    pub steps: Vec<StepRecord>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl ExecutionContext {
    /// A fresh context for `user_request`, configured from an agent definition.
    pub fn new(
        conversation_id: impl Into<String>,
        user_request: impl Into<String>,
        definition: &AgentDefinition,
    ) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            trace_id: Uuid::new_v4().to_string(),
            user_request: user_request.into(),
            system_prompt: definition.system_prompt.clone(),
            next_step_prompt: definition
                .next_step_prompt
                .clone()
                .filter(|p| !p.trim().is_empty()),
            tool_choice: definition.tool_choice,
            enabled_sources: definition.enabled_sources.clone(),
            knowledge_enabled: false,
            max_observation_chars: DEFAULT_MAX_OBSERVATION_CHARS,
            step: 0,
            max_steps: definition.max_steps,
            state: AgentState::Idle,
            last_content: None,
            last_signature: None,
            empty_streak: 0,
            duplicate_streak: 0,
            empty_threshold: DEFAULT_EMPTY_THRESHOLD,
            duplicate_threshold: definition.duplicate_threshold,
            termination_reason: None,
            steps: Vec::new(),
            started_at: Utc::now(),
            ended_at: None,
        }
    }

    pub fn with_defaults(self, defaults: RunDefaults) -> Self {
        self.with_empty_threshold(defaults.empty_threshold)
            .with_knowledge_enabled(defaults.knowledge_enabled)
            .with_max_observation_chars(defaults.max_observation_chars)
    }

    pub fn with_empty_threshold(mut self, threshold: u32) -> Self {
        self.empty_threshold = threshold;
        self
    }

    pub fn with_knowledge_enabled(mut self, enabled: bool) -> Self {
        self.knowledge_enabled = enabled;
        self
    }

    pub fn with_max_observation_chars(mut self, max: usize) -> Self {
        self.max_observation_chars = max;
        self
    }

    pub fn with_trace_id(mut self, trace_id: impl Into<String>) -> Self {
        self.trace_id = trace_id.into();
        self
    }

    /// Append an audit entry.
    pub fn record(&mut self, record: StepRecord) {
        self.steps.push(record);
    }

    pub fn think_steps(&self) -> usize {
        self.steps.iter().filter(|s| s.phase == StepPhase::Think).count()
    }

    pub fn act_steps(&self) -> usize {
        self.steps.iter().filter(|s| s.phase == StepPhase::Act).count()
    }
}

/// What a run hands back to its caller. Partial progress is always kept.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    pub conversation_id: String,
    pub trace_id: String,
    pub success: bool,
    pub answer: Option<String>,
    pub termination_reason: TerminationReason,
    pub final_state: AgentState,
    pub steps: Vec<StepRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
}

impl RunResult {
    pub fn step_count(&self) -> u32 {
        self.steps.iter().map(|s| s.step).max().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_takes_settings_from_definition() {
        let definition = AgentDefinition {
            max_steps: 3,
            duplicate_threshold: 4,
            next_step_prompt: Some("   ".into()),
            enabled_sources: vec!["github".into()],
            ..AgentDefinition::default()
        };
        let ctx = ExecutionContext::new("c1", "hello", &definition).with_empty_threshold(5);
        assert_eq!(ctx.max_steps, 3);
        assert_eq!(ctx.duplicate_threshold, 4);
        assert_eq!(ctx.empty_threshold, 5);
        assert_eq!(ctx.next_step_prompt, None);
        assert_eq!(ctx.enabled_sources, vec!["github"]);
        assert_eq!(ctx.state, AgentState::Idle);
        assert!(!ctx.trace_id.is_empty());
    }

    #[test]
    fn defaults_follow_agent_config() {
        let config = AgentConfig {
            empty_threshold: 4,
            knowledge_enabled: true,
            max_observation_chars: 100,
            ..AgentConfig::default()
        };
        let ctx = ExecutionContext::new("c1", "hi", &config.to_definition())
            .with_defaults(RunDefaults::from_config(&config));
        assert_eq!(ctx.empty_threshold, 4);
        assert!(ctx.knowledge_enabled);
        assert_eq!(ctx.max_observation_chars, 100);
    }

    #[test]
    fn prompt_summary_is_truncated_by_chars() {
        let long = "é".repeat(500);
        let record = StepRecord::new(1, StepPhase::Think, &long);
        assert_eq!(record.prompt_summary.chars().count(), PROMPT_SUMMARY_CHARS);
    }

    #[test]
    fn truncate_keeps_short_text() {
        assert_eq!(truncate_chars("short", 200), "short");
        assert_eq!(truncate_chars("abcdef", 3), "abc");
    }

    #[test]
    fn termination_reason_names() {
        assert_eq!(TerminationReason::EmptyResponse.to_string(), "EMPTY_RESPONSE");
        assert_eq!(
            serde_json::to_string(&TerminationReason::ToolTerminate).unwrap(),
            "\"TOOL_TERMINATE\""
        );
    }
}

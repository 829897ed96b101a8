//! Agent lifecycle state machine.
//!
//! A pure transition table over [`AgentState`] × [`AgentEvent`]. Events with
//! no entry for the current state are rejected and leave the state untouched.
//! `FINISHED` and `ERROR` have no outgoing transitions.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AgentState {
    Idle,
    Thinking,
    Acting,
    Finished,
    Error,
}

impl AgentState {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentState::Idle => "IDLE",
            AgentState::Thinking => "THINKING",
            AgentState::Acting => "ACTING",
            AgentState::Finished => "FINISHED",
            AgentState::Error => "ERROR",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, AgentState::Finished | AgentState::Error)
    }
}

impl std::fmt::Display for AgentState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AgentEvent {
    Start,
    ThinkDoneWithTools,
    ThinkDoneNoTools,
    ActDone,
    ToolTerminate,
    StopMaxSteps,
    StopEmpty,
    StopDuplicate,
    Fail,
}

impl AgentEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentEvent::Start => "START",
            AgentEvent::ThinkDoneWithTools => "THINK_DONE_WITH_TOOLS",
            AgentEvent::ThinkDoneNoTools => "THINK_DONE_NO_TOOLS",
            AgentEvent::ActDone => "ACT_DONE",
            AgentEvent::ToolTerminate => "TOOL_TERMINATE",
            AgentEvent::StopMaxSteps => "STOP_MAX_STEPS",
            AgentEvent::StopEmpty => "STOP_EMPTY",
            AgentEvent::StopDuplicate => "STOP_DUPLICATE",
            AgentEvent::Fail => "FAIL",
        }
    }

    /// The three policy stop events.
    pub fn is_stop(&self) -> bool {
        matches!(
            self,
            AgentEvent::StopMaxSteps | AgentEvent::StopEmpty | AgentEvent::StopDuplicate
        )
    }
}

impl std::fmt::Display for AgentEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The transition table. `None` means the event is not legal in `from`.
pub fn transition(from: AgentState, event: AgentEvent) -> Option<AgentState> {
    use AgentEvent as E;
    use AgentState as S;

    match (from, event) {
        (S::Idle, E::Start) => Some(S::Thinking),

        (S::Thinking, E::ThinkDoneWithTools) => Some(S::Acting),
        (S::Thinking, E::ThinkDoneNoTools) => Some(S::Finished),
        (S::Thinking, e) if e.is_stop() => Some(S::Finished),
        (S::Thinking, E::Fail) => Some(S::Error),

        (S::Acting, E::ActDone) => Some(S::Thinking),
        (S::Acting, E::ToolTerminate) => Some(S::Finished),
        (S::Acting, e) if e.is_stop() => Some(S::Finished),
        (S::Acting, E::Fail) => Some(S::Error),

        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Event {event} is not allowed in state {state}")]
pub struct TransitionRejected {
    pub state: AgentState,
    pub event: AgentEvent,
}

/// One accepted transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    pub from: AgentState,
    pub event: AgentEvent,
    pub to: AgentState,
}

/// A state machine instance owned by a single run.
#[derive(Debug, Clone)]
pub struct StateMachine {
    conversation_id: String,
    state: AgentState,
    history: Vec<Transition>,
}

impl StateMachine {
    pub fn new(conversation_id: impl Into<String>) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            state: AgentState::Idle,
            history: Vec::new(),
        }
    }

    pub fn state(&self) -> AgentState {
        self.state
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    pub fn conversation_id(&self) -> &str {
        &self.conversation_id
    }

    /// Accepted transitions, oldest first.
    pub fn history(&self) -> &[Transition] {
        &self.history
    }

    /// Apply `event`. On rejection the state is unchanged.
    pub fn send(&mut self, event: AgentEvent) -> Result<Transition, TransitionRejected> {
        let Some(to) = transition(self.state, event) else {
            warn!(
                conversation_id = %self.conversation_id,
                state = %self.state,
                event = %event,
                "Rejected state transition"
            );
            return Err(TransitionRejected {
                state: self.state,
                event,
            });
        };

        let step = Transition {
            from: self.state,
            event,
            to,
        };
        debug!(
            conversation_id = %self.conversation_id,
            from = %step.from,
            event = %event,
            to = %to,
            "State transition"
        );
        self.state = to;
        self.history.push(step);
        Ok(step)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_EVENTS: [AgentEvent; 9] = [
        AgentEvent::Start,
        AgentEvent::ThinkDoneWithTools,
        AgentEvent::ThinkDoneNoTools,
        AgentEvent::ActDone,
        AgentEvent::ToolTerminate,
        AgentEvent::StopMaxSteps,
        AgentEvent::StopEmpty,
        AgentEvent::StopDuplicate,
        AgentEvent::Fail,
    ];

    #[test]
    fn happy_path_through_tool_use() {
        let mut sm = StateMachine::new("c1");
        assert_eq!(sm.state(), AgentState::Idle);
        sm.send(AgentEvent::Start).unwrap();
        sm.send(AgentEvent::ThinkDoneWithTools).unwrap();
        assert_eq!(sm.state(), AgentState::Acting);
        sm.send(AgentEvent::ActDone).unwrap();
        sm.send(AgentEvent::ThinkDoneNoTools).unwrap();
        assert_eq!(sm.state(), AgentState::Finished);
        assert_eq!(sm.history().len(), 4);
    }

    #[test]
    fn think_done_with_tools_rejected_while_acting() {
        let mut sm = StateMachine::new("c1");
        sm.send(AgentEvent::Start).unwrap();
        sm.send(AgentEvent::ThinkDoneWithTools).unwrap();
        let err = sm.send(AgentEvent::ThinkDoneWithTools).unwrap_err();
        assert_eq!(err.state, AgentState::Acting);
        assert_eq!(sm.state(), AgentState::Acting);
    }

    #[test]
    fn terminal_states_reject_every_event() {
        for terminal in [AgentState::Finished, AgentState::Error] {
            for event in ALL_EVENTS {
                assert_eq!(transition(terminal, event), None, "{terminal} + {event}");
            }
        }
    }

    #[test]
    fn stop_events_finish_from_both_working_states() {
        for from in [AgentState::Thinking, AgentState::Acting] {
            for event in [
                AgentEvent::StopMaxSteps,
                AgentEvent::StopEmpty,
                AgentEvent::StopDuplicate,
            ] {
                assert_eq!(transition(from, event), Some(AgentState::Finished));
            }
            assert_eq!(transition(from, AgentEvent::Fail), Some(AgentState::Error));
        }
    }

    #[test]
    fn idle_accepts_only_start() {
        for event in ALL_EVENTS {
            let expected = (event == AgentEvent::Start).then_some(AgentState::Thinking);
            assert_eq!(transition(AgentState::Idle, event), expected);
        }
    }

    #[test]
    fn tool_terminate_only_from_acting() {
        assert_eq!(transition(AgentState::Thinking, AgentEvent::ToolTerminate), None);
        assert_eq!(
            transition(AgentState::Acting, AgentEvent::ToolTerminate),
            Some(AgentState::Finished)
        );
    }

    #[test]
    fn rejected_event_is_not_recorded() {
        let mut sm = StateMachine::new("c1");
        assert!(sm.send(AgentEvent::ActDone).is_err());
        assert!(sm.history().is_empty());
        assert_eq!(sm.state(), AgentState::Idle);
    }

    #[test]
    fn names_are_screaming_snake_case() {
        assert_eq!(AgentEvent::ThinkDoneWithTools.to_string(), "THINK_DONE_WITH_TOOLS");
        assert_eq!(
            serde_json::to_string(&AgentState::Finished).unwrap(),
            "\"FINISHED\""
        );
    }
}

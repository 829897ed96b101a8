//! The ReAct execution kernel.
//!
//! A run moves through **think → act → observe** until the model gives a
//! final answer or the termination policy stops it:
//!
//! 1. **Think**: render the visible tool catalog, call the LLM, decode the
//!    turn (native tool calls or the JSON step protocol)
//! 2. **Act**: invoke the decided tool through the registry
//! 3. **Observe**: append the result as a tool turn and loop back
//!
//! Every transition is checked against the [`StateMachine`] table, every
//! phase leaves a [`context::StepRecord`], and a run always returns a
//! [`RunResult`], including its partial progress when it fails.
//!
//! [`RefreshingAgent`] keeps remote tools current between iterations, and
//! [`SessionGate`] admits one turn per session version.

pub mod catalog;
pub mod context;
pub mod orchestrator;
pub mod protocol;
pub mod refresh;
pub mod session_gate;
pub mod state_machine;
pub mod termination;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use context::{ExecutionContext, RunDefaults, RunResult, TerminationReason};
pub use orchestrator::{HookOutcome, IterationHook, Kernel, Runner};
pub use protocol::{Action, Step};
pub use refresh::RefreshingAgent;
pub use session_gate::SessionGate;
pub use state_machine::{AgentEvent, AgentState, StateMachine};

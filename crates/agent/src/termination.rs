//! Termination policy: step budget plus empty and duplicate response streaks.
//!
//! All state lives on the [`ExecutionContext`], so the policy itself is a
//! set of functions over it.

use sha2::{Digest, Sha256};

use crate::context::{ExecutionContext, TerminationReason, ToolCallRecord};
use crate::state_machine::{AgentEvent, AgentState};

/// Signature of a response with neither content nor tool calls.
pub const EMPTY_SIGNATURE: &str = "EMPTY";

/// Evaluate the stop rules in priority order: max steps, empty streak,
/// duplicate streak. Returns the first matching stop event.
///
/// The step budget counts think phases, so it only fires when another
/// think is next; an act phase already decided is still carried out.
pub fn check_termination(ctx: &ExecutionContext) -> Option<AgentEvent> {
    if ctx.state != AgentState::Acting && ctx.step >= ctx.max_steps {
        return Some(AgentEvent::StopMaxSteps);
    }
    if ctx.empty_streak >= ctx.empty_threshold {
        return Some(AgentEvent::StopEmpty);
    }
    if ctx.duplicate_streak >= ctx.duplicate_threshold {
        return Some(AgentEvent::StopDuplicate);
    }
    None
}

/// The termination reason a stop event records.
pub fn reason_for(event: AgentEvent) -> Option<TerminationReason> {
    match event {
        AgentEvent::StopMaxSteps => Some(TerminationReason::MaxSteps),
        AgentEvent::StopEmpty => Some(TerminationReason::EmptyResponse),
        AgentEvent::StopDuplicate => Some(TerminationReason::DuplicateResponse),
        AgentEvent::ToolTerminate => Some(TerminationReason::ToolTerminate),
        AgentEvent::ThinkDoneNoTools => Some(TerminationReason::Completed),
        AgentEvent::Fail => Some(TerminationReason::Error),
        _ => None,
    }
}

/// Canonical signature of a response.
///
/// Tool calls become `name:arguments`, sorted and joined, then followed by
/// the trimmed content. The result is SHA-256 hex, or [`EMPTY_SIGNATURE`]
/// when there is nothing to sign.
pub fn signature(content: &str, tool_calls: &[ToolCallRecord]) -> String {
    let mut calls: Vec<String> = tool_calls
        .iter()
        .map(|call| format!("{}:{}", call.name, call.arguments))
        .collect();
    calls.sort();

    let canonical = format!("{}{}", calls.join("|"), content.trim());
    if canonical.is_empty() {
        return EMPTY_SIGNATURE.to_string();
    }
    hex::encode(Sha256::digest(canonical.as_bytes()))
}

/// Update both streaks from one think-phase response.
pub fn record_response(ctx: &mut ExecutionContext, content: &str, tool_calls: &[ToolCallRecord]) {
    let sig = signature(content, tool_calls);

    if ctx.last_signature.as_deref() == Some(sig.as_str()) {
        ctx.duplicate_streak += 1;
    } else {
        ctx.duplicate_streak = 0;
    }
    ctx.last_signature = Some(sig);

    if content.trim().is_empty() && tool_calls.is_empty() {
        ctx.empty_streak += 1;
    } else {
        ctx.empty_streak = 0;
    }
}

/// Clear both streaks and the remembered signature.
pub fn reset(ctx: &mut ExecutionContext) {
    ctx.empty_streak = 0;
    ctx.duplicate_streak = 0;
    ctx.last_signature = None;
}

//! The orchestration kernel: drives one run through think → act → observe.
//!
//! Each loop iteration first consults the termination policy, then runs
//! whichever phase the state machine is in:
//!
//! - **THINKING**: render the visible catalog, call the LLM, decode the turn
//!   (native tool calls, or the JSON protocol), update the streak counters.
//! - **ACTING**: invoke the decided tool calls, append observations, then
//!   give the [`IterationHook`] a chance to refresh tools or stop the run.
//!
//! Every phase appends a [`StepRecord`], including failed ones.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use chrono::Utc;
use loopwright_core::error::Error;
use loopwright_core::event::{DomainEvent, EventBus};
use loopwright_core::llm::{CompletionRequest, LlmClient, ToolChoice};
use loopwright_core::message::{Message, MessageToolCall};
use loopwright_core::tool::{ToolCall, ToolRegistry, ToolResult};
use loopwright_tools::terminate::{self, TerminateTool};
use loopwright_tools::{ToolExecutionService, ToolScope};
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::catalog;
use crate::context::{
    ExecutionContext, RunResult, StepPhase, StepRecord, TerminationReason, ToolCallRecord,
    ToolResultRecord, truncate_chars,
};
use crate::protocol::{self, Action};
use crate::state_machine::{AgentEvent, AgentState, StateMachine};
use crate::termination;

/// What an [`IterationHook`] asks the kernel to do after an act phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookOutcome {
    Continue,
    /// Append this text as a system turn, then continue.
    Notify(String),
    /// End the run with `TOOL_TERMINATE` and this answer.
    Terminate(String),
}

/// Called between iterations, after each act phase and before the next think.
#[async_trait]
pub trait IterationHook: Send {
    async fn after_act(&mut self, ctx: &ExecutionContext) -> HookOutcome;
}

/// Anything that can carry a context through to a [`RunResult`].
#[async_trait]
pub trait Runner: Send + Sync {
    async fn execute(&self, ctx: ExecutionContext) -> RunResult;
}

struct NoHook;

#[async_trait]
impl IterationHook for NoHook {
    async fn after_act(&mut self, _ctx: &ExecutionContext) -> HookOutcome {
        HookOutcome::Continue
    }
}

enum Decision {
    Act(Vec<ToolCall>),
    Finish(String),
}

enum ActOutcome {
    Continue,
    Terminate(String),
}

/// Shared, stateless across runs; every call to [`Kernel::execute`] owns its context.
pub struct Kernel {
    llm: Arc<dyn LlmClient>,
    registry: Arc<ToolRegistry>,
    executor: Arc<dyn ToolExecutionService>,
    event_bus: Arc<EventBus>,
}

impl Kernel {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        registry: Arc<ToolRegistry>,
        executor: Arc<dyn ToolExecutionService>,
    ) -> Self {
        Self {
            llm,
            registry,
            executor,
            event_bus: Arc::new(EventBus::default()),
        }
    }

    pub fn with_event_bus(mut self, event_bus: Arc<EventBus>) -> Self {
        self.event_bus = event_bus;
        self
    }

    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.event_bus
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    /// Run to completion.
    pub async fn execute(&self, ctx: ExecutionContext) -> RunResult {
        self.execute_with_hook(ctx, &mut NoHook).await
    }

    /// Run to completion, consulting `hook` after every act phase.
    pub async fn execute_with_hook(
        &self,
        mut ctx: ExecutionContext,
        hook: &mut dyn IterationHook,
    ) -> RunResult {
        let mut sm = StateMachine::new(ctx.conversation_id.clone());
        let mut history = vec![
            Message::system(ctx.system_prompt.clone()),
            Message::user(ctx.user_request.clone()),
        ];
        let mut pending: Vec<ToolCall> = Vec::new();
        let mut answer: Option<String> = None;
        let mut failure: Option<String> = None;

        info!(
            conversation_id = %ctx.conversation_id,
            trace_id = %ctx.trace_id,
            max_steps = ctx.max_steps,
            "Run started"
        );
        self.event_bus.publish(DomainEvent::RunStarted {
            conversation_id: ctx.conversation_id.clone(),
            trace_id: ctx.trace_id.clone(),
            timestamp: Utc::now(),
        });

        if let Err(e) = self.advance(&mut sm, &mut ctx, AgentEvent::Start) {
            failure = Some(e);
        }

        while !sm.is_terminal() && failure.is_none() {
            if let Some(stop) = termination::check_termination(&ctx) {
                info!(
                    conversation_id = %ctx.conversation_id,
                    step = ctx.step,
                    event = %stop,
                    "Termination policy stopped the run"
                );
                ctx.termination_reason = termination::reason_for(stop);
                if let Err(e) = self.advance(&mut sm, &mut ctx, stop) {
                    failure = Some(e);
                }
                break;
            }

            debug!(
                conversation_id = %ctx.conversation_id,
                step = ctx.step,
                state = %sm.state(),
                "Iteration"
            );

            let event = match sm.state() {
                AgentState::Thinking => match self.think(&mut ctx, &mut history).await {
                    Ok(Decision::Act(calls)) => {
                        pending = calls;
                        AgentEvent::ThinkDoneWithTools
                    }
                    Ok(Decision::Finish(text)) => {
                        answer = Some(text);
                        AgentEvent::ThinkDoneNoTools
                    }
                    Err(e) => {
                        error!(
                            conversation_id = %ctx.conversation_id,
                            step = ctx.step,
                            error = %e,
                            "Think phase failed"
                        );
                        failure = Some(e.to_string());
                        AgentEvent::Fail
                    }
                },
                AgentState::Acting => {
                    let calls = std::mem::take(&mut pending);
                    match self.act(&mut ctx, &mut history, calls, hook).await {
                        ActOutcome::Continue => AgentEvent::ActDone,
                        ActOutcome::Terminate(text) => {
                            answer = Some(text);
                            AgentEvent::ToolTerminate
                        }
                    }
                }
                AgentState::Idle | AgentState::Finished | AgentState::Error => break,
            };

            if let Some(reason) = termination::reason_for(event) {
                ctx.termination_reason = Some(reason);
            }
            if let Err(e) = self.advance(&mut sm, &mut ctx, event) {
                failure.get_or_insert(e);
            }
        }

        self.finalize(ctx, &sm, answer, failure)
    }

    /// Send an event; a rejected transition becomes a run failure.
    fn advance(
        &self,
        sm: &mut StateMachine,
        ctx: &mut ExecutionContext,
        event: AgentEvent,
    ) -> Result<(), String> {
        match sm.send(event) {
            Ok(step) => {
                ctx.state = step.to;
                self.event_bus.publish(DomainEvent::StateTransitioned {
                    conversation_id: ctx.conversation_id.clone(),
                    from: step.from.to_string(),
                    event: event.to_string(),
                    to: step.to.to_string(),
                    timestamp: Utc::now(),
                });
                Ok(())
            }
            Err(rejected) => {
                // Fall into ERROR so the loop cannot spin in place.
                if sm.send(AgentEvent::Fail).is_ok() {
                    ctx.state = sm.state();
                }
                ctx.termination_reason = Some(TerminationReason::Error);
                Err(rejected.to_string())
            }
        }
    }

    // ── Think ─────────────────────────────────────────────────────────────

    async fn think(
        &self,
        ctx: &mut ExecutionContext,
        history: &mut Vec<Message>,
    ) -> Result<Decision, Error> {
        ctx.step += 1;
        let started = Instant::now();

        let scope = ToolScope::new(&ctx.enabled_sources, ctx.knowledge_enabled);
        let visible = scope.visible(&self.registry);
        history[0] = Message::system(catalog::system_prompt(&ctx.system_prompt, &visible));

        let prompt = history.last().map(|m| m.content.as_str()).unwrap_or_default();
        let mut record = StepRecord::new(ctx.step, StepPhase::Think, prompt);

        let request = CompletionRequest {
            messages: history.clone(),
            tools: match ctx.tool_choice {
                ToolChoice::None => Vec::new(),
                _ => visible,
            },
            tool_choice: ctx.tool_choice,
        };

        let outcome = self.call_and_decode(ctx, history, request, &mut record).await;

        record.duration_ms = started.elapsed().as_millis() as u64;
        if let Err(e) = &outcome {
            record.error = Some(e.to_string());
        }
        ctx.record(record);
        outcome
    }

    async fn call_and_decode(
        &self,
        ctx: &mut ExecutionContext,
        history: &mut Vec<Message>,
        request: CompletionRequest,
        record: &mut StepRecord,
    ) -> Result<Decision, Error> {
        let response = self.llm.complete(request).await?;

        self.event_bus.publish(DomainEvent::ResponseGenerated {
            conversation_id: ctx.conversation_id.clone(),
            step: ctx.step,
            tokens_used: response.usage.as_ref().map(|u| u.total_tokens),
            timestamp: Utc::now(),
        });

        // Native tool calls bypass the JSON protocol.
        if !response.tool_calls.is_empty() {
            let calls: Vec<ToolCall> = response
                .tool_calls
                .iter()
                .map(|tc| ToolCall {
                    id: tc.id.clone(),
                    name: tc.name.clone(),
                    arguments: parse_arguments(&tc.arguments),
                })
                .collect();
            record.tool_calls = calls.iter().map(call_record).collect();
            termination::record_response(ctx, "", &record.tool_calls);
            ctx.last_content = Some(response.content.clone()).filter(|c| !c.trim().is_empty());
            history.push(Message::assistant(response.content).with_tool_calls(response.tool_calls));
            return Ok(Decision::Act(calls));
        }

        let step = match protocol::decode(&response.content) {
            Ok(step) => step,
            Err(e) => {
                history.push(Message::assistant(response.content));
                return Err(e.into());
            }
        };

        debug!(
            conversation_id = %ctx.conversation_id,
            step = ctx.step,
            action = step.action.type_name(),
            "Decoded step"
        );

        match step.action {
            Action::Tool { name, args } => {
                let call = ToolCall {
                    id: format!("call_{}_{}", ctx.step, name),
                    name,
                    arguments: Value::Object(args),
                };
                record.tool_calls = vec![call_record(&call)];
                termination::record_response(ctx, "", &record.tool_calls);
                ctx.last_content = Some(step.thought).filter(|t| !t.trim().is_empty());
                history.push(
                    Message::assistant(response.content).with_tool_calls(vec![MessageToolCall {
                        id: call.id.clone(),
                        name: call.name.clone(),
                        arguments: call.arguments.to_string(),
                    }]),
                );
                Ok(Decision::Act(vec![call]))
            }
            Action::Final { answer } => {
                termination::record_response(ctx, &answer, &[]);
                ctx.last_content = Some(answer.clone());
                history.push(Message::assistant(response.content));
                Ok(Decision::Finish(answer))
            }
            Action::None => {
                termination::record_response(ctx, "", &[]);
                ctx.last_content = Some(step.thought).filter(|t| !t.trim().is_empty());
                history.push(Message::assistant(response.content));
                Ok(Decision::Act(Vec::new()))
            }
        }
    }

    // ── Act ───────────────────────────────────────────────────────────────

    async fn act(
        &self,
        ctx: &mut ExecutionContext,
        history: &mut Vec<Message>,
        calls: Vec<ToolCall>,
        hook: &mut dyn IterationHook,
    ) -> ActOutcome {
        let started = Instant::now();
        let summary = calls
            .iter()
            .map(|c| format!("{}({})", c.name, c.arguments))
            .collect::<Vec<_>>()
            .join(", ");
        let mut record = StepRecord::new(ctx.step, StepPhase::Act, &summary);
        record.tool_calls = calls.iter().map(call_record).collect();

        let scope = ToolScope::new(&ctx.enabled_sources, ctx.knowledge_enabled);
        let mut terminate_answer: Option<String> = None;

        for call in &calls {
            let is_terminate = call.name == terminate::TOOL_NAME;
            let call_started = Instant::now();

            let result = if is_terminate || scope.allows(&call.name) {
                self.executor.invoke(&call.name, call.arguments.clone()).await
            } else {
                ToolResult::failed(format!("Tool not available: {}", call.name))
            };

            if !result.success {
                warn!(
                    conversation_id = %ctx.conversation_id,
                    step = ctx.step,
                    tool = %call.name,
                    "Tool call failed"
                );
            }
            self.event_bus.publish(DomainEvent::ToolExecuted {
                conversation_id: ctx.conversation_id.clone(),
                step: ctx.step,
                tool_name: call.name.clone(),
                success: result.success,
                duration_ms: call_started.elapsed().as_millis() as u64,
                timestamp: Utc::now(),
            });

            let observation = format_observation(&result, ctx.max_observation_chars);
            history.push(Message::tool_result(call.id.clone(), observation.clone()));
            record.tool_results.push(ToolResultRecord {
                name: call.name.clone(),
                success: result.success,
                output: observation,
            });

            if is_terminate && result.success {
                terminate_answer =
                    Some(TerminateTool::answer_from(&call.arguments).unwrap_or(result.output));
                break;
            }
        }

        record.duration_ms = started.elapsed().as_millis() as u64;
        ctx.record(record);

        if let Some(answer) = terminate_answer {
            return ActOutcome::Terminate(answer);
        }

        if let Some(prompt) = &ctx.next_step_prompt {
            history.push(Message::user(prompt.clone()));
        }

        match hook.after_act(ctx).await {
            HookOutcome::Continue => ActOutcome::Continue,
            HookOutcome::Notify(text) => {
                history.push(Message::system(text));
                ActOutcome::Continue
            }
            HookOutcome::Terminate(answer) => ActOutcome::Terminate(answer),
        }
    }

    // ── Finish ────────────────────────────────────────────────────────────

    fn finalize(
        &self,
        mut ctx: ExecutionContext,
        sm: &StateMachine,
        answer: Option<String>,
        failure: Option<String>,
    ) -> RunResult {
        let ended_at = Utc::now();
        ctx.ended_at = Some(ended_at);

        let final_state = sm.state();
        let termination_reason = match (&failure, final_state) {
            (Some(_), _) | (None, AgentState::Error) => TerminationReason::Error,
            (None, _) => ctx.termination_reason.unwrap_or(TerminationReason::Completed),
        };
        let success = failure.is_none() && final_state == AgentState::Finished;
        let answer = if success {
            answer.or_else(|| ctx.last_content.clone())
        } else {
            None
        };

        info!(
            conversation_id = %ctx.conversation_id,
            trace_id = %ctx.trace_id,
            steps = ctx.step,
            reason = %termination_reason,
            success,
            "Run finished"
        );
        self.event_bus.publish(DomainEvent::RunFinished {
            conversation_id: ctx.conversation_id.clone(),
            success,
            termination_reason: termination_reason.to_string(),
            steps: ctx.step,
            timestamp: ended_at,
        });

        RunResult {
            conversation_id: ctx.conversation_id,
            trace_id: ctx.trace_id,
            success,
            answer,
            termination_reason,
            final_state,
            steps: ctx.steps,
            error: failure,
            started_at: ctx.started_at,
            ended_at,
        }
    }
}

#[async_trait]
impl Runner for Kernel {
    async fn execute(&self, ctx: ExecutionContext) -> RunResult {
        Kernel::execute(self, ctx).await
    }
}

fn call_record(call: &ToolCall) -> ToolCallRecord {
    ToolCallRecord {
        name: call.name.clone(),
        arguments: call.arguments.clone(),
    }
}

/// Native tool-call arguments arrive as a JSON string.
fn parse_arguments(raw: &str) -> Value {
    if raw.trim().is_empty() {
        return Value::Object(Default::default());
    }
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

/// Render a tool result as the observation the model sees next.
pub fn format_observation(result: &ToolResult, max_chars: usize) -> String {
    let text = if result.success {
        result.output.clone()
    } else {
        format!("Error: {}", result.output)
    };
    if max_chars == 0 {
        return text;
    }
    let total = text.chars().count();
    if total <= max_chars {
        return text;
    }
    format!(
        "{}\n...[truncated {} characters]",
        truncate_chars(&text, max_chars),
        total - max_chars
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{
        ScriptedLlm, final_turn, kernel_with, native_call, none_turn, tool_turn,
    };
    use loopwright_core::CompletionResponse;
    use loopwright_core::error::ProviderError;
    use loopwright_core::message::Role;
    use loopwright_core::session::AgentDefinition;
    use serde_json::json;

    fn ctx(max_steps: u32) -> ExecutionContext {
        let definition = AgentDefinition {
            max_steps,
            ..AgentDefinition::default()
        };
        ExecutionContext::new("conv-1", "say hi", &definition)
    }

    #[tokio::test]
    async fn echo_then_final_records_two_thinks_and_one_act() {
        let llm = Arc::new(ScriptedLlm::new(vec![
            tool_turn("echo", json!({"message": "hi"})),
            final_turn("done"),
        ]));
        let kernel = kernel_with(llm.clone());

        let result = kernel.execute(ctx(5)).await;

        assert!(result.success);
        assert_eq!(result.answer.as_deref(), Some("done"));
        assert_eq!(result.termination_reason, TerminationReason::Completed);
        assert_eq!(result.final_state, AgentState::Finished);
        let thinks = result.steps.iter().filter(|s| s.phase == StepPhase::Think).count();
        let acts = result.steps.iter().filter(|s| s.phase == StepPhase::Act).count();
        assert_eq!((thinks, acts), (2, 1));

        let act = &result.steps[1];
        assert_eq!(act.tool_results[0].output, "Echo: hi");
        assert!(act.tool_results[0].success);

        // The second think sees the observation as a tool turn.
        let second = &llm.requests()[1];
        let observation = second.messages.iter().find(|m| m.role == Role::Tool).unwrap();
        assert_eq!(observation.content, "Echo: hi");
    }

    #[tokio::test]
    async fn repeated_none_stops_on_empty_streak() {
        let llm = Arc::new(ScriptedLlm::repeating(none_turn("x")));
        let kernel = kernel_with(llm.clone());

        let result = kernel.execute(ctx(3)).await;

        assert_eq!(result.termination_reason, TerminationReason::EmptyResponse);
        assert_eq!(result.final_state, AgentState::Finished);
        assert_eq!(result.step_count(), 2);
        assert_eq!(llm.requests().len(), 2);
    }

    #[tokio::test]
    async fn max_steps_bounds_the_run() {
        let llm = Arc::new(ScriptedLlm::new(vec![
            tool_turn("echo", json!({"message": "1"})),
            tool_turn("echo", json!({"message": "2"})),
            tool_turn("echo", json!({"message": "3"})),
        ]));
        let kernel = kernel_with(llm.clone());

        let result = kernel.execute(ctx(3)).await;

        assert_eq!(result.termination_reason, TerminationReason::MaxSteps);
        assert_eq!(result.final_state, AgentState::Finished);
        assert!(result.step_count() <= 3);
        assert_eq!(llm.requests().len(), 3);
        // The last decided tool call still ran.
        assert_eq!(result.steps.last().unwrap().phase, StepPhase::Act);
    }

    #[tokio::test]
    async fn identical_tool_calls_stop_as_duplicates() {
        let llm = Arc::new(ScriptedLlm::repeating(tool_turn("echo", json!({"message": "again"}))));
        let kernel = kernel_with(llm);

        let result = kernel.execute(ctx(10)).await;

        assert_eq!(result.termination_reason, TerminationReason::DuplicateResponse);
        // Threshold 2: the third identical response trips the check.
        assert_eq!(result.step_count(), 3);
    }

    #[tokio::test]
    async fn protocol_violation_fails_the_run_but_keeps_the_trail() {
        let llm = Arc::new(ScriptedLlm::new(vec![
            tool_turn("echo", json!({"message": "hi"})),
            CompletionResponse::text("I refuse to use JSON"),
        ]));
        let kernel = kernel_with(llm);

        let result = kernel.execute(ctx(5)).await;

        assert!(!result.success);
        assert_eq!(result.termination_reason, TerminationReason::Error);
        assert_eq!(result.final_state, AgentState::Error);
        assert!(result.error.as_deref().unwrap().contains("no balanced JSON object"));
        assert_eq!(result.steps.len(), 3);
        assert!(result.steps[2].error.is_some());
        assert_eq!(result.answer, None);
    }

    #[tokio::test]
    async fn llm_error_fails_the_run() {
        let llm = Arc::new(ScriptedLlm::from_results(vec![Err(ProviderError::Timeout(
            "slow".into(),
        ))]));
        let result = kernel_with(llm).execute(ctx(5)).await;
        assert_eq!(result.termination_reason, TerminationReason::Error);
        assert!(result.error.unwrap().contains("slow"));
        assert_eq!(result.steps.len(), 1);
    }

    #[tokio::test]
    async fn unknown_tool_is_observed_not_fatal() {
        let llm = Arc::new(ScriptedLlm::new(vec![
            tool_turn("does_not_exist", json!({})),
            final_turn("recovered"),
        ]));
        let result = kernel_with(llm.clone()).execute(ctx(5)).await;

        assert!(result.success);
        assert_eq!(result.answer.as_deref(), Some("recovered"));
        let failed = &result.steps[1].tool_results[0];
        assert!(!failed.success);
        assert!(failed.output.starts_with("Error: "));
    }

    #[tokio::test]
    async fn native_terminate_call_ends_with_tool_terminate() {
        let llm = Arc::new(ScriptedLlm::new(vec![native_call(
            "terminate",
            json!({"answer": "all done"}),
        )]));
        let result = kernel_with(llm).execute(ctx(5)).await;

        assert!(result.success);
        assert_eq!(result.termination_reason, TerminationReason::ToolTerminate);
        assert_eq!(result.answer.as_deref(), Some("all done"));
    }

    #[tokio::test]
    async fn hidden_tools_are_refused_in_act_phase() {
        let llm = Arc::new(ScriptedLlm::new(vec![
            tool_turn("knowledge_base_query", json!({"query": "react"})),
            final_turn("ok"),
        ]));
        let result = kernel_with(llm).execute(ctx(5)).await;
        let observed = &result.steps[1].tool_results[0];
        assert!(!observed.success);
        assert!(observed.output.contains("Tool not available"));
    }

    #[tokio::test]
    async fn next_step_prompt_follows_each_act() {
        let llm = Arc::new(ScriptedLlm::new(vec![
            tool_turn("echo", json!({"message": "hi"})),
            final_turn("done"),
        ]));
        let definition = AgentDefinition {
            next_step_prompt: Some("Decide the next step.".into()),
            ..AgentDefinition::default()
        };
        let ctx = ExecutionContext::new("c", "go", &definition);
        kernel_with(llm.clone()).execute(ctx).await;

        let last = llm.requests()[1].messages.last().cloned().unwrap();
        assert_eq!(last.role, Role::User);
        assert_eq!(last.content, "Decide the next step.");
    }

    #[tokio::test]
    async fn tool_choice_none_sends_no_native_definitions() {
        let llm = Arc::new(ScriptedLlm::new(vec![final_turn("ok")]));
        let definition = AgentDefinition {
            tool_choice: ToolChoice::None,
            ..AgentDefinition::default()
        };
        kernel_with(llm.clone())
            .execute(ExecutionContext::new("c", "go", &definition))
            .await;

        let request = &llm.requests()[0];
        assert!(request.tools.is_empty());
        assert!(request.messages[0].content.contains("### echo"));
    }

    #[tokio::test]
    async fn catalog_hides_terminate_and_knowledge_by_default() {
        let llm = Arc::new(ScriptedLlm::new(vec![final_turn("ok")]));
        kernel_with(llm.clone()).execute(ctx(5)).await;
        let names: Vec<String> = llm.requests()[0].tools.iter().map(|t| t.name.clone()).collect();
        assert_eq!(names, vec!["current_time", "echo"]);
    }

    #[tokio::test]
    async fn events_trace_the_state_machine() {
        let llm = Arc::new(ScriptedLlm::new(vec![final_turn("ok")]));
        let kernel = kernel_with(llm);
        let mut rx = kernel.event_bus().subscribe();
        kernel.execute(ctx(5)).await;

        let mut transitions = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let DomainEvent::StateTransitioned { event, .. } = event.as_ref() {
                transitions.push(event.clone());
            }
        }
        assert_eq!(transitions, vec!["START", "THINK_DONE_NO_TOOLS"]);
    }

    #[test]
    fn observation_formatting() {
        assert_eq!(format_observation(&ToolResult::ok("fine"), 100), "fine");
        assert_eq!(format_observation(&ToolResult::failed("boom"), 100), "Error: boom");
        let long = format_observation(&ToolResult::ok("x".repeat(30)), 10);
        assert!(long.starts_with("xxxxxxxxxx\n...[truncated 20 characters]"));
    }

    #[test]
    fn native_arguments_are_parsed_leniently() {
        assert_eq!(parse_arguments(""), json!({}));
        assert_eq!(parse_arguments(r#"{"a":1}"#), json!({"a": 1}));
        assert_eq!(parse_arguments("not json"), json!("not json"));
    }
}

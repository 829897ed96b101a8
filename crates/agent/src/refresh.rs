//! Agent wrapper that keeps remote tools fresh during a run.
//!
//! Every `refresh_interval_steps` steps (after the act phase) the remote
//! sources are re-synchronized and the visible tool names diffed against
//! the previous set. A change is announced to the model with a
//! notification turn. If every enabled source that was live when the run
//! began has gone away, the run is stopped with a fixed answer.

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use loopwright_core::event::{DomainEvent, EventBus};
use loopwright_core::tool::ToolRegistry;
use loopwright_mcp::RemoteSourceManager;
use loopwright_tools::ToolScope;
use tracing::{info, warn};

use crate::catalog;
use crate::context::{ExecutionContext, RunResult};
use crate::orchestrator::{HookOutcome, IterationHook, Kernel, Runner};

/// Final answer when every enabled tool source has disconnected.
pub const ALL_SOURCES_LOST_ANSWER: &str =
    "All tool sources became unavailable; stopping the run.";

pub struct RefreshingAgent {
    kernel: Arc<Kernel>,
    sources: Arc<RemoteSourceManager>,
    refresh_interval_steps: u32,
}

impl RefreshingAgent {
    /// `refresh_interval_steps == 0` disables periodic refresh; the
    /// source-loss check still runs after every act phase.
    pub fn new(
        kernel: Arc<Kernel>,
        sources: Arc<RemoteSourceManager>,
        refresh_interval_steps: u32,
    ) -> Self {
        Self {
            kernel,
            sources,
            refresh_interval_steps,
        }
    }

    pub fn kernel(&self) -> &Arc<Kernel> {
        &self.kernel
    }

    pub fn sources(&self) -> &Arc<RemoteSourceManager> {
        &self.sources
    }

    pub async fn execute(&self, ctx: ExecutionContext) -> RunResult {
        let mut hook = RefreshHook::new(self, &ctx);
        self.kernel.execute_with_hook(ctx, &mut hook).await
    }
}

#[async_trait]
impl Runner for RefreshingAgent {
    async fn execute(&self, ctx: ExecutionContext) -> RunResult {
        RefreshingAgent::execute(self, ctx).await
    }
}

struct RefreshHook {
    sources: Arc<RemoteSourceManager>,
    registry: Arc<ToolRegistry>,
    event_bus: Arc<EventBus>,
    interval: u32,
    scope: ToolScope,
    known: BTreeSet<String>,
    watched: Vec<String>,
    last_refresh_step: u32,
}

impl RefreshHook {
    fn new(agent: &RefreshingAgent, ctx: &ExecutionContext) -> Self {
        let scope = ToolScope::new(&ctx.enabled_sources, ctx.knowledge_enabled);
        let registry = agent.kernel.registry().clone();
        let known = visible_names(&scope, &registry);
        let watched = agent
            .sources
            .connected_sources()
            .into_iter()
            .filter(|id| scope.source_enabled(id))
            .collect();
        Self {
            sources: agent.sources.clone(),
            registry,
            event_bus: agent.kernel.event_bus().clone(),
            interval: agent.refresh_interval_steps,
            scope,
            known,
            watched,
            last_refresh_step: 0,
        }
    }

    fn refresh_due(&self, step: u32) -> bool {
        self.interval > 0 && step > 0 && step % self.interval == 0 && step != self.last_refresh_step
    }

    async fn refresh(&mut self, ctx: &ExecutionContext) -> Option<String> {
        self.last_refresh_step = ctx.step;

        for (source, outcome) in self.sources.synchronize_all().await {
            if let Err(e) = outcome {
                warn!(
                    conversation_id = %ctx.conversation_id,
                    source = %source,
                    error = %e,
                    "Tool source refresh failed"
                );
            }
        }

        let current = visible_names(&self.scope, &self.registry);
        let added: Vec<String> = current.difference(&self.known).cloned().collect();
        let removed: Vec<String> = self.known.difference(&current).cloned().collect();
        self.known = current;

        let notice = catalog::toolset_notice(&added, &removed)?;
        info!(
            conversation_id = %ctx.conversation_id,
            step = ctx.step,
            added = added.len(),
            removed = removed.len(),
            "Tool set changed"
        );
        self.event_bus.publish(DomainEvent::ToolsetChanged {
            conversation_id: ctx.conversation_id.clone(),
            added,
            removed,
            timestamp: Utc::now(),
        });
        Some(notice)
    }

    fn all_sources_lost(&self) -> bool {
        !self.watched.is_empty() && self.watched.iter().all(|id| !self.sources.is_connected(id))
    }
}

#[async_trait]
impl IterationHook for RefreshHook {
    async fn after_act(&mut self, ctx: &ExecutionContext) -> HookOutcome {
        let notice = if self.refresh_due(ctx.step) {
            self.refresh(ctx).await
        } else {
            None
        };

        if self.all_sources_lost() {
            warn!(
                conversation_id = %ctx.conversation_id,
                step = ctx.step,
                sources = ?self.watched,
                "All enabled tool sources are disconnected"
            );
            return HookOutcome::Terminate(ALL_SOURCES_LOST_ANSWER.to_string());
        }

        match notice {
            Some(text) => HookOutcome::Notify(text),
            None => HookOutcome::Continue,
        }
    }
}

fn visible_names(scope: &ToolScope, registry: &ToolRegistry) -> BTreeSet<String> {
    scope.visible(registry).into_iter().map(|d| d.name).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::TerminationReason;
    use crate::test_helpers::{ScriptedLlm, final_turn, kernel_over, tool_turn};
    use loopwright_core::message::Role;
    use loopwright_core::session::AgentDefinition;
    use loopwright_mcp::testing::FakeSource;
    use loopwright_mcp::types::RemoteToolInfo;
    use serde_json::json;

    async fn setup(
        fake: &FakeSource,
        llm: Arc<ScriptedLlm>,
        interval: u32,
    ) -> (RefreshingAgent, Arc<RemoteSourceManager>) {
        let registry = Arc::new(loopwright_tools::default_registry());
        let sources = Arc::new(RemoteSourceManager::new(registry.clone()));
        sources
            .attach("gh", Arc::new(fake.connect("gh")))
            .await
            .unwrap();
        let kernel = Arc::new(kernel_over(llm, registry));
        (RefreshingAgent::new(kernel, sources.clone(), interval), sources)
    }

    fn ctx() -> ExecutionContext {
        ExecutionContext::new("conv-r", "find issues", &AgentDefinition::default())
    }

    #[tokio::test]
    async fn refresh_announces_new_tools() {
        let fake = FakeSource::new(vec![RemoteToolInfo::new("search")]);
        let llm = Arc::new(ScriptedLlm::new(vec![
            tool_turn("gh__search", json!({"q": "bug"})),
            final_turn("done"),
        ]));
        let (agent, _) = setup(&fake, llm.clone(), 1).await;
        fake.set_tools(vec![RemoteToolInfo::new("search"), RemoteToolInfo::new("issues")]);

        let mut rx = agent.kernel().event_bus().subscribe();
        let result = agent.execute(ctx()).await;
        assert!(result.success);

        let second = &llm.requests()[1];
        let notice = second
            .messages
            .iter()
            .find(|m| m.role == Role::System && m.content.contains("has changed"))
            .unwrap();
        assert!(notice.content.contains("New tools: gh__issues."));
        assert!(second.tools.iter().any(|t| t.name == "gh__issues"));

        let mut changed = false;
        while let Ok(event) = rx.try_recv() {
            if let DomainEvent::ToolsetChanged { added, .. } = event.as_ref() {
                assert_eq!(added, &vec!["gh__issues".to_string()]);
                changed = true;
            }
        }
        assert!(changed);
    }

    #[tokio::test]
    async fn unchanged_toolset_injects_nothing() {
        let fake = FakeSource::new(vec![RemoteToolInfo::new("search")]);
        let llm = Arc::new(ScriptedLlm::new(vec![
            tool_turn("gh__search", json!({})),
            final_turn("done"),
        ]));
        let (agent, _) = setup(&fake, llm.clone(), 1).await;
        agent.execute(ctx()).await;

        assert_eq!(fake.list_calls(), 2);
        let second = &llm.requests()[1];
        assert_eq!(
            second.messages.iter().filter(|m| m.role == Role::System).count(),
            1
        );
    }

    #[tokio::test]
    async fn zero_interval_never_refreshes() {
        let fake = FakeSource::new(vec![RemoteToolInfo::new("search")]);
        let llm = Arc::new(ScriptedLlm::new(vec![
            tool_turn("gh__search", json!({})),
            final_turn("done"),
        ]));
        let (agent, _) = setup(&fake, llm, 0).await;
        agent.execute(ctx()).await;
        assert_eq!(fake.list_calls(), 1);
    }

    #[tokio::test]
    async fn refresh_waits_for_the_interval() {
        let fake = FakeSource::new(vec![RemoteToolInfo::new("search")]);
        let llm = Arc::new(ScriptedLlm::new(vec![
            tool_turn("gh__search", json!({"q": "one"})),
            tool_turn("gh__search", json!({"q": "two"})),
            final_turn("done"),
        ]));
        let (agent, _) = setup(&fake, llm.clone(), 2).await;
        fake.set_tools(vec![RemoteToolInfo::new("search"), RemoteToolInfo::new("issues")]);

        let result = agent.execute(ctx()).await;
        assert!(result.success);
        assert_eq!(fake.list_calls(), 2);

        let requests = llm.requests();
        let offers_issues = |i: usize| requests[i].tools.iter().any(|t| t.name == "gh__issues");
        assert!(!offers_issues(0));
        assert!(!offers_issues(1));
        assert!(offers_issues(2));
    }

    #[tokio::test]
    async fn losing_every_source_terminates_the_run() {
        let fake = FakeSource::new(vec![RemoteToolInfo::new("search")]);
        let llm = Arc::new(ScriptedLlm::new(vec![tool_turn("gh__search", json!({}))]));
        let (agent, sources) = setup(&fake, llm, 1).await;
        fake.shut_down();

        let result = agent.execute(ctx()).await;

        assert!(!sources.is_connected("gh"));
        assert!(result.success);
        assert_eq!(result.termination_reason, TerminationReason::ToolTerminate);
        assert_eq!(result.answer.as_deref(), Some(ALL_SOURCES_LOST_ANSWER));
    }

    #[tokio::test]
    async fn sources_outside_the_enabled_list_are_not_watched() {
        let fake = FakeSource::new(vec![RemoteToolInfo::new("search")]);
        let llm = Arc::new(ScriptedLlm::new(vec![
            tool_turn("echo", json!({"message": "hi"})),
            final_turn("done"),
        ]));
        let (agent, _) = setup(&fake, llm, 1).await;
        fake.shut_down();

        let definition = AgentDefinition {
            enabled_sources: vec!["jira".into()],
            ..AgentDefinition::default()
        };
        let result = agent
            .execute(ExecutionContext::new("conv-r", "hi", &definition))
            .await;
        assert_eq!(result.termination_reason, TerminationReason::Completed);
        assert_eq!(result.answer.as_deref(), Some("done"));
    }
}

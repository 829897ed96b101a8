//! `loopwright run`: one agent run against the configured model and tool sources.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, bail};
use loopwright_agent::{
    ExecutionContext, Kernel, RefreshingAgent, RunDefaults, RunResult, SessionGate,
};
use loopwright_config::AppConfig;
use loopwright_core::llm::LlmClient;
use loopwright_mcp::RemoteSourceManager;
use loopwright_providers::OpenAiCompatClient;
use loopwright_tools::RegistryExecutor;
use tracing::debug;

pub struct RunOptions {
    pub message: String,
    pub session: Option<String>,
    pub expect_version: Option<i64>,
    pub json: bool,
}

pub async fn run(config_path: Option<&Path>, options: RunOptions) -> anyhow::Result<()> {
    let config = super::load_config(config_path)?;

    if !config.has_api_key() {
        eprintln!();
        eprintln!("  ERROR: No API key configured!");
        eprintln!();
        eprintln!("  Set LOOPWRIGHT_API_KEY (or OPENAI_API_KEY), or add api_key to:");
        eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
        eprintln!();
        bail!("No API key found. See above for setup instructions.");
    }

    debug!(model = %config.model, session = ?options.session, "Starting run");
    let llm = OpenAiCompatClient::from_config(&config)?;
    preflight(&llm).await?;
    let registry = Arc::new(loopwright_tools::default_registry());
    let sources = Arc::new(RemoteSourceManager::new(registry.clone()));
    for (id, outcome) in sources.connect_all(config.enabled_sources()).await {
        match outcome {
            Ok(report) => eprintln!("  Source {id}: {} tools", report.tools.len()),
            Err(e) => eprintln!("  Source {id}: unavailable ({e})"),
        }
    }

    let executor = Arc::new(RegistryExecutor::new(registry.clone()));
    let kernel = Arc::new(Kernel::new(Arc::new(llm), registry, executor));
    let agent = Arc::new(RefreshingAgent::new(
        kernel,
        sources.clone(),
        config.agent.refresh_interval_steps,
    ));
    let defaults = RunDefaults::from_config(&config.agent);

    let outcome = match &options.session {
        Some(conversation_id) => {
            run_in_session(&config, agent, defaults, conversation_id, &options).await
        }
        None => {
            let ctx = ExecutionContext::new("oneshot", &options.message, &config.agent.to_definition())
                .with_defaults(defaults);
            Ok(agent.execute(ctx).await)
        }
    };
    sources.shutdown().await;

    report(&outcome?, options.json)
}

/// Fail before connecting anything if the model endpoint is unreachable.
async fn preflight(llm: &dyn LlmClient) -> anyhow::Result<()> {
    match llm.health_check().await {
        Ok(true) => {
            debug!(client = llm.name(), "Model endpoint reachable");
            Ok(())
        }
        Ok(false) => bail!("Model endpoint for {} rejected the health check", llm.name()),
        Err(e) => Err(anyhow::Error::new(e).context(format!("Cannot reach {}", llm.name()))),
    }
}

async fn run_in_session(
    config: &AppConfig,
    agent: Arc<RefreshingAgent>,
    defaults: RunDefaults,
    conversation_id: &str,
    options: &RunOptions,
) -> anyhow::Result<RunResult> {
    let store = loopwright_store::open_store(&config.store)
        .await
        .context("Failed to open session store")?;
    let gate = SessionGate::new(store, agent).with_defaults(defaults);

    if gate.store().get_session(conversation_id).await?.is_none() {
        gate.create_session(conversation_id, config.agent.to_definition())
            .await?;
        eprintln!("  Created session {conversation_id}");
    }

    let result = match options.expect_version {
        Some(version) => gate.run_turn(conversation_id, version, &options.message).await?,
        None => gate.run_latest(conversation_id, &options.message).await?,
    };
    Ok(result)
}

fn report(result: &RunResult, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(result)?);
    } else {
        match &result.answer {
            Some(answer) => println!("{answer}"),
            None => println!("(no answer)"),
        }
        eprintln!(
            "  [{}] {} step(s), final state {}",
            result.termination_reason,
            result.step_count(),
            result.final_state
        );
    }

    if !result.success {
        bail!(
            "Run ended with {}: {}",
            result.termination_reason,
            result.error.as_deref().unwrap_or("no answer")
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use loopwright_core::error::ProviderError;
    use loopwright_core::llm::{CompletionRequest, CompletionResponse};

    struct Endpoint(Result<bool, ProviderError>);

    #[async_trait::async_trait]
    impl LlmClient for Endpoint {
        fn name(&self) -> &str {
            "endpoint"
        }

        async fn complete(&self, _request: CompletionRequest) -> Result<CompletionResponse, ProviderError> {
            Ok(CompletionResponse::text(""))
        }

        async fn health_check(&self) -> Result<bool, ProviderError> {
            self.0.clone()
        }
    }

    #[tokio::test]
    async fn preflight_passes_reachable_endpoint() {
        assert!(preflight(&Endpoint(Ok(true))).await.is_ok());
    }

    #[tokio::test]
    async fn preflight_stops_on_unhealthy_endpoint() {
        let err = preflight(&Endpoint(Ok(false))).await.unwrap_err();
        assert!(err.to_string().contains("rejected the health check"));

        let err = preflight(&Endpoint(Err(ProviderError::Network("refused".into()))))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Cannot reach endpoint"));
    }
}

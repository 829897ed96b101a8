//! Shared test helpers: a scripted LLM client and protocol turn builders.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use loopwright_core::error::ProviderError;
use loopwright_core::llm::{CompletionRequest, CompletionResponse, LlmClient, Usage};
use loopwright_core::message::MessageToolCall;
use loopwright_core::tool::ToolRegistry;
use loopwright_tools::RegistryExecutor;

use crate::orchestrator::Kernel;

/// An LLM client that replays scripted responses and records every request.
///
/// Panics when called more times than it has responses, unless built with
/// [`ScriptedLlm::repeating`].
pub struct ScriptedLlm {
    responses: Mutex<VecDeque<Result<CompletionResponse, ProviderError>>>,
    repeat: Option<CompletionResponse>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedLlm {
    pub fn new(responses: Vec<CompletionResponse>) -> Self {
        Self::from_results(responses.into_iter().map(Ok).collect())
    }

    pub fn from_results(responses: Vec<Result<CompletionResponse, ProviderError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            repeat: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Answer every call with the same response.
    pub fn repeating(response: CompletionResponse) -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            repeat: Some(response),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl LlmClient for ScriptedLlm {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, ProviderError> {
        let call = {
            let mut requests = self.requests.lock().unwrap();
            requests.push(request);
            requests.len()
        };
        if let Some(next) = self.responses.lock().unwrap().pop_front() {
            return next;
        }
        match &self.repeat {
            Some(response) => Ok(response.clone()),
            None => panic!("ScriptedLlm: no response scripted for call #{call}"),
        }
    }
}

fn with_usage(mut response: CompletionResponse) -> CompletionResponse {
    response.usage = Some(Usage {
        prompt_tokens: 10,
        completion_tokens: 5,
        total_tokens: 15,
    });
    response.model = "scripted-model".into();
    response
}

/// A protocol turn calling `name` with `args`.
pub fn tool_turn(name: &str, args: serde_json::Value) -> CompletionResponse {
    with_usage(CompletionResponse::text(
        serde_json::json!({
            "thought": format!("I should call {name}"),
            "action": { "type": "tool", "name": name, "args": args }
        })
        .to_string(),
    ))
}

/// A protocol turn ending the run.
pub fn final_turn(answer: &str) -> CompletionResponse {
    with_usage(CompletionResponse::text(
        serde_json::json!({
            "thought": "I can answer now",
            "action": { "type": "final", "answer": answer }
        })
        .to_string(),
    ))
}

/// A protocol turn doing nothing.
pub fn none_turn(thought: &str) -> CompletionResponse {
    with_usage(CompletionResponse::text(
        serde_json::json!({ "thought": thought, "action": { "type": "none" } }).to_string(),
    ))
}

/// A native tool-calling turn.
pub fn native_call(name: &str, args: serde_json::Value) -> CompletionResponse {
    let mut response = with_usage(CompletionResponse::text(""));
    response.tool_calls = vec![MessageToolCall {
        id: format!("call_{name}"),
        name: name.to_string(),
        arguments: args.to_string(),
    }];
    response
}

/// A kernel over the built-in tools.
pub fn kernel_with(llm: Arc<ScriptedLlm>) -> Kernel {
    kernel_over(llm, Arc::new(loopwright_tools::default_registry()))
}

pub fn kernel_over(llm: Arc<ScriptedLlm>, registry: Arc<ToolRegistry>) -> Kernel {
    let executor = Arc::new(RegistryExecutor::new(registry.clone()));
    Kernel::new(llm, registry, executor)
}

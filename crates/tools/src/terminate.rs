//! Terminate tool: lets a natively tool-calling model end the run.
//!
//! Never shown in the filtered catalog; the JSON protocol ends runs with a
//! `final` action instead. It stays registered so a native call to it still
//! resolves, and the orchestrator treats its execution as `TOOL_TERMINATE`.

use async_trait::async_trait;
use loopwright_core::error::ToolError;
use loopwright_core::tool::{Tool, ToolResult};

pub const TOOL_NAME: &str = "terminate";

pub struct TerminateTool;

impl TerminateTool {
    /// The final answer carried by a terminate call, if any.
    pub fn answer_from(arguments: &serde_json::Value) -> Option<String> {
        arguments
            .get("answer")
            .or_else(|| arguments.get("message"))
            .and_then(|v| v.as_str())
            .map(str::to_string)
    }
}

#[async_trait]
impl Tool for TerminateTool {
    fn name(&self) -> &str {
        TOOL_NAME
    }

    fn description(&self) -> &str {
        "Finish the task and return the final answer to the user."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "answer": {
                    "type": "string",
                    "description": "The final answer"
                }
            },
            "required": ["answer"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        Ok(ToolResult::ok(Self::answer_from(&arguments).unwrap_or_default()))
    }
}

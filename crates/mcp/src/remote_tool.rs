//! Adapter exposing a remote tool through the local [`Tool`] trait.

use std::sync::Arc;

use async_trait::async_trait;
use loopwright_core::error::{SourceError, ToolError};
use loopwright_core::namespace;
use loopwright_core::tool::{Tool, ToolResult};
use serde_json::Value;

use crate::client::SourceClient;
use crate::schema;
use crate::types::RemoteToolInfo;

/// A tool discovered on a remote source, registered under its dispatch name.
pub struct RemoteTool {
    dispatch_name: String,
    remote_name: String,
    description: String,
    input_schema: Value,
    wraps_input: bool,
    client: Arc<SourceClient>,
}

impl RemoteTool {
    pub fn new(client: Arc<SourceClient>, info: &RemoteToolInfo) -> Self {
        let source_id = client.source_id().to_string();
        Self {
            dispatch_name: namespace::namespaced(&source_id, &info.name),
            remote_name: info.name.clone(),
            description: schema::describe(info.description.as_deref(), &info.name, &source_id),
            input_schema: schema::normalize_schema(&info.input_schema),
            wraps_input: schema::wraps_input(&info.input_schema),
            client,
        }
    }

    pub fn remote_name(&self) -> &str {
        &self.remote_name
    }

    pub fn source_id(&self) -> &str {
        self.client.source_id()
    }
}

#[async_trait]
impl Tool for RemoteTool {
    fn name(&self) -> &str {
        &self.dispatch_name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn input_schema(&self) -> Value {
        self.input_schema.clone()
    }

    async fn execute(&self, arguments: Value) -> Result<ToolResult, ToolError> {
        if !self.client.is_connected() {
            return Err(ToolError::SourceUnavailable(self.source_id().to_string()));
        }

        let arguments = if self.wraps_input {
            arguments.get("input").cloned().unwrap_or(Value::Null)
        } else {
            arguments
        };

        let result = self
            .client
            .call_tool(&self.remote_name, arguments)
            .await
            .map_err(|e| match e {
                SourceError::Transport { .. } | SourceError::NotConnected(_) => {
                    ToolError::SourceUnavailable(format!("{}: {e}", self.source_id()))
                }
                other => ToolError::ExecutionFailed {
                    tool_name: self.dispatch_name.clone(),
                    reason: other.to_string(),
                },
            })?;

        let output = result.text();
        Ok(if result.is_error {
            ToolResult::failed(output)
        } else {
            ToolResult::ok(output)
        })
    }
}

//! Tool execution service.
//!
//! `invoke` never returns an error: a missing tool or a failing tool becomes
//! an unsuccessful [`ToolResult`] that the orchestrator feeds back to the
//! model as an observation.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use loopwright_core::error::ToolError;
use loopwright_core::tool::{ToolRegistry, ToolResult};
use tracing::{debug, warn};

/// Invokes tools by dispatch name.
#[async_trait]
pub trait ToolExecutionService: Send + Sync {
    async fn invoke(&self, tool_name: &str, arguments: serde_json::Value) -> ToolResult;
}

/// Executes tools through the shared [`ToolRegistry`].
pub struct RegistryExecutor {
    registry: Arc<ToolRegistry>,
}

impl RegistryExecutor {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }
}

#[async_trait]
impl ToolExecutionService for RegistryExecutor {
    async fn invoke(&self, tool_name: &str, arguments: serde_json::Value) -> ToolResult {
        // Clone the handle out so no registry lock is held across the call.
        let Some(tool) = self.registry.get(tool_name) else {
            warn!(tool = %tool_name, "Tool not found");
            return ToolResult::failed(ToolError::NotFound(tool_name.to_string()).to_string());
        };

        let start = Instant::now();
        match tool.execute(arguments).await {
            Ok(result) => {
                debug!(
                    tool = %tool_name,
                    success = result.success,
                    duration_ms = start.elapsed().as_millis() as u64,
                    "Tool executed"
                );
                result
            }
            Err(e) => {
                warn!(tool = %tool_name, error = %e, "Tool execution failed");
                ToolResult::failed(e.to_string())
            }
        }
    }
}

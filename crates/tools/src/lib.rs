//! Built-in tools, tool filtering, and tool execution for Loopwright.
//!
//! Local tools live here next to the two services the kernel consumes
//! around them: [`filter::ToolScope`] decides which registry entries a run
//! may see, and [`executor::RegistryExecutor`] invokes them without ever
//! raising.

pub mod clock;
pub mod echo;
pub mod executor;
pub mod filter;
pub mod knowledge_base_query;
pub mod terminate;

use std::sync::Arc;

use loopwright_core::tool::ToolRegistry;

pub use executor::{RegistryExecutor, ToolExecutionService};
pub use filter::ToolScope;
pub use knowledge_base_query::{KnowledgeBaseQueryTool, KnowledgeChunk, KnowledgeSource};
pub use terminate::TerminateTool;

/// Create a registry holding every built-in tool.
pub fn default_registry() -> ToolRegistry {
    let registry = ToolRegistry::new();
    register_builtins(&registry);
    registry
}

/// Register the built-in tools into an existing registry.
pub fn register_builtins(registry: &ToolRegistry) {
    registry.register(Arc::new(echo::EchoTool));
    registry.register(Arc::new(clock::ClockTool));
    registry.register(Arc::new(KnowledgeBaseQueryTool::default()));
    registry.register(Arc::new(TerminateTool));
}

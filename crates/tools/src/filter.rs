//! Per-run tool visibility.
//!
//! A [`ToolScope`] composes the visibility rules for one execution context:
//! the terminate tool is never listed, the knowledge tool only when enabled,
//! and namespaced tools only when their source is enabled. An empty
//! enabled-source list allows every source.

use loopwright_core::llm::ToolDefinition;
use loopwright_core::namespace;
use loopwright_core::tool::ToolRegistry;

use crate::{knowledge_base_query, terminate};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolScope {
    enabled_sources: Vec<String>,
    knowledge_enabled: bool,
}

impl ToolScope {
    pub fn new(enabled_sources: &[String], knowledge_enabled: bool) -> Self {
        Self {
            enabled_sources: enabled_sources
                .iter()
                .map(|s| namespace::normalize_source(s))
                .collect(),
            knowledge_enabled,
        }
    }

    /// Whether a remote source may contribute tools to this run.
    pub fn source_enabled(&self, source_id: &str) -> bool {
        self.enabled_sources.is_empty()
            || self
                .enabled_sources
                .iter()
                .any(|s| s == &namespace::normalize_source(source_id))
    }

    /// Whether a dispatch name is visible to this run.
    pub fn allows(&self, dispatch_name: &str) -> bool {
        if dispatch_name == terminate::TOOL_NAME {
            return false;
        }
        if dispatch_name == knowledge_base_query::TOOL_NAME && !self.knowledge_enabled {
            return false;
        }
        match namespace::parse(dispatch_name) {
            (Some(source), _) => self.source_enabled(source),
            (None, _) => true,
        }
    }

    /// The visible subset of the registry, sorted by name.
    pub fn visible(&self, registry: &ToolRegistry) -> Vec<ToolDefinition> {
        registry
            .definitions()
            .into_iter()
            .filter(|def| self.allows(&def.name))
            .collect()
    }

    /// Enabled source ids, normalized. Empty means "all".
    pub fn enabled_sources(&self) -> &[String] {
        &self.enabled_sources
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use loopwright_core::error::ToolError;
    use loopwright_core::tool::{Tool, ToolResult};
    use std::sync::Arc;

    struct Named(String);

    #[async_trait]
    impl Tool for Named {
        fn name(&self) -> &str {
            &self.0
        }
        fn description(&self) -> &str {
            "test tool"
        }
        fn input_schema(&self) -> serde_json::Value {
            serde_json::json!({"type": "object", "properties": {}})
        }
        async fn execute(&self, _: serde_json::Value) -> Result<ToolResult, ToolError> {
            Ok(ToolResult::ok(""))
        }
    }

    fn registry(names: &[&str]) -> ToolRegistry {
        let registry = ToolRegistry::new();
        for name in names {
            registry.register(Arc::new(Named((*name).to_string())));
        }
        registry
    }

    fn names(defs: Vec<ToolDefinition>) -> Vec<String> {
        defs.into_iter().map(|d| d.name).collect()
    }

    #[test]
    fn terminate_is_always_hidden() {
        let scope = ToolScope::new(&[], true);
        assert!(!scope.allows("terminate"));
    }

    #[test]
    fn knowledge_tool_requires_opt_in() {
        assert!(!ToolScope::new(&[], false).allows("knowledge_base_query"));
        assert!(ToolScope::new(&[], true).allows("knowledge_base_query"));
    }

    #[test]
    fn empty_source_list_allows_all_sources() {
        let reg = registry(&["echo", "github__search", "jira__issues", "terminate"]);
        let visible = names(ToolScope::default().visible(&reg));
        assert_eq!(visible, vec!["echo", "github__search", "jira__issues"]);
    }

    #[test]
    fn enabled_sources_restrict_namespaced_tools_only() {
        let reg = registry(&["echo", "github__search", "jira__issues"]);
        let scope = ToolScope::new(&["github".into()], false);
        assert_eq!(names(scope.visible(&reg)), vec!["echo", "github__search"]);
    }

    #[test]
    fn enabled_source_ids_are_normalized() {
        let scope = ToolScope::new(&["my__src_".into()], false);
        assert!(scope.allows(&namespace::namespaced("my__src_", "run")));
        assert!(scope.source_enabled("my_src"));
    }
}

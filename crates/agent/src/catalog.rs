//! Think-phase system prompt: the agent's own prompt, the protocol rules,
//! and the catalog of tools visible to this run.

use loopwright_core::llm::ToolDefinition;

pub const PROTOCOL_INSTRUCTIONS: &str = r#"## Response format

Reply with exactly one JSON object and nothing else:

{"thought": "<your reasoning>", "action": <action>}

where <action> is one of:
- {"type": "tool", "name": "<tool name>", "args": {<arguments matching the tool's input schema>}}
- {"type": "final", "answer": "<the answer for the user>"}
- {"type": "none"}

Call at most one tool per step. Tool results arrive as the next message.
Use "final" as soon as you can answer."#;

/// Render the visible tools as a catalog section.
pub fn render_catalog(tools: &[ToolDefinition]) -> String {
    if tools.is_empty() {
        return "## Available tools\n\nNo tools are available. Answer with a \"final\" action.".into();
    }

    let mut out = String::from("## Available tools\n");
    for tool in tools {
        out.push_str(&format!("\n### {}\n{}\n", tool.name, tool.description));
        out.push_str(&format!("Input schema: {}\n", tool.input_schema));
    }
    out
}

/// The full system prompt for a think phase.
pub fn system_prompt(base: &str, tools: &[ToolDefinition]) -> String {
    let base = base.trim();
    let mut out = String::new();
    if !base.is_empty() {
        out.push_str(base);
        out.push_str("\n\n");
    }
    out.push_str(PROTOCOL_INSTRUCTIONS);
    out.push_str("\n\n");
    out.push_str(&render_catalog(tools));
    out
}

/// Notification turn announcing a change in the visible tool set.
///
/// Returns `None` when nothing changed.
pub fn toolset_notice(added: &[String], removed: &[String]) -> Option<String> {
    if added.is_empty() && removed.is_empty() {
        return None;
    }
    let mut lines = vec!["The set of available tools has changed.".to_string()];
    if !added.is_empty() {
        lines.push(format!("New tools: {}.", added.join(", ")));
    }
    if !removed.is_empty() {
        lines.push(format!("No longer available: {}.", removed.join(", ")));
    }
    Some(lines.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn def(name: &str) -> ToolDefinition {
        ToolDefinition {
            name: name.into(),
            description: format!("{name} does things"),
            input_schema: json!({"type": "object", "properties": {"q": {"type": "string"}}}),
        }
    }

    #[test]
    fn catalog_lists_name_description_and_schema() {
        let text = render_catalog(&[def("echo"), def("github__search")]);
        assert!(text.contains("### echo\necho does things"));
        assert!(text.contains("### github__search"));
        assert!(text.contains("Input schema: {"));
        assert!(text.contains(r#""q":{"type":"string"}"#));
    }

    #[test]
    fn empty_catalog_says_so() {
        assert!(render_catalog(&[]).contains("No tools are available"));
    }

    #[test]
    fn system_prompt_puts_base_first() {
        let prompt = system_prompt("You are careful.", &[def("echo")]);
        assert!(prompt.starts_with("You are careful.\n\n## Response format"));
        assert!(prompt.contains("### echo"));
    }

    #[test]
    fn notice_only_when_changed() {
        assert_eq!(toolset_notice(&[], &[]), None);
        let notice = toolset_notice(&["gh__new".into()], &["gh__old".into()]).unwrap();
        assert!(notice.contains("New tools: gh__new."));
        assert!(notice.contains("No longer available: gh__old."));
    }
}

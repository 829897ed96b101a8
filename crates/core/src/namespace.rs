//! Tool namespacing: maps `(source id, tool name)` to a flat dispatch name.
//!
//! Remote tools are registered as `<source>__<tool>`. Local tools carry no
//! separator. Runs of underscores inside a component are collapsed so the
//! separator can only ever appear once, at the join point.

/// Separator between the source id and the tool name.
pub const SEPARATOR: &str = "__";

/// Collapse every run of `_` into a single `_`.
fn collapse_underscores(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut prev_underscore = false;
    for ch in raw.chars() {
        if ch == '_' {
            if prev_underscore {
                continue;
            }
            prev_underscore = true;
        } else {
            prev_underscore = false;
        }
        out.push(ch);
    }
    out
}

/// Normalize a source id so it can never contain or border the separator.
pub fn normalize_source(source_id: &str) -> String {
    collapse_underscores(source_id).trim_matches('_').to_string()
}

/// Normalize a tool name so it can never contain the separator.
pub fn normalize_tool(tool_name: &str) -> String {
    collapse_underscores(tool_name)
}

/// Build the dispatch name for a tool exposed by `source_id`.
pub fn namespaced(source_id: &str, tool_name: &str) -> String {
    format!(
        "{}{}{}",
        normalize_source(source_id),
        SEPARATOR,
        normalize_tool(tool_name)
    )
}

/// The registry prefix shared by every tool of `source_id`.
pub fn source_prefix(source_id: &str) -> String {
    format!("{}{}", normalize_source(source_id), SEPARATOR)
}

/// Split a dispatch name into `(source id, tool name)`.
///
/// Names without a separator are local tools and yield `None` for the source.
pub fn parse(dispatch_name: &str) -> (Option<&str>, &str) {
    match dispatch_name.split_once(SEPARATOR) {
        Some((source, tool)) if !source.is_empty() => (Some(source), tool),
        _ => (None, dispatch_name),
    }
}

/// Whether `dispatch_name` belongs to a remote source.
pub fn is_namespaced(dispatch_name: &str) -> bool {
    parse(dispatch_name).0.is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_simple_names() {
        for (source, tool) in [("github", "search"), ("fs", "read-file"), ("db1", "query")] {
            let name = namespaced(source, tool);
            assert_eq!(parse(&name), (Some(source), tool));
        }
    }

    #[test]
    fn roundtrip_keeps_single_underscores() {
        let name = namespaced("my_server", "read_file");
        assert_eq!(name, "my_server__read_file");
        assert_eq!(parse(&name), (Some("my_server"), "read_file"));
    }

    #[test]
    fn separator_inside_components_is_denormalized() {
        let name = namespaced("a__b", "c___d");
        assert_eq!(name, "a_b__c_d");
        assert_eq!(parse(&name), (Some("a_b"), "c_d"));
    }

    #[test]
    fn trailing_underscore_on_source_cannot_shift_split() {
        let name = namespaced("src_", "_tool");
        assert_eq!(parse(&name), (Some("src"), "_tool"));
    }

    #[test]
    fn local_names_have_no_source() {
        assert_eq!(parse("echo"), (None, "echo"));
        assert_eq!(parse("knowledge_base_query"), (None, "knowledge_base_query"));
        assert!(!is_namespaced("terminate"));
        assert!(is_namespaced("github__search"));
    }

    #[test]
    fn leading_separator_is_treated_as_local() {
        assert_eq!(parse("__hidden"), (None, "__hidden"));
    }

    #[test]
    fn prefix_matches_namespaced_names() {
        let prefix = source_prefix("github");
        assert!(namespaced("github", "search").starts_with(&prefix));
        assert!(!namespaced("githubx", "search").starts_with(&prefix));
    }
}

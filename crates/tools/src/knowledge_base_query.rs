//! Knowledge base query tool: retrieval over a pluggable [`KnowledgeSource`].
//!
//! Hidden from the catalog unless a run enables knowledge retrieval. The
//! default source is a small in-process corpus scored by term overlap; a
//! vector store can be plugged in by implementing [`KnowledgeSource`].

use std::sync::Arc;

use async_trait::async_trait;
use loopwright_core::error::ToolError;
use loopwright_core::tool::{Tool, ToolResult};
use serde::Serialize;

pub const TOOL_NAME: &str = "knowledge_base_query";

/// One retrieved passage.
#[derive(Debug, Clone, Serialize)]
pub struct KnowledgeChunk {
    pub document_id: String,
    pub content: String,
    pub source: String,
    pub similarity: f64,
}

/// Anything that can answer a retrieval query.
#[async_trait]
pub trait KnowledgeSource: Send + Sync {
    async fn search(
        &self,
        query: &str,
        top_k: usize,
        min_score: f64,
    ) -> Result<Vec<KnowledgeChunk>, ToolError>;
}

/// An in-memory corpus scored by the fraction of query terms a document contains.
pub struct StaticKnowledgeBase {
    documents: Vec<(String, String, String)>,
}

impl StaticKnowledgeBase {
    pub fn new() -> Self {
        Self {
            documents: Vec::new(),
        }
    }

    pub fn with_document(
        mut self,
        id: impl Into<String>,
        source: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        self.documents.push((id.into(), source.into(), content.into()));
        self
    }

    fn seeded() -> Self {
        Self::new()
            .with_document(
                "doc_react_001",
                "agent_patterns.md",
                "The ReAct pattern interleaves reasoning and acting: the agent thinks, calls a tool, observes the result, and repeats until it can answer.",
            )
            .with_document(
                "doc_react_002",
                "agent_patterns.md",
                "A step budget bounds every run so a model that never produces a final answer still stops.",
            )
            .with_document(
                "doc_mcp_001",
                "tool_sources.md",
                "Remote tool sources expose tools over JSON-RPC; tools are listed with tools/list and invoked with tools/call.",
            )
    }
}

impl Default for StaticKnowledgeBase {
    fn default() -> Self {
        Self::seeded()
    }
}

fn terms(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.len() > 2)
        .map(str::to_lowercase)
        .collect()
}

#[async_trait]
impl KnowledgeSource for StaticKnowledgeBase {
    async fn search(
        &self,
        query: &str,
        top_k: usize,
        min_score: f64,
    ) -> Result<Vec<KnowledgeChunk>, ToolError> {
        let query_terms = terms(query);
        if query_terms.is_empty() {
            return Ok(Vec::new());
        }

        let mut scored: Vec<KnowledgeChunk> = self
            .documents
            .iter()
            .filter_map(|(id, source, content)| {
                let doc_terms = terms(content);
                let hits = query_terms.iter().filter(|t| doc_terms.contains(t)).count();
                let similarity = hits as f64 / query_terms.len() as f64;
                (similarity > 0.0 && similarity >= min_score).then(|| KnowledgeChunk {
                    document_id: id.clone(),
                    content: content.clone(),
                    source: source.clone(),
                    similarity,
                })
            })
            .collect();

        scored.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
        scored.truncate(top_k);
        Ok(scored)
    }
}

pub struct KnowledgeBaseQueryTool {
    source: Arc<dyn KnowledgeSource>,
}

impl KnowledgeBaseQueryTool {
    pub fn with_source(source: Arc<dyn KnowledgeSource>) -> Self {
        Self { source }
    }
}

impl Default for KnowledgeBaseQueryTool {
    fn default() -> Self {
        Self::with_source(Arc::new(StaticKnowledgeBase::default()))
    }
}

#[async_trait]
impl Tool for KnowledgeBaseQueryTool {
    fn name(&self) -> &str {
        TOOL_NAME
    }

    fn description(&self) -> &str {
        "Query the knowledge base for relevant information. Returns document chunks sorted by relevance."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The search query to find relevant knowledge"
                },
                "top_k": {
                    "type": "integer",
                    "description": "Maximum number of results to return (default 3)",
                    "default": 3
                },
                "min_score": {
                    "type": "number",
                    "description": "Minimum similarity score threshold (0.0-1.0, default 0.0)",
                    "default": 0.0
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let query = arguments["query"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'query' argument".into()))?;

        let top_k = arguments["top_k"].as_u64().unwrap_or(3).min(10) as usize;
        let min_score = arguments["min_score"].as_f64().unwrap_or(0.0);

        let chunks = self.source.search(query, top_k, min_score).await?;
        if chunks.is_empty() {
            return Ok(ToolResult::ok(format!("No knowledge found for '{query}'.")));
        }

        let data = serde_json::to_value(&chunks).map_err(|e| ToolError::ExecutionFailed {
            tool_name: TOOL_NAME.into(),
            reason: e.to_string(),
        })?;
        Ok(ToolResult {
            call_id: String::new(),
            success: true,
            output: serde_json::to_string_pretty(&data).unwrap_or_default(),
            data: Some(data),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn query_returns_ranked_results() {
        let tool = KnowledgeBaseQueryTool::default();
        let result = tool
            .execute(serde_json::json!({"query": "react reasoning tool"}))
            .await
            .unwrap();

        assert!(result.success);
        assert!(result.output.contains("doc_react_001"));
        let data = result.data.unwrap();
        assert_eq!(data[0]["document_id"], "doc_react_001");
    }

    #[tokio::test]
    async fn respects_top_k() {
        let tool = KnowledgeBaseQueryTool::default();
        let result = tool
            .execute(serde_json::json!({"query": "tools agent the step", "top_k": 1}))
            .await
            .unwrap();
        assert_eq!(result.data.unwrap().as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn no_match_is_still_success() {
        let tool = KnowledgeBaseQueryTool::default();
        let result = tool
            .execute(serde_json::json!({"query": "zebra"}))
            .await
            .unwrap();
        assert!(result.success);
        assert!(result.output.contains("No knowledge found"));
    }

    #[tokio::test]
    async fn missing_query_returns_error() {
        let tool = KnowledgeBaseQueryTool::default();
        let err = tool.execute(serde_json::json!({})).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }

    #[tokio::test]
    async fn custom_source_is_used() {
        let kb = StaticKnowledgeBase::new().with_document("d1", "notes.md", "loopwright kernel notes");
        let tool = KnowledgeBaseQueryTool::with_source(Arc::new(kb));
        let result = tool
            .execute(serde_json::json!({"query": "kernel"}))
            .await
            .unwrap();
        assert!(result.output.contains("notes.md"));
    }
}

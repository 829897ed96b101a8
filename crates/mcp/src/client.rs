//! Protocol client for one remote tool source.
//!
//! Wraps a [`SourceTransport`] with the handshake, tool listing, tool
//! invocation and health check, and tracks whether the source is live:
//! transport failures mark it disconnected, any successful exchange marks
//! it connected again.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use loopwright_core::error::SourceError;
use serde_json::{Value, json};

use crate::transport::SourceTransport;
use crate::types::{CallToolResult, InitializeResult, ListToolsResult, PROTOCOL_VERSION, RemoteToolInfo};

/// Upper bound on `tools/list` pages followed for one listing.
const MAX_LIST_PAGES: usize = 64;

pub struct SourceClient {
    source_id: String,
    transport: Arc<dyn SourceTransport>,
    connected: AtomicBool,
}

impl SourceClient {
    pub fn new(source_id: impl Into<String>, transport: Arc<dyn SourceTransport>) -> Self {
        Self {
            source_id: source_id.into(),
            transport,
            connected: AtomicBool::new(false),
        }
    }

    pub fn source_id(&self) -> &str {
        &self.source_id
    }

    pub fn transport_kind(&self) -> &'static str {
        self.transport.kind()
    }

    /// Live and initialized.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    pub fn mark_disconnected(&self) {
        if self.connected.swap(false, Ordering::SeqCst) {
            tracing::warn!(source = %self.source_id, "Tool source disconnected");
        }
    }

    async fn request(&self, method: &str, params: Option<Value>) -> Result<Value, SourceError> {
        match self.transport.request(method, params).await {
            Ok(value) => {
                self.connected.store(true, Ordering::SeqCst);
                Ok(value)
            }
            Err(e) => {
                if matches!(e, SourceError::Transport { .. } | SourceError::NotConnected(_)) {
                    self.mark_disconnected();
                }
                Err(e)
            }
        }
    }

    fn invalid(&self, reason: impl std::fmt::Display) -> SourceError {
        SourceError::InvalidResponse {
            source_id: self.source_id.clone(),
            reason: reason.to_string(),
        }
    }

    /// Perform the `initialize` handshake and send `notifications/initialized`.
    pub async fn initialize(&self) -> Result<InitializeResult, SourceError> {
        let params = json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {},
            "clientInfo": {
                "name": "loopwright",
                "version": env!("CARGO_PKG_VERSION")
            }
        });

        let handshake = |reason: String| SourceError::Handshake {
            source_id: self.source_id.clone(),
            reason,
        };

        let raw = self
            .request("initialize", Some(params))
            .await
            .map_err(|e| handshake(e.to_string()))?;
        let result: InitializeResult =
            serde_json::from_value(raw).map_err(|e| handshake(e.to_string()))?;

        self.transport
            .notify("notifications/initialized", None)
            .await
            .map_err(|e| handshake(e.to_string()))?;

        tracing::info!(
            source = %self.source_id,
            transport = self.transport.kind(),
            server = result.server_info.as_ref().map(|s| s.name.as_str()).unwrap_or("unknown"),
            "Tool source initialized"
        );
        Ok(result)
    }

    /// List every tool the source currently exposes, following pagination.
    pub async fn list_tools(&self) -> Result<Vec<RemoteToolInfo>, SourceError> {
        let mut tools = Vec::new();
        let mut cursor: Option<String> = None;

        for _ in 0..MAX_LIST_PAGES {
            let params = cursor.as_ref().map(|c| json!({ "cursor": c }));
            let raw = self.request("tools/list", params).await?;
            let page: ListToolsResult = serde_json::from_value(raw).map_err(|e| self.invalid(e))?;
            tools.extend(page.tools);
            match page.next_cursor {
                Some(next) if !next.is_empty() => cursor = Some(next),
                _ => return Ok(tools),
            }
        }

        Err(self.invalid("tools/list pagination did not terminate"))
    }

    /// Invoke a tool by its source-local name.
    pub async fn call_tool(&self, name: &str, arguments: Value) -> Result<CallToolResult, SourceError> {
        let raw = self
            .request("tools/call", Some(json!({ "name": name, "arguments": arguments })))
            .await?;
        serde_json::from_value(raw).map_err(|e| self.invalid(e))
    }

    /// Health check. A failure leaves the source marked disconnected.
    pub async fn ping(&self) -> bool {
        match self.request("ping", None).await {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!(source = %self.source_id, error = %e, "Tool source ping failed");
                self.mark_disconnected();
                false
            }
        }
    }

    pub async fn close(&self) -> Result<(), SourceError> {
        self.mark_disconnected();
        self.transport.close().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeSource;

    #[tokio::test]
    async fn initialize_marks_connected() {
        let fake = FakeSource::new(vec![]);
        let client = SourceClient::new("fake", Arc::new(fake.connect("fake")));
        assert!(!client.is_connected());
        let result = client.initialize().await.unwrap();
        assert_eq!(result.server_info.unwrap().name, "fake-source");
        assert!(client.is_connected());
        assert_eq!(fake.initialized_notifications(), 1);
    }

    #[tokio::test]
    async fn list_tools_follows_pagination() {
        let fake = FakeSource::new(vec![
            RemoteToolInfo::new("a"),
            RemoteToolInfo::new("b"),
            RemoteToolInfo::new("c"),
        ])
        .with_page_size(2);
        let client = SourceClient::new("fake", Arc::new(fake.connect("fake")));
        let names: Vec<String> = client
            .list_tools()
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.name)
            .collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn call_tool_returns_content() {
        let fake = FakeSource::new(vec![RemoteToolInfo::new("search")]);
        let client = SourceClient::new("fake", Arc::new(fake.connect("fake")));
        let result = client
            .call_tool("search", json!({"q": "rust"}))
            .await
            .unwrap();
        assert!(!result.is_error);
        assert!(result.text().contains("search"));
    }

    #[tokio::test]
    async fn lost_connection_marks_disconnected() {
        let fake = FakeSource::new(vec![RemoteToolInfo::new("search")]);
        let client = SourceClient::new("fake", Arc::new(fake.connect("fake")));
        client.initialize().await.unwrap();
        fake.shut_down();
        assert!(!client.ping().await);
        assert!(!client.is_connected());
    }

    #[tokio::test]
    async fn failed_handshake_is_typed() {
        let fake = FakeSource::new(vec![]);
        fake.shut_down();
        let client = SourceClient::new("fake", Arc::new(fake.connect("fake")));
        assert!(matches!(
            client.initialize().await,
            Err(SourceError::Handshake { .. })
        ));
    }
}

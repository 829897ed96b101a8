//! HTTP transport: JSON-RPC POSTed to a long-lived tool source server.
//!
//! Replies may be a plain JSON body (a single message or a batch) or a
//! `text/event-stream` whose `data:` lines carry JSON-RPC messages. The
//! server's session id header, when present, is echoed on later requests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use loopwright_core::error::SourceError;
use serde_json::Value;

use crate::transport::{SourceTransport, into_result};
use crate::types::{JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, RpcId};

const SESSION_HEADER: &str = "mcp-session-id";

pub struct HttpTransport {
    source_id: String,
    url: String,
    headers: HashMap<String, String>,
    client: reqwest::Client,
    next_id: AtomicI64,
    session_id: Mutex<Option<String>>,
    closed: AtomicBool,
}

impl HttpTransport {
    pub fn new(
        source_id: impl Into<String>,
        url: impl Into<String>,
        headers: HashMap<String, String>,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()
            .unwrap_or_default();

        Self {
            source_id: source_id.into(),
            url: url.into(),
            headers,
            client,
            next_id: AtomicI64::new(1),
            session_id: Mutex::new(None),
            closed: AtomicBool::new(false),
        }
    }

    fn transport_err(&self, reason: impl std::fmt::Display) -> SourceError {
        SourceError::Transport {
            source_id: self.source_id.clone(),
            reason: reason.to_string(),
        }
    }

    fn current_session(&self) -> Option<String> {
        match self.session_id.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn remember_session(&self, value: String) {
        match self.session_id.lock() {
            Ok(mut guard) => *guard = Some(value),
            Err(poisoned) => *poisoned.into_inner() = Some(value),
        }
    }

    async fn post(&self, body: &Value) -> Result<reqwest::Response, SourceError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(SourceError::NotConnected(self.source_id.clone()));
        }

        let mut request = self
            .client
            .post(&self.url)
            .header("Content-Type", "application/json")
            .header("Accept", "application/json, text/event-stream")
            .json(body);
        for (name, value) in &self.headers {
            request = request.header(name, value);
        }
        if let Some(session) = self.current_session() {
            request = request.header(SESSION_HEADER, session);
        }

        let response = request.send().await.map_err(|e| self.transport_err(e))?;

        if let Some(session) = response
            .headers()
            .get(SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
        {
            self.remember_session(session.to_string());
        }

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(self.transport_err(format!("HTTP {}: {}", status.as_u16(), text)));
        }
        Ok(response)
    }
}

/// Collect JSON-RPC messages from a reply body.
fn decode_messages(content_type: &str, body: &str) -> Result<Vec<Value>, String> {
    if content_type.starts_with("text/event-stream") {
        let mut messages = Vec::new();
        for line in body.lines() {
            let Some(data) = line.strip_prefix("data:") else {
                continue;
            };
            let data = data.trim();
            if data.is_empty() {
                continue;
            }
            match serde_json::from_str::<Value>(data) {
                Ok(Value::Array(items)) => messages.extend(items),
                Ok(value) => messages.push(value),
                Err(e) => return Err(format!("invalid event data: {e}")),
            }
        }
        return Ok(messages);
    }

    match serde_json::from_str::<Value>(body) {
        Ok(Value::Array(items)) => Ok(items),
        Ok(value) => Ok(vec![value]),
        Err(e) => Err(format!("invalid JSON body: {e}")),
    }
}

/// Pick the response for `request_id` out of a batch, ignoring notifications.
fn find_response(messages: Vec<Value>, request_id: i64) -> Option<JsonRpcResponse> {
    messages
        .into_iter()
        .filter_map(|m| serde_json::from_value::<JsonRpcResponse>(m).ok())
        .find(|r| r.id == RpcId::Number(request_id))
}

#[async_trait]
impl SourceTransport for HttpTransport {
    async fn request(&self, method: &str, params: Option<Value>) -> Result<Value, SourceError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let request = JsonRpcRequest::new(RpcId::Number(id), method, params);
        let body = serde_json::to_value(&request).map_err(|e| self.transport_err(e))?;

        tracing::debug!(source = %self.source_id, method = %method, id, "Sending HTTP request");

        let response = self.post(&body).await?;
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("application/json")
            .to_string();
        let text = response.text().await.map_err(|e| self.transport_err(e))?;

        let messages =
            decode_messages(&content_type, &text).map_err(|reason| SourceError::InvalidResponse {
                source_id: self.source_id.clone(),
                reason,
            })?;
        let matched = find_response(messages, id).ok_or_else(|| SourceError::InvalidResponse {
            source_id: self.source_id.clone(),
            reason: format!("missing response for request id {id}"),
        })?;
        into_result(&self.source_id, matched)
    }

    async fn notify(&self, method: &str, params: Option<Value>) -> Result<(), SourceError> {
        let notification = JsonRpcNotification::new(method, params);
        let body = serde_json::to_value(&notification).map_err(|e| self.transport_err(e))?;
        self.post(&body).await.map(|_| ())
    }

    async fn close(&self) -> Result<(), SourceError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn kind(&self) -> &'static str {
        "http"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_plain_json_reply() {
        let body = r#"{"jsonrpc":"2.0","id":3,"result":{"ok":true}}"#;
        let messages = decode_messages("application/json", body).unwrap();
        let response = find_response(messages, 3).unwrap();
        assert_eq!(response.result.unwrap()["ok"], true);
    }

    #[test]
    fn decodes_event_stream_reply_skipping_notifications() {
        let body = "event: message\n\
data: {\"jsonrpc\":\"2.0\",\"method\":\"notifications/progress\",\"params\":{}}\n\n\
event: message\n\
data: {\"jsonrpc\":\"2.0\",\"id\":9,\"result\":{\"tools\":[]}}\n\n";
        let messages = decode_messages("text/event-stream", body).unwrap();
        assert_eq!(messages.len(), 2);
        let response = find_response(messages, 9).unwrap();
        assert!(response.result.unwrap()["tools"].is_array());
    }

    #[test]
    fn batch_reply_requires_matching_id() {
        let body = r#"[{"jsonrpc":"2.0","id":1,"result":{}}]"#;
        let messages = decode_messages("application/json", body).unwrap();
        assert!(find_response(messages, 2).is_none());
    }

    #[test]
    fn invalid_body_is_reported() {
        assert!(decode_messages("application/json", "not json").is_err());
        assert!(decode_messages("text/event-stream", "data: {broken").is_err());
    }

    #[tokio::test]
    async fn closed_transport_rejects_requests() {
        let transport = HttpTransport::new("remote", "http://127.0.0.1:9/mcp", HashMap::new());
        transport.close().await.unwrap();
        assert!(matches!(
            transport.request("ping", None).await,
            Err(SourceError::NotConnected(_))
        ));
    }
}

//! An in-process tool source for tests.
//!
//! [`FakeSource`] answers the JSON-RPC methods a real source would over a
//! `tokio::io::duplex` pipe, so the real [`LineTransport`] framing is
//! exercised end to end. Its tool list can be changed and its connection
//! dropped while a client is attached.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream, ReadHalf, WriteHalf};

use crate::transport::LineTransport;
use crate::types::{JsonRpcResponse, RemoteToolInfo, RpcId, error_codes};

pub type FakeTransport = LineTransport<ReadHalf<DuplexStream>, WriteHalf<DuplexStream>>;

struct FakeState {
    tools: Mutex<Vec<RemoteToolInfo>>,
    calls: Mutex<Vec<(String, Value)>>,
    alive: AtomicBool,
    initialized: AtomicUsize,
    list_calls: AtomicUsize,
    page_size: usize,
}

#[derive(Clone)]
pub struct FakeSource {
    state: Arc<FakeState>,
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    match m.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

impl FakeSource {
    pub fn new(tools: Vec<RemoteToolInfo>) -> Self {
        Self::build(tools, usize::MAX)
    }

    fn build(tools: Vec<RemoteToolInfo>, page_size: usize) -> Self {
        Self {
            state: Arc::new(FakeState {
                tools: Mutex::new(tools),
                calls: Mutex::new(Vec::new()),
                alive: AtomicBool::new(true),
                initialized: AtomicUsize::new(0),
                list_calls: AtomicUsize::new(0),
                page_size,
            }),
        }
    }

    /// Serve `tools/list` in pages of `size` tools.
    pub fn with_page_size(self, size: usize) -> Self {
        let tools = lock(&self.state.tools).clone();
        Self::build(tools, size.max(1))
    }

    pub fn set_tools(&self, tools: Vec<RemoteToolInfo>) {
        *lock(&self.state.tools) = tools;
    }

    /// Drop every connection at its next message.
    pub fn shut_down(&self) {
        self.state.alive.store(false, Ordering::SeqCst);
    }

    pub fn initialized_notifications(&self) -> usize {
        self.state.initialized.load(Ordering::SeqCst)
    }

    pub fn list_calls(&self) -> usize {
        self.state.list_calls.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> Vec<(String, Value)> {
        lock(&self.state.calls).clone()
    }

    /// Open a new client connection served by a background task.
    pub fn connect(&self, source_id: &str) -> FakeTransport {
        let (client_end, server_end) = tokio::io::duplex(64 * 1024);
        let state = self.state.clone();
        tokio::spawn(async move { serve(state, server_end).await });
        let (reader, writer) = tokio::io::split(client_end);
        LineTransport::new(source_id, reader, writer)
    }
}

async fn serve(state: Arc<FakeState>, stream: DuplexStream) {
    let (reader, mut writer) = tokio::io::split(stream);
    let mut lines = BufReader::new(reader).lines();

    while let Ok(Some(line)) = lines.next_line().await {
        if !state.alive.load(Ordering::SeqCst) {
            return;
        }
        let Ok(message) = serde_json::from_str::<Value>(&line) else {
            continue;
        };
        let method = message["method"].as_str().unwrap_or_default().to_string();
        let Some(id) = message
            .get("id")
            .and_then(|id| serde_json::from_value::<RpcId>(id.clone()).ok())
        else {
            if method == "notifications/initialized" {
                state.initialized.fetch_add(1, Ordering::SeqCst);
            }
            continue;
        };

        let response = handle(&state, id, &method, &message["params"]);
        let Ok(payload) = serde_json::to_string(&response) else {
            return;
        };
        if writer.write_all(payload.as_bytes()).await.is_err()
            || writer.write_all(b"\n").await.is_err()
            || writer.flush().await.is_err()
        {
            return;
        }
    }
}

fn handle(state: &FakeState, id: RpcId, method: &str, params: &Value) -> JsonRpcResponse {
    match method {
        "initialize" => JsonRpcResponse::success(
            id,
            json!({
                "protocolVersion": crate::types::PROTOCOL_VERSION,
                "capabilities": { "tools": { "listChanged": true } },
                "serverInfo": { "name": "fake-source", "version": "0.0.0" }
            }),
        ),
        "ping" => JsonRpcResponse::success(id, json!({})),
        "tools/list" => {
            state.list_calls.fetch_add(1, Ordering::SeqCst);
            let tools = lock(&state.tools).clone();
            let start: usize = params["cursor"]
                .as_str()
                .and_then(|c| c.parse().ok())
                .unwrap_or(0);
            let end = start.saturating_add(state.page_size).min(tools.len());
            let page = tools.get(start..end).unwrap_or_default().to_vec();
            let mut result = json!({ "tools": page });
            if end < tools.len() {
                result["nextCursor"] = json!(end.to_string());
            }
            JsonRpcResponse::success(id, result)
        }
        "tools/call" => {
            let name = params["name"].as_str().unwrap_or_default().to_string();
            let arguments = params["arguments"].clone();
            let known = lock(&state.tools).iter().any(|t| t.name == name);
            if !known {
                return JsonRpcResponse::failure(
                    id,
                    error_codes::INVALID_PARAMS,
                    format!("unknown tool: {name}"),
                );
            }
            lock(&state.calls).push((name.clone(), arguments.clone()));
            let is_error = arguments["fail"].as_bool().unwrap_or(false);
            JsonRpcResponse::success(
                id,
                json!({
                    "content": [{ "type": "text", "text": format!("{name} called with {arguments}") }],
                    "isError": is_error
                }),
            )
        }
        other => JsonRpcResponse::failure(
            id,
            error_codes::METHOD_NOT_FOUND,
            format!("method not found: {other}"),
        ),
    }
}

/// Connect a fake source holding `tools` and return the transport.
pub fn spawn_fake_source(source_id: &str, tools: Vec<RemoteToolInfo>) -> FakeTransport {
    FakeSource::new(tools).connect(source_id)
}

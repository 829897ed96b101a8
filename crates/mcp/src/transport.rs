//! Transports carry JSON-RPC between the kernel and a remote tool source.
//!
//! [`LineTransport`] speaks newline-delimited JSON over any async byte
//! stream; [`spawn_stdio`] wires it to a child process. The HTTP transport
//! lives in [`crate::http`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};

use async_trait::async_trait;
use loopwright_core::error::SourceError;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::Mutex;

use crate::types::{JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, RpcId};

/// A JSON-RPC channel to one remote tool source.
#[async_trait]
pub trait SourceTransport: Send + Sync {
    /// Send a request and wait for the `result` of the matching response.
    async fn request(&self, method: &str, params: Option<Value>) -> Result<Value, SourceError>;

    /// Send a notification. No response is expected.
    async fn notify(&self, method: &str, params: Option<Value>) -> Result<(), SourceError>;

    /// Release the underlying connection. Later requests fail.
    async fn close(&self) -> Result<(), SourceError>;

    /// Short transport label for logs ("stdio", "http", ...).
    fn kind(&self) -> &'static str;
}

/// Map a JSON-RPC response to its `result`, turning error payloads into [`SourceError::Rpc`].
pub(crate) fn into_result(source_id: &str, response: JsonRpcResponse) -> Result<Value, SourceError> {
    if let Some(err) = response.error {
        return Err(SourceError::Rpc {
            source_id: source_id.to_string(),
            code: err.code,
            message: err.message,
        });
    }
    Ok(response.result.unwrap_or(Value::Null))
}

struct LineIo<R, W> {
    reader: BufReader<R>,
    writer: W,
}

/// Newline-delimited JSON-RPC over an async reader/writer pair.
///
/// One request is in flight at a time; the I/O lock is held from write
/// until the matching response line is read. Lines that are not the
/// awaited response (server notifications, stray ids) are skipped.
pub struct LineTransport<R, W> {
    source_id: String,
    io: Mutex<LineIo<R, W>>,
    next_id: AtomicI64,
    closed: AtomicBool,
    child: Mutex<Option<Child>>,
    label: &'static str,
}

impl<R, W> LineTransport<R, W>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    pub fn new(source_id: impl Into<String>, reader: R, writer: W) -> Self {
        Self {
            source_id: source_id.into(),
            io: Mutex::new(LineIo {
                reader: BufReader::new(reader),
                writer,
            }),
            next_id: AtomicI64::new(1),
            closed: AtomicBool::new(false),
            child: Mutex::new(None),
            label: "stream",
        }
    }

    fn transport_err(&self, reason: impl std::fmt::Display) -> SourceError {
        SourceError::Transport {
            source_id: self.source_id.clone(),
            reason: reason.to_string(),
        }
    }

    fn ensure_open(&self) -> Result<(), SourceError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(SourceError::NotConnected(self.source_id.clone()));
        }
        Ok(())
    }

    async fn write_line(&self, io: &mut LineIo<R, W>, payload: &str) -> Result<(), SourceError> {
        io.writer
            .write_all(payload.as_bytes())
            .await
            .map_err(|e| self.transport_err(e))?;
        io.writer
            .write_all(b"\n")
            .await
            .map_err(|e| self.transport_err(e))?;
        io.writer.flush().await.map_err(|e| self.transport_err(e))
    }
}

#[async_trait]
impl<R, W> SourceTransport for LineTransport<R, W>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    async fn request(&self, method: &str, params: Option<Value>) -> Result<Value, SourceError> {
        self.ensure_open()?;
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let request = JsonRpcRequest::new(RpcId::Number(id), method, params);
        let payload = serde_json::to_string(&request).map_err(|e| self.transport_err(e))?;

        tracing::debug!(source = %self.source_id, method = %method, id, "Sending request");

        let mut io = self.io.lock().await;
        self.write_line(&mut io, &payload).await?;

        loop {
            let mut line = String::new();
            let read = io
                .reader
                .read_line(&mut line)
                .await
                .map_err(|e| self.transport_err(e))?;
            if read == 0 {
                self.closed.store(true, Ordering::SeqCst);
                return Err(self.transport_err("connection closed by source"));
            }

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            let Ok(response) = serde_json::from_str::<JsonRpcResponse>(trimmed) else {
                tracing::trace!(source = %self.source_id, line = %trimmed, "Skipping non-response line");
                continue;
            };
            if response.id != RpcId::Number(id) {
                continue;
            }
            return into_result(&self.source_id, response);
        }
    }

    async fn notify(&self, method: &str, params: Option<Value>) -> Result<(), SourceError> {
        self.ensure_open()?;
        let notification = JsonRpcNotification::new(method, params);
        let payload = serde_json::to_string(&notification).map_err(|e| self.transport_err(e))?;
        let mut io = self.io.lock().await;
        self.write_line(&mut io, &payload).await
    }

    async fn close(&self) -> Result<(), SourceError> {
        self.closed.store(true, Ordering::SeqCst);
        if let Some(mut child) = self.child.lock().await.take() {
            tracing::info!(source = %self.source_id, "Stopping tool source process");
            let _ = child.kill().await;
        }
        Ok(())
    }

    fn kind(&self) -> &'static str {
        self.label
    }
}

/// A transport over a spawned child's stdin/stdout.
pub type StdioTransport = LineTransport<tokio::process::ChildStdout, tokio::process::ChildStdin>;

/// Spawn a tool source process and connect to its standard streams.
pub fn spawn_stdio(
    source_id: &str,
    command: &str,
    args: &[String],
    env: &HashMap<String, String>,
) -> Result<StdioTransport, SourceError> {
    tracing::info!(source = %source_id, command = %command, "Spawning tool source process");

    let mut child = Command::new(command)
        .args(args)
        .envs(env)
        .stdin(std::process::Stdio::piped())
        .stdout(std::process::Stdio::piped())
        .stderr(std::process::Stdio::inherit())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| SourceError::Transport {
            source_id: source_id.to_string(),
            reason: format!("failed to spawn '{command}': {e}"),
        })?;

    let stdin = child.stdin.take().ok_or_else(|| SourceError::Transport {
        source_id: source_id.to_string(),
        reason: "failed to capture stdin".into(),
    })?;
    let stdout = child.stdout.take().ok_or_else(|| SourceError::Transport {
        source_id: source_id.to_string(),
        reason: "failed to capture stdout".into(),
    })?;

    let mut transport = LineTransport::new(source_id, stdout, stdin);
    transport.child = Mutex::new(Some(child));
    transport.label = "stdio";
    Ok(transport)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::spawn_fake_source;
    use crate::types::RemoteToolInfo;

    #[tokio::test]
    async fn request_returns_matching_result() {
        let transport = spawn_fake_source("fake", vec![RemoteToolInfo::new("search")]);
        let result = transport.request("tools/list", None).await.unwrap();
        assert_eq!(result["tools"][0]["name"], "search");
    }

    #[tokio::test]
    async fn rpc_errors_are_typed() {
        let transport = spawn_fake_source("fake", vec![]);
        let err = transport.request("no/such/method", None).await.unwrap_err();
        match err {
            SourceError::Rpc { source_id, code, .. } => {
                assert_eq!(source_id, "fake");
                assert_eq!(code, crate::types::error_codes::METHOD_NOT_FOUND);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn closed_transport_rejects_requests() {
        let transport = spawn_fake_source("fake", vec![]);
        transport.close().await.unwrap();
        assert!(matches!(
            transport.request("ping", None).await,
            Err(SourceError::NotConnected(_))
        ));
    }

    #[tokio::test]
    async fn spawn_missing_binary_fails() {
        let err = spawn_stdio(
            "ghost",
            "/definitely/not/a/binary",
            &[],
            &HashMap::new(),
        )
        .err()
        .unwrap();
        assert!(matches!(err, SourceError::Transport { .. }));
    }
}

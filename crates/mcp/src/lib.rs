//! Remote tool sources for Loopwright.
//!
//! A remote source is an external process or server that exposes callable
//! tools over JSON-RPC 2.0 (`initialize`, `tools/list`, `tools/call`,
//! `ping`). The [`RemoteSourceManager`] connects to sources over stdio or
//! HTTP, registers their tools in the shared registry under
//! `<source>__<tool>`, and keeps that registration current.

pub mod client;
pub mod http;
pub mod manager;
pub mod remote_tool;
pub mod schema;
pub mod transport;
pub mod types;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use client::SourceClient;
pub use http::HttpTransport;
pub use manager::{RemoteSourceManager, SyncReport};
pub use remote_tool::RemoteTool;
pub use transport::{LineTransport, SourceTransport, StdioTransport, spawn_stdio};

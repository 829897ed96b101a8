//! Error types for the Loopwright domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error enum; [`Error`] unifies them.

use thiserror::Error;

/// The top-level error type for all Loopwright operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- LLM client errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Tool errors ---
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    // --- Model output that violates the think/act protocol ---
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    // --- Session persistence / concurrency ---
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    // --- Remote tool sources ---
    #[error("Tool source error: {0}")]
    Source(#[from] SourceError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

#[derive(Debug, Clone, Error)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Tool execution failed: {tool_name}: {reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),

    #[error("Tool source unavailable: {0}")]
    SourceUnavailable(String),
}

/// Why a model response could not be decoded into a protocol step.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolFailure {
    #[error("response is empty")]
    Empty,

    #[error("no balanced JSON object found")]
    NoJsonObject,

    #[error("malformed JSON: {0}")]
    MalformedJson(String),

    #[error("missing field `{0}`")]
    MissingField(&'static str),

    #[error("field `{field}` must be {expected}")]
    WrongType {
        field: &'static str,
        expected: &'static str,
    },

    #[error("unknown action type `{0}`")]
    UnknownActionType(String),

    #[error("tool action requires a non-empty name")]
    EmptyToolName,
}

/// A model response that violates the think/act wire protocol.
///
/// Carries the original text so the failure can be audited.
#[derive(Debug, Clone, Error)]
#[error("Protocol parse error: {reason}")]
pub struct ProtocolError {
    pub reason: ProtocolFailure,
    pub raw: String,
}

impl ProtocolError {
    pub fn new(reason: ProtocolFailure, raw: impl Into<String>) -> Self {
        Self {
            reason,
            raw: raw.into(),
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum SessionError {
    #[error("Session not found: {0}")]
    NotFound(String),

    #[error("Version conflict on session {conversation_id}: expected version {expected}")]
    VersionConflict {
        conversation_id: String,
        expected: i64,
    },

    #[error("Session already exists: {0}")]
    AlreadyExists(String),

    #[error("Message sequence {seq} is not after {last} for session {conversation_id}")]
    SequenceOutOfOrder {
        conversation_id: String,
        seq: i64,
        last: i64,
    },

    #[error("Storage error: {0}")]
    Storage(String),
}

#[derive(Debug, Clone, Error)]
pub enum SourceError {
    #[error("Tool source not connected: {0}")]
    NotConnected(String),

    #[error("Tool source already registered: {0}")]
    AlreadyRegistered(String),

    #[error("Transport failure on {source_id}: {reason}")]
    Transport { source_id: String, reason: String },

    #[error("Handshake with {source_id} failed: {reason}")]
    Handshake { source_id: String, reason: String },

    #[error("RPC error from {source_id}: {message} (code {code})")]
    Rpc {
        source_id: String,
        code: i64,
        message: String,
    },

    #[error("Invalid response from {source_id}: {reason}")]
    InvalidResponse { source_id: String, reason: String },
}

//! # Loopwright Core
//!
//! Domain types, traits, and error definitions for the Loopwright agent kernel.
//! This crate has **no framework dependencies**: it defines the domain model
//! that every other crate implements against.
//!
//! ## Design Philosophy
//!
//! Every collaborator the kernel talks to is a trait here: the LLM client,
//! callable tools, and the session store. Implementations live in their
//! own crates. This enables:
//! - Swapping implementations via configuration
//! - Easy testing with scripted/stub implementations
//! - Clean dependency graph (all crates depend inward on core)

pub mod error;
pub mod event;
pub mod llm;
pub mod message;
pub mod namespace;
pub mod session;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use error::{Error, ProtocolError, ProtocolFailure, Result};
pub use event::{DomainEvent, EventBus};
pub use llm::{CompletionRequest, CompletionResponse, LlmClient, ToolChoice, ToolDefinition};
pub use message::{Message, MessageToolCall, Role};
pub use session::{AgentDefinition, MessageRecord, SessionRecord, SessionStore};
pub use tool::{Tool, ToolCall, ToolRegistry, ToolResult};

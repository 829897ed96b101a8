//! LLM client implementations for Loopwright.
//!
//! All clients implement the `loopwright_core::LlmClient` trait.

pub mod openai_compat;

pub use openai_compat::OpenAiCompatClient;

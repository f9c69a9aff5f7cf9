//! Quill text-generation infrastructure adapters.
//!
//! Implements the [`pipeline::TextGenerator`] trait for OpenAI-compatible
//! chat-completions endpoints and for Anthropic's messages API, plus a
//! [`RetryingGenerator`] decorator. Additional providers are added as new
//! modules here without any change to the `pipeline` or `nodes` crates.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** All HTTP transport, request formatting, response
//! parsing, status mapping and back-off live here. The stages see only
//! [`pipeline::TextGenerator`] and [`pipeline::GenerationError`].

pub mod anthropic;
mod http;
pub mod openai;
pub mod retry;

pub use anthropic::{AnthropicConfig, AnthropicProvider};
pub use openai::{OpenAiConfig, OpenAiProvider};
pub use retry::RetryingGenerator;

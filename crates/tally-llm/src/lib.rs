//! Tally LLM - provider abstraction for the tally gateway
//!
//! This crate provides LLM integration:
//! - Router: provider trait definition and model-id based routing
//! - OpenAI: GPT family (chat completions API)
//! - Anthropic: Claude family (messages API)
//! - Gemini: Google Gemini family (generateContent API)
//! - Groq: hosted open models (OpenAI-compatible API)
//! - Catalog: the static model list served by the models endpoint

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod anthropic;
pub mod catalog;
pub mod completion;
pub mod error;
pub mod gemini;
pub mod groq;
pub mod message;
pub mod openai;
pub mod provider;
pub mod router;
mod util;

pub use catalog::{model_catalog, ModelEntry, ProviderFamily};
pub use completion::{CompletionRequest, CompletionResponse, TokenUsage};
pub use error::{Error, Result};
pub use message::{Message, MessageRole};
pub use provider::LlmProvider;
pub use router::{LlmRouter, ProviderConfig, RouterConfig};

pub use anthropic::{AnthropicConfig, AnthropicProvider};
pub use gemini::{GeminiConfig, GeminiProvider};
pub use groq::{GroqConfig, GroqProvider};
pub use openai::{OpenAiConfig, OpenAiProvider};

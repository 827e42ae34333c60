//! Language-model backends for DocQA
//!
//! This crate provides the two interchangeable `ChatClient` implementations
//! (a local Ollama server and a hosted OpenAI-compatible API) and the Ollama
//! embedding endpoint as an `Embedder`.

mod config;
mod lines;
mod ollama;
mod openai;


pub use config::{OllamaConfig, OpenAiConfig};
pub use lines::{byte_lines, sse_data};
pub use ollama::{OllamaClient, OllamaEmbedder};
pub use openai::OpenAiClient;

// Re-export core types for convenience
pub use docqa_core::{Backend, ChatClient, ChatTurn, Embedder, Error, Result, TextStream};

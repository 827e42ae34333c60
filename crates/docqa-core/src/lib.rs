//! Core traits and types for DocQA
//!
//! This crate defines the capability-facing interfaces shared by the rest of the
//! workspace: chat clients for language-model backends, embedding providers and
//! evidence stores. Concrete backends live in `docqa-llm` and `docqa-rag`, which
//! keeps the orchestration code testable against in-process doubles.

pub mod embedder;
pub mod error;
pub mod evidence;
pub mod llm;

#[cfg(test)]
mod tests;

pub use embedder::Embedder;
pub use error::{Error, Result};
pub use evidence::{EvidenceStore, Passage, PLACEHOLDER_CONTENT};
pub use llm::{collect_text, Backend, ChatClient, ChatTurn, TextStream, DEFAULT_TEMPERATURE};

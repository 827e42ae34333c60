//! Question answering orchestration for DocQA
//!
//! Ties the language-model backends and the retrieval layer together:
//! keyword extraction, fair multi-keyword retrieval, answer prompting and
//! answer extraction, with a direct-answer fallback when no evidence exists.

mod config;
mod extraction;
mod keywords;
mod prompts;
mod responder;

#[cfg(test)]
mod tests;

pub use config::{FailureMode, ResponderConfig};
pub use extraction::{AnswerExtractor, AnswerPattern, MarkerAnswer, TaggedAnswer};
pub use keywords::{parse_keywords, KeywordExtractor};
pub use prompts::PromptTemplate;
pub use responder::{
    connect_client, connect_store, ContextualResponder, Response, Stage, DIRECT_SYSTEM_PROMPT,
};

// Re-export core types for convenience
pub use docqa_core::{
    Backend, ChatClient, ChatTurn, Error, EvidenceStore, Passage, Result, DEFAULT_TEMPERATURE,
};
pub use docqa_rag::DEFAULT_BUDGET;

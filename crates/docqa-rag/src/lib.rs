//! Retrieval layer for DocQA
//!
//! This crate provides the evidence stores (Qdrant and in-process), the
//! hashed-feature embedder, the multi-keyword retriever with its fair
//! allocation policy, context assembly and the passage feeder.

mod context;
mod embedder;
mod feeder;
mod retriever;
mod store;


pub use context::build_context;
pub use embedder::HashEmbedder;
pub use feeder::{split_text, PassageFeeder};
pub use retriever::{merge_fair, Allocation, MultiKeywordRetriever, DEFAULT_BUDGET};
pub use store::{passage_id, LocalEvidenceStore, QdrantEvidenceStore};

// Re-export core types for convenience
pub use docqa_core::{Embedder, Error, EvidenceStore, Passage, Result, PLACEHOLDER_CONTENT};

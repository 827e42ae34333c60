//! Evidence store backends

mod local;
mod qdrant;

pub use local::LocalEvidenceStore;
pub use qdrant::QdrantEvidenceStore;

use uuid::Uuid;

/// Stable point id derived from passage content.
///
/// Re-feeding the same text overwrites the existing point instead of
/// duplicating it, which also keeps the placeholder seed idempotent.
pub fn passage_id(content: &str) -> String {
    Uuid::from_bytes(md5::compute(content.as_bytes()).0).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_passage_id_is_content_derived() {
        assert_eq!(passage_id("same text"), passage_id("same text"));
        assert_ne!(passage_id("same text"), passage_id("other text"));
        assert!(Uuid::parse_str(&passage_id("same text")).is_ok());
    }
}

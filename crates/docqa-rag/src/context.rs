//! Context block assembly

use docqa_core::Passage;

/// Render passages as one numbered context block.
///
/// Each passage becomes `"Document {i}:\n{content}\n"` (1-indexed) and the
/// parts are separated by a blank line.
pub fn build_context(passages: &[Passage]) -> String {
    passages
        .iter()
        .enumerate()
        .map(|(i, passage)| format!("Document {}:\n{}\n", i + 1, passage.content))
        .collect::<Vec<_>>()
        .join("\n")
}

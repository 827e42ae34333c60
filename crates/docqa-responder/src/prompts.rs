//! Prompt templates with `{{...}}` placeholders

use std::path::Path;

/// A prompt template loaded once and rendered per request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    text: String,
}

impl PromptTemplate {
    pub const USER_QUERY: &'static str = "{{USER_QUERY}}";
    pub const CONTEXT: &'static str = "{{CONTEXT}}";

    pub const KEYWORD_FALLBACK: &'static str = "Extract the most important keywords from this query: {{USER_QUERY}}\n\nOutput only the keywords as a comma-separated list.";
    pub const ANSWER_FALLBACK: &'static str = "Answer the following question based on the provided context:\n\nContext: {{CONTEXT}}\n\nQuestion: {{USER_QUERY}}\n\nAnswer:";

    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    /// Read a template file, using `fallback` when it cannot be read
    pub fn load(path: impl AsRef<Path>, fallback: &str) -> Self {
        let path = path.as_ref();
        match std::fs::read_to_string(path) {
            Ok(text) => {
                tracing::debug!(path = %path.display(), "Loaded prompt template");
                Self::new(text)
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "Could not read prompt template, using built-in fallback"
                );
                Self::new(fallback)
            }
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Keyword prompt for `query`
    pub fn render_query(&self, query: &str) -> String {
        self.text.replace(Self::USER_QUERY, query)
    }

    /// Answer prompt for `query` over `context`.
    ///
    /// The context is substituted first, so a `{{USER_QUERY}}` token that
    /// appears inside retrieved text is replaced as well.
    pub fn render_answer(&self, context: &str, query: &str) -> String {
        self.text
            .replace(Self::CONTEXT, context)
            .replace(Self::USER_QUERY, query)
    }
}

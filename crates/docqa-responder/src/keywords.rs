//! Keyword extraction through the chat model

use std::sync::Arc;

use regex::Regex;

use docqa_core::{ChatClient, ChatTurn, Error, Result};

use crate::config::FailureMode;
use crate::prompts::PromptTemplate;

/// Split model output into keywords.
///
/// Reads the first `<keywords>...</keywords>` block (may span lines). Without
/// one, the whole response is split on commas. Terms are trimmed and empty
/// terms dropped; duplicates are kept.
pub fn parse_keywords(response: &str) -> Vec<String> {
    KeywordParser::new()
        .map(|parser| parser.parse(response))
        .unwrap_or_else(|_| split_terms(response))
}

struct KeywordParser {
    tagged: Regex,
}

impl KeywordParser {
    fn new() -> Result<Self> {
        let tagged = Regex::new(r"(?s)<keywords>(.*?)</keywords>")
            .map_err(|e| Error::Template(format!("invalid keyword pattern: {}", e)))?;
        Ok(Self { tagged })
    }

    fn parse(&self, response: &str) -> Vec<String> {
        match self.tagged.captures(response).and_then(|c| c.get(1)) {
            Some(inner) => split_terms(inner.as_str()),
            None => {
                tracing::warn!("No <keywords> tag in model output, splitting raw response");
                split_terms(response)
            }
        }
    }
}

fn split_terms(text: &str) -> Vec<String> {
    text.split(',')
        .map(str::trim)
        .filter(|term| !term.is_empty())
        .map(str::to_string)
        .collect()
}

/// Asks the chat model for the salient search terms of a query
pub struct KeywordExtractor {
    client: Arc<dyn ChatClient>,
    model: String,
    template: PromptTemplate,
    failure_mode: FailureMode,
    parser: KeywordParser,
}

impl KeywordExtractor {
    pub fn new(
        client: Arc<dyn ChatClient>,
        model: impl Into<String>,
        template: PromptTemplate,
        failure_mode: FailureMode,
    ) -> Result<Self> {
        Ok(Self {
            client,
            model: model.into(),
            template,
            failure_mode,
            parser: KeywordParser::new()?,
        })
    }

    /// Extract keywords for `query`.
    ///
    /// Malformed model output never fails; a failed model call follows the
    /// configured failure mode.
    pub async fn extract(&self, query: &str) -> Result<Vec<String>> {
        let turn = ChatTurn::user(self.template.render_query(query));
        let reply = self.client.chat_sync(&self.model, &turn).await;
        let response = self.failure_mode.settle(reply)?;

        let keywords = self.parser.parse(&response);
        tracing::debug!(?keywords, "Extracted keywords");
        Ok(keywords)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tagged_keywords() {
        assert_eq!(
            parse_keywords("Sure!\n<keywords>\n rust , tokio,async runtime \n</keywords> done"),
            vec!["rust", "tokio", "async runtime"]
        );
    }

    #[test]
    fn test_first_tag_wins() {
        assert_eq!(
            parse_keywords("<keywords>a, b</keywords><keywords>c</keywords>"),
            vec!["a", "b"]
        );
    }

    #[test]
    fn test_untagged_falls_back_to_comma_split() {
        assert_eq!(
            parse_keywords("Keywords are: qdrant, vectors"),
            vec!["Keywords are: qdrant", "vectors"]
        );
    }

    #[test]
    fn test_empty_terms_dropped() {
        assert!(parse_keywords("<keywords> , ,</keywords>").is_empty());
        assert!(parse_keywords("").is_empty());
    }
}

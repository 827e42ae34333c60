//! Answer extraction from raw model output

use regex::Regex;

use docqa_core::{Error, Result};

/// One way of locating the answer inside a model response
pub trait AnswerPattern: Send + Sync {
    fn name(&self) -> &'static str;

    /// The answer text, or `None` when this pattern does not apply
    fn extract(&self, response: &str) -> Option<String>;
}

fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| Error::Template(format!("invalid answer pattern: {}", e)))
}

fn first_group(re: &Regex, response: &str) -> Option<String> {
    re.captures(response)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|text| !text.is_empty())
}

/// Content of the first `<answer>...</answer>` block
pub struct TaggedAnswer {
    re: Regex,
}

impl TaggedAnswer {
    pub fn new() -> Result<Self> {
        Ok(Self {
            re: compile(r"(?s)<answer>(.*?)</answer>")?,
        })
    }
}

impl AnswerPattern for TaggedAnswer {
    fn name(&self) -> &'static str {
        "tagged"
    }

    fn extract(&self, response: &str) -> Option<String> {
        first_group(&self.re, response)
    }
}

/// Everything after the first `Answer:` or `Response:` marker (case-sensitive)
pub struct MarkerAnswer {
    re: Regex,
}

impl MarkerAnswer {
    pub fn new() -> Result<Self> {
        Ok(Self {
            re: compile(r"(?s)(?:Answer|Response):\s*(.*)")?,
        })
    }
}

impl AnswerPattern for MarkerAnswer {
    fn name(&self) -> &'static str {
        "marker"
    }

    fn extract(&self, response: &str) -> Option<String> {
        first_group(&self.re, response)
    }
}

/// Ordered chain of answer patterns; the raw response is the final fallback
pub struct AnswerExtractor {
    patterns: Vec<Box<dyn AnswerPattern>>,
}

impl AnswerExtractor {
    /// Tagged answer first, then the marker
    pub fn new() -> Result<Self> {
        Ok(Self::with_patterns(vec![
            Box::new(TaggedAnswer::new()?),
            Box::new(MarkerAnswer::new()?),
        ]))
    }

    pub fn with_patterns(patterns: Vec<Box<dyn AnswerPattern>>) -> Self {
        Self { patterns }
    }

    pub fn extract(&self, response: &str) -> String {
        for pattern in &self.patterns {
            if let Some(answer) = pattern.extract(response) {
                tracing::debug!(pattern = pattern.name(), "Answer extracted");
                return answer;
            }
        }
        tracing::debug!("No answer pattern matched, using raw response");
        response.to_string()
    }
}

//! Responder configuration

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::Serialize;

use docqa_core::{Backend, Error, Result};

const DEFAULT_COLLECTION: &str = "documents";
const DEFAULT_KEYWORD_PROMPT: &str = "./prompts/keyword_extractor.md";
const DEFAULT_CONTEXT_PROMPT: &str = "./prompts/context_based_query.md";
const DEFAULT_QDRANT_URL: &str = "http://localhost:6333";
const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
const DEFAULT_EMBED_MODEL: &str = "all-minilm";
const DEFAULT_EMBED_DIMENSIONS: usize = 384;
const DEFAULT_LOCAL_STORE_DIR: &str = "./.docqa";

/// How a failed model call reaches the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureMode {
    /// Return the typed error
    Surface,
    /// Render the error as `"Error: {message}"` and continue with it as model text
    InBand,
}

impl FailureMode {
    /// Apply this mode to the outcome of one model call
    pub fn settle(self, reply: Result<String>) -> Result<String> {
        match (self, reply) {
            (_, Ok(text)) => Ok(text),
            (FailureMode::Surface, Err(e)) => Err(e),
            (FailureMode::InBand, Err(e)) => {
                tracing::warn!(error = %e, "Model call failed, continuing with error text");
                Ok(format!("Error: {}", e))
            }
        }
    }
}

impl Default for FailureMode {
    fn default() -> Self {
        if cfg!(feature = "inband-errors") {
            FailureMode::InBand
        } else {
            FailureMode::Surface
        }
    }
}

impl fmt::Display for FailureMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureMode::Surface => write!(f, "surface"),
            FailureMode::InBand => write!(f, "inband"),
        }
    }
}

impl FromStr for FailureMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "surface" => Ok(FailureMode::Surface),
            "inband" | "in-band" => Ok(FailureMode::InBand),
            other => Err(Error::Configuration(format!(
                "unknown failure mode '{}', expected 'surface' or 'inband'",
                other
            ))),
        }
    }
}

/// Everything a `ContextualResponder` is built from.
///
/// Fixed for the lifetime of a responder; build a new responder to change it.
#[derive(Debug, Clone, Serialize)]
pub struct ResponderConfig {
    pub model: String,
    pub collection: String,
    pub keyword_prompt_path: PathBuf,
    pub context_prompt_path: PathBuf,
    pub backend: Backend,
    pub failure_mode: FailureMode,
    pub qdrant_url: String,
    pub ollama_url: String,
    pub embed_model: String,
    pub embed_dimensions: usize,
    /// Use the in-process store instead of Qdrant
    pub local_store: bool,
    /// Directory holding one JSON file per local collection
    pub local_store_dir: PathBuf,
}

impl Default for ResponderConfig {
    fn default() -> Self {
        Self {
            model: Backend::Ollama.default_model().to_string(),
            collection: DEFAULT_COLLECTION.to_string(),
            keyword_prompt_path: PathBuf::from(DEFAULT_KEYWORD_PROMPT),
            context_prompt_path: PathBuf::from(DEFAULT_CONTEXT_PROMPT),
            backend: Backend::default(),
            failure_mode: FailureMode::default(),
            qdrant_url: DEFAULT_QDRANT_URL.to_string(),
            ollama_url: DEFAULT_OLLAMA_URL.to_string(),
            embed_model: DEFAULT_EMBED_MODEL.to_string(),
            embed_dimensions: DEFAULT_EMBED_DIMENSIONS,
            local_store: false,
            local_store_dir: PathBuf::from(DEFAULT_LOCAL_STORE_DIR),
        }
    }
}

impl ResponderConfig {
    /// Create configuration from environment variables (after loading `.env`)
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create configuration from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let backend = match get("DOCQA_BACKEND") {
            Some(raw) => raw.parse()?,
            None => defaults.backend,
        };
        let failure_mode = match get("DOCQA_FAILURE_MODE") {
            Some(raw) => raw.parse()?,
            None => defaults.failure_mode,
        };
        let embed_dimensions = match get("DOCQA_EMBED_DIM") {
            Some(raw) => raw.trim().parse::<usize>().map_err(|_| {
                Error::Configuration(format!("DOCQA_EMBED_DIM must be a positive integer, got '{}'", raw))
            })?,
            None => defaults.embed_dimensions,
        };

        let config = Self {
            model: get("DOCQA_MODEL").unwrap_or(defaults.model),
            collection: get("DOCQA_COLLECTION").unwrap_or(defaults.collection),
            keyword_prompt_path: get("DOCQA_KEYWORD_PROMPT")
                .map(PathBuf::from)
                .unwrap_or(defaults.keyword_prompt_path),
            context_prompt_path: get("DOCQA_CONTEXT_PROMPT")
                .map(PathBuf::from)
                .unwrap_or(defaults.context_prompt_path),
            backend,
            failure_mode,
            qdrant_url: get("QDRANT_URL").unwrap_or(defaults.qdrant_url),
            ollama_url: get("OLLAMA_HOST").unwrap_or(defaults.ollama_url),
            embed_model: get("DOCQA_EMBED_MODEL").unwrap_or(defaults.embed_model),
            embed_dimensions,
            local_store: false,
            local_store_dir: get("DOCQA_LOCAL_STORE_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.local_store_dir),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.model.trim().is_empty() {
            return Err(Error::Configuration("model must not be empty".to_string()));
        }
        if self.collection.trim().is_empty() {
            return Err(Error::Configuration("collection must not be empty".to_string()));
        }
        if self.embed_dimensions == 0 {
            return Err(Error::Configuration("embedding dimension must be positive".to_string()));
        }
        Ok(())
    }

    /// File the local store for this collection is persisted to
    pub fn local_store_file(&self) -> PathBuf {
        self.local_store_dir.join(format!("{}.json", self.collection))
    }

    /// Model actually sent to the backend.
    ///
    /// The hosted backend cannot serve the local default model, so it is
    /// swapped for the hosted default.
    pub fn effective_model(&self) -> &str {
        if self.backend == Backend::OpenAi && self.model == Backend::Ollama.default_model() {
            Backend::OpenAi.default_model()
        } else {
            &self.model
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_without_variables() {
        let config = ResponderConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.model, "llama3:8b");
        assert_eq!(config.collection, "documents");
        assert_eq!(config.backend, Backend::Ollama);
        assert_eq!(config.embed_dimensions, 384);
        assert_eq!(config.effective_model(), "llama3:8b");
        assert_eq!(config.local_store_file(), PathBuf::from("./.docqa/documents.json"));
    }

    #[test]
    fn test_local_store_dir_from_variable() {
        let config = ResponderConfig::from_lookup(lookup(&[
            ("DOCQA_LOCAL_STORE_DIR", "/var/lib/docqa"),
            ("DOCQA_COLLECTION", "manuals"),
        ]))
        .unwrap();
        assert_eq!(config.local_store_file(), PathBuf::from("/var/lib/docqa/manuals.json"));
    }

    #[test]
    fn test_hosted_backend_swaps_default_model() {
        let config = ResponderConfig::from_lookup(lookup(&[("DOCQA_BACKEND", "openai")])).unwrap();
        assert_eq!(config.effective_model(), "gpt-3.5-turbo");

        let config = ResponderConfig::from_lookup(lookup(&[
            ("DOCQA_BACKEND", "openai"),
            ("DOCQA_MODEL", "gpt-4o-mini"),
        ]))
        .unwrap();
        assert_eq!(config.effective_model(), "gpt-4o-mini");
    }

    #[test]
    fn test_invalid_values_are_configuration_errors() {
        assert!(matches!(
            ResponderConfig::from_lookup(lookup(&[("DOCQA_BACKEND", "watsonx")])),
            Err(Error::Configuration(_))
        ));
        assert!(matches!(
            ResponderConfig::from_lookup(lookup(&[("DOCQA_EMBED_DIM", "many")])),
            Err(Error::Configuration(_))
        ));
        assert!(matches!(
            ResponderConfig::from_lookup(lookup(&[("DOCQA_EMBED_DIM", "0")])),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn test_failure_mode_settle() {
        let failed = || Err(Error::LLMProvider("connection refused".to_string()));

        assert!(FailureMode::Surface.settle(failed()).is_err());
        assert_eq!(
            FailureMode::InBand.settle(failed()).unwrap(),
            "Error: LLM provider error: connection refused"
        );
        assert_eq!(
            FailureMode::Surface.settle(Ok("fine".to_string())).unwrap(),
            "fine"
        );
        assert_eq!("in-band".parse::<FailureMode>().unwrap(), FailureMode::InBand);
    }
}

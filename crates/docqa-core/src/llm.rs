//! Chat client trait and types

use std::fmt;
use std::pin::Pin;
use std::str::FromStr;

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Sampling temperature used when a caller does not pick one
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

/// Lazily produced text fragments of one model reply.
///
/// The stream is finite and not restartable; dropping it releases the
/// underlying connection.
pub type TextStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// Which family of language-model backend serves the chat requests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Local inference server (Ollama)
    #[default]
    Ollama,
    /// Hosted OpenAI-compatible API
    OpenAi,
}

impl Backend {
    /// Model used when the caller does not name one
    pub fn default_model(self) -> &'static str {
        match self {
            Backend::Ollama => "llama3:8b",
            Backend::OpenAi => "gpt-3.5-turbo",
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backend::Ollama => write!(f, "ollama"),
            Backend::OpenAi => write!(f, "openai"),
        }
    }
}

impl FromStr for Backend {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "ollama" | "local" => Ok(Backend::Ollama),
            "openai" | "hosted" => Ok(Backend::OpenAi),
            other => Err(Error::Configuration(format!(
                "unknown backend '{}', expected 'ollama' or 'openai'",
                other
            ))),
        }
    }
}

/// One single-turn request to a chat model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatTurn {
    pub system: Option<String>,
    pub user: String,
    pub temperature: f32,
    pub stream: bool,
}

impl ChatTurn {
    /// A user message with default temperature, streamed
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            system: None,
            user: content.into(),
            temperature: DEFAULT_TEMPERATURE,
            stream: true,
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_stream(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }
}

/// Trait for language-model backends (e.g., Ollama, OpenAI)
///
/// Failures are reported through `Result`; callers decide whether to surface
/// them or to render them as text.
#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Send a chat turn and return the reply as a stream of fragments
    async fn chat(&self, model: &str, turn: &ChatTurn) -> Result<TextStream>;

    /// Send a chat turn and return the complete reply
    async fn chat_sync(&self, model: &str, turn: &ChatTurn) -> Result<String> {
        let stream = self.chat(model, turn).await?;
        collect_text(stream, |_| {}).await
    }

    /// Backend family of this client
    fn backend(&self) -> Backend;
}

/// Fold a fragment stream into the full reply, handing each fragment to
/// `on_fragment` as it arrives.
pub async fn collect_text<F>(mut stream: TextStream, mut on_fragment: F) -> Result<String>
where
    F: FnMut(&str) + Send,
{
    let mut text = String::new();
    while let Some(fragment) = stream.next().await {
        let fragment = fragment?;
        on_fragment(&fragment);
        text.push_str(&fragment);
    }
    tracing::debug!(chars = text.len(), "collected chat reply");
    Ok(text)
}

//! Response orchestration: keywords, retrieval, prompting and extraction

use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use docqa_core::{
    Backend, ChatClient, ChatTurn, EvidenceStore, Passage, Result, DEFAULT_TEMPERATURE,
};
use docqa_llm::{OllamaClient, OllamaConfig, OllamaEmbedder, OpenAiClient};
use docqa_rag::{
    build_context, HashEmbedder, LocalEvidenceStore, MultiKeywordRetriever, QdrantEvidenceStore,
};

use crate::config::ResponderConfig;
use crate::extraction::AnswerExtractor;
use crate::keywords::KeywordExtractor;
use crate::prompts::PromptTemplate;

/// System instruction for answers given without retrieved evidence
pub const DIRECT_SYSTEM_PROMPT: &str =
    "You are a helpful AI assistant. Answer the user's question to the best of your ability.";

/// Steps one request passes through, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Received,
    KeywordsExtracted,
    Retrieved,
    DirectAnswer,
    ContextBuilt,
    Prompted,
    Responded,
    AnswerExtracted,
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Received => "received",
            Stage::KeywordsExtracted => "keywords_extracted",
            Stage::Retrieved => "retrieved",
            Stage::DirectAnswer => "direct_answer",
            Stage::ContextBuilt => "context_built",
            Stage::Prompted => "prompted",
            Stage::Responded => "responded",
            Stage::AnswerExtracted => "answer_extracted",
            Stage::Done => "done",
        };
        write!(f, "{}", name)
    }
}

/// Outcome of one `get_response` call
#[derive(Debug, Clone, Serialize)]
pub struct Response {
    pub answer: String,
    /// Exact prompt sent for the final answer, when a trace was requested
    pub full_prompt: Option<String>,
    pub keywords: Vec<String>,
    pub passages: Vec<Passage>,
    /// Answered without evidence
    pub direct: bool,
}

impl Response {
    pub fn into_parts(self) -> (String, Option<String>) {
        (self.answer, self.full_prompt)
    }
}

/// Build the chat client selected by `config`.
///
/// A hosted backend without credentials is accepted here; its requests fail later.
pub fn connect_client(config: &ResponderConfig) -> Result<Arc<dyn ChatClient>> {
    let client: Arc<dyn ChatClient> = match config.backend {
        Backend::Ollama => Arc::new(OllamaClient::new(OllamaConfig::new(&config.ollama_url))?),
        Backend::OpenAi => Arc::new(OpenAiClient::from_env()?),
    };
    Ok(client)
}

/// Connect the evidence store selected by `config`. Fails when the store is unreachable.
pub async fn connect_store(config: &ResponderConfig) -> Result<Arc<dyn EvidenceStore>> {
    if config.local_store {
        let embedder = Arc::new(HashEmbedder::new(config.embed_dimensions));
        let store =
            LocalEvidenceStore::open(config.local_store_file(), &config.collection, embedder)
                .await?;
        return Ok(Arc::new(store));
    }

    let embedder = Arc::new(OllamaEmbedder::new(
        OllamaConfig::new(&config.ollama_url),
        &config.embed_model,
        config.embed_dimensions,
    )?);
    let store = QdrantEvidenceStore::connect(&config.qdrant_url, &config.collection, embedder).await?;
    Ok(Arc::new(store))
}

/// Answers questions from retrieved evidence, falling back to a direct answer
pub struct ContextualResponder {
    config: ResponderConfig,
    model: String,
    client: Arc<dyn ChatClient>,
    keywords: KeywordExtractor,
    retriever: MultiKeywordRetriever,
    answer_template: PromptTemplate,
    extractor: AnswerExtractor,
}

impl ContextualResponder {
    /// Build the client and store from `config` and assemble a responder
    pub async fn connect(config: ResponderConfig) -> Result<Self> {
        config.validate()?;
        let client = connect_client(&config)?;
        let store = connect_store(&config).await?;
        Self::new(config, client, store)
    }

    /// Assemble a responder from ready-made parts. Templates are read once here.
    pub fn new(
        config: ResponderConfig,
        client: Arc<dyn ChatClient>,
        store: Arc<dyn EvidenceStore>,
    ) -> Result<Self> {
        let model = config.effective_model().to_string();
        if model != config.model {
            tracing::info!(from = %config.model, to = %model, "Using hosted default model");
        }

        let keyword_template =
            PromptTemplate::load(&config.keyword_prompt_path, PromptTemplate::KEYWORD_FALLBACK);
        let answer_template =
            PromptTemplate::load(&config.context_prompt_path, PromptTemplate::ANSWER_FALLBACK);

        let keywords = KeywordExtractor::new(
            client.clone(),
            model.clone(),
            keyword_template,
            config.failure_mode,
        )?;

        tracing::info!(
            backend = %config.backend,
            model = %model,
            collection = store.collection(),
            failure_mode = %config.failure_mode,
            "Responder ready"
        );

        Ok(Self {
            model,
            client,
            keywords,
            retriever: MultiKeywordRetriever::new(store),
            answer_template,
            extractor: AnswerExtractor::new()?,
            config,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn config(&self) -> &ResponderConfig {
        &self.config
    }

    pub fn keyword_extractor(&self) -> &KeywordExtractor {
        &self.keywords
    }

    pub fn retriever(&self) -> &MultiKeywordRetriever {
        &self.retriever
    }

    /// Answer `query` from at most `budget` passages.
    ///
    /// With `want_trace` the response carries the exact final prompt.
    pub async fn get_response(&self, query: &str, budget: usize, want_trace: bool) -> Result<Response> {
        enter(Stage::Received);

        let keywords = self.keywords.extract(query).await?;
        enter(Stage::KeywordsExtracted);
        tracing::info!(keywords = ?keywords, "Keywords extracted");

        let passages = self.retriever.retrieve(&keywords, budget).await;
        enter(Stage::Retrieved);

        if passages.is_empty() {
            return self.direct_answer(query, keywords, want_trace).await;
        }

        let context = build_context(&passages);
        enter(Stage::ContextBuilt);

        let prompt = self.answer_template.render_answer(&context, query);
        enter(Stage::Prompted);

        let turn = ChatTurn::user(prompt.as_str()).with_temperature(DEFAULT_TEMPERATURE);
        let raw = self
            .config
            .failure_mode
            .settle(self.client.chat_sync(&self.model, &turn).await)?;
        enter(Stage::Responded);

        let answer = self.extractor.extract(&raw);
        enter(Stage::AnswerExtracted);
        enter(Stage::Done);

        Ok(Response {
            answer,
            full_prompt: want_trace.then_some(prompt),
            keywords,
            passages,
            direct: false,
        })
    }

    async fn direct_answer(
        &self,
        query: &str,
        keywords: Vec<String>,
        want_trace: bool,
    ) -> Result<Response> {
        enter(Stage::DirectAnswer);
        tracing::info!("No relevant passages, answering directly");

        let turn = ChatTurn::user(query)
            .with_system(DIRECT_SYSTEM_PROMPT)
            .with_temperature(DEFAULT_TEMPERATURE);
        let answer = self
            .config
            .failure_mode
            .settle(self.client.chat_sync(&self.model, &turn).await)?;
        enter(Stage::Done);

        Ok(Response {
            answer,
            full_prompt: want_trace
                .then(|| format!("System: {}\n\nUser: {}", DIRECT_SYSTEM_PROMPT, query)),
            keywords,
            passages: Vec::new(),
            direct: true,
        })
    }
}

fn enter(stage: Stage) {
    tracing::debug!(%stage, "Stage");
}

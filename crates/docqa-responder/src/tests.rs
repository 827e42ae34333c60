#[cfg(test)]
mod responder_tests {
    use std::collections::{HashMap, VecDeque};
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use futures::stream;

    use crate::*;
    use docqa_core::TextStream;
    use docqa_rag::PLACEHOLDER_CONTENT;

    /// Chat client replaying canned replies in order and recording each turn
    struct ScriptedClient {
        replies: Mutex<VecDeque<Result<String>>>,
        turns: Mutex<Vec<ChatTurn>>,
    }

    impl ScriptedClient {
        fn new(replies: Vec<Result<String>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
                turns: Mutex::new(Vec::new()),
            })
        }

        fn turns(&self) -> Vec<ChatTurn> {
            self.turns.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ChatClient for ScriptedClient {
        async fn chat(&self, _model: &str, turn: &ChatTurn) -> Result<TextStream> {
            self.turns.lock().unwrap().push(turn.clone());
            let reply = self
                .replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(Error::LLMProvider("no scripted reply".to_string())))?;
            Ok(Box::pin(stream::iter(vec![Ok(reply)])))
        }

        fn backend(&self) -> Backend {
            Backend::Ollama
        }
    }

    /// Store answering from a keyword -> contents map and counting lookups
    struct MapStore {
        responses: HashMap<String, Vec<String>>,
        lookups: Mutex<usize>,
    }

    impl MapStore {
        /// `(keyword, content)` pairs, contents kept in order per keyword
        fn new(pairs: &[(&str, &str)]) -> Arc<Self> {
            let mut responses: HashMap<String, Vec<String>> = HashMap::new();
            for (keyword, content) in pairs {
                responses
                    .entry(keyword.to_string())
                    .or_default()
                    .push(content.to_string());
            }
            Arc::new(Self {
                responses,
                lookups: Mutex::new(0),
            })
        }

        fn lookups(&self) -> usize {
            *self.lookups.lock().unwrap()
        }
    }

    #[async_trait]
    impl EvidenceStore for MapStore {
        async fn similarity_search(&self, text: &str, k: usize) -> Result<Vec<Passage>> {
            *self.lookups.lock().unwrap() += 1;
            Ok(self
                .responses
                .get(text)
                .map(|v| v.iter().take(k).map(Passage::new).collect())
                .unwrap_or_default())
        }

        async fn add_passages(&self, passages: Vec<Passage>) -> Result<usize> {
            Ok(passages.len())
        }

        fn collection(&self) -> &str {
            "test"
        }
    }

    fn config(failure_mode: FailureMode) -> ResponderConfig {
        ResponderConfig {
            keyword_prompt_path: "/nonexistent/docqa/keyword_extractor.md".into(),
            context_prompt_path: "/nonexistent/docqa/context_based_query.md".into(),
            failure_mode,
            ..Default::default()
        }
    }

    fn ok(text: &str) -> Result<String> {
        Ok(text.to_string())
    }

    #[tokio::test]
    async fn test_answer_from_evidence() {
        let client = ScriptedClient::new(vec![
            ok("<keywords>alpha, beta</keywords>"),
            ok("Reasoning first.\n<answer> Forty-two </answer>"),
        ]);
        let store = MapStore::new(&[
            ("alpha", "alpha fact"),
            ("alpha", PLACEHOLDER_CONTENT),
            ("beta", "beta fact"),
        ]);
        let responder =
            ContextualResponder::new(config(FailureMode::Surface), client.clone(), store).unwrap();

        let response = responder.get_response("What is the answer?", 10, true).await.unwrap();

        assert_eq!(response.answer, "Forty-two");
        assert!(!response.direct);
        assert_eq!(response.keywords, vec!["alpha", "beta"]);
        assert_eq!(response.passages.len(), 2);

        insta::assert_snapshot!(response.full_prompt.clone().unwrap(), @r###"
        Answer the following question based on the provided context:

        Context: Document 1:
        alpha fact

        Document 2:
        beta fact


        Question: What is the answer?

        Answer:
        "###);

        let turns = client.turns();
        assert_eq!(turns.len(), 2);
        assert_eq!(
            turns[0].user,
            "Extract the most important keywords from this query: What is the answer?\n\nOutput only the keywords as a comma-separated list."
        );
        assert!(turns[1].system.is_none());
        assert_eq!(turns[1].temperature, DEFAULT_TEMPERATURE);
        assert_eq!(Some(turns[1].user.clone()), response.full_prompt);
    }

    #[tokio::test]
    async fn test_marker_and_raw_extraction() {
        let client = ScriptedClient::new(vec![ok("<keywords>alpha</keywords>"), ok("Response: 42")]);
        let store = MapStore::new(&[("alpha", "alpha fact")]);
        let responder =
            ContextualResponder::new(config(FailureMode::Surface), client, store.clone()).unwrap();
        assert_eq!(responder.get_response("q", 10, false).await.unwrap().answer, "42");

        let client = ScriptedClient::new(vec![ok("<keywords>alpha</keywords>"), ok("plain prose")]);
        let responder =
            ContextualResponder::new(config(FailureMode::Surface), client, store).unwrap();
        let (answer, trace) = responder.get_response("q", 10, false).await.unwrap().into_parts();
        assert_eq!(answer, "plain prose");
        assert!(trace.is_none());
    }

    #[tokio::test]
    async fn test_direct_answer_without_evidence() {
        let client = ScriptedClient::new(vec![
            ok("<keywords>obscure</keywords>"),
            ok("Answer: X is a letter."),
        ]);
        let store = MapStore::new(&[]);
        let responder =
            ContextualResponder::new(config(FailureMode::Surface), client.clone(), store.clone())
                .unwrap();

        let response = responder.get_response("What is X?", 10, true).await.unwrap();

        assert!(response.direct);
        assert_eq!(response.answer, "Answer: X is a letter.");
        assert_eq!(
            response.full_prompt.as_deref(),
            Some("System: You are a helpful AI assistant. Answer the user's question to the best of your ability.\n\nUser: What is X?")
        );
        assert!(!response.full_prompt.unwrap().contains("Document 1:"));
        assert_eq!(store.lookups(), 1);

        let turns = client.turns();
        assert_eq!(turns[1].system.as_deref(), Some(DIRECT_SYSTEM_PROMPT));
        assert_eq!(turns[1].user, "What is X?");
    }

    #[tokio::test]
    async fn test_empty_keywords_skip_store() {
        let client = ScriptedClient::new(vec![ok("<keywords> </keywords>"), ok("Direct.")]);
        let store = MapStore::new(&[("alpha", "alpha fact")]);
        let responder =
            ContextualResponder::new(config(FailureMode::Surface), client, store.clone()).unwrap();

        let response = responder.get_response("hello", 10, false).await.unwrap();

        assert!(response.direct);
        assert!(response.keywords.is_empty());
        assert_eq!(store.lookups(), 0);
    }

    #[tokio::test]
    async fn test_surface_mode_returns_typed_error() {
        let client = ScriptedClient::new(vec![Err(Error::LLMProvider("server down".to_string()))]);
        let store = MapStore::new(&[]);
        let responder =
            ContextualResponder::new(config(FailureMode::Surface), client, store.clone()).unwrap();

        let result = responder.get_response("anything", 10, false).await;

        assert!(matches!(result, Err(Error::LLMProvider(_))));
        assert_eq!(store.lookups(), 0);
    }

    #[tokio::test]
    async fn test_inband_mode_answers_with_error_text() {
        let client = ScriptedClient::new(vec![
            Err(Error::LLMProvider("server down".to_string())),
            Err(Error::LLMProvider("server down".to_string())),
        ]);
        let store = MapStore::new(&[]);
        let responder =
            ContextualResponder::new(config(FailureMode::InBand), client, store).unwrap();

        let response = responder.get_response("anything", 10, false).await.unwrap();

        assert_eq!(response.keywords, vec!["Error: LLM provider error: server down"]);
        assert!(response.direct);
        assert_eq!(response.answer, "Error: LLM provider error: server down");
    }

    #[tokio::test]
    async fn test_hosted_backend_uses_hosted_default_model() {
        let client = ScriptedClient::new(vec![]);
        let config = ResponderConfig {
            backend: Backend::OpenAi,
            ..config(FailureMode::Surface)
        };
        let responder = ContextualResponder::new(config, client, MapStore::new(&[])).unwrap();
        assert_eq!(responder.model(), "gpt-3.5-turbo");
    }

    #[tokio::test]
    async fn test_templates_loaded_from_files() {
        let dir = tempfile::tempdir().unwrap();
        let keyword_path = dir.path().join("keywords.md");
        let context_path = dir.path().join("context.md");
        std::fs::write(&keyword_path, "KW {{USER_QUERY}}").unwrap();
        std::fs::write(&context_path, "CTX {{CONTEXT}}Q {{USER_QUERY}}").unwrap();

        let client = ScriptedClient::new(vec![ok("<keywords>alpha</keywords>"), ok("<answer>A</answer>")]);
        let store = MapStore::new(&[("alpha", "alpha fact")]);
        let config = ResponderConfig {
            keyword_prompt_path: keyword_path,
            context_prompt_path: context_path,
            ..config(FailureMode::Surface)
        };
        let responder = ContextualResponder::new(config, client.clone(), store).unwrap();

        let response = responder.get_response("why", 10, true).await.unwrap();

        assert_eq!(client.turns()[0].user, "KW why");
        assert_eq!(
            response.full_prompt.as_deref(),
            Some("CTX Document 1:\nalpha fact\nQ why")
        );
    }

    #[tokio::test]
    async fn test_local_store_survives_reconnect() {
        let dir = tempfile::tempdir().unwrap();
        let config = ResponderConfig {
            local_store: true,
            local_store_dir: dir.path().to_path_buf(),
            embed_dimensions: 128,
            ..config(FailureMode::Surface)
        };
        assert_eq!(config.local_store_file(), dir.path().join("documents.json"));

        let store = connect_store(&config).await.unwrap();
        store
            .add_passages(vec![Passage::new("Qdrant indexes vectors for similarity search")])
            .await
            .unwrap();
        drop(store);

        let store = connect_store(&config).await.unwrap();
        let found = store.similarity_search("qdrant vectors", 1).await.unwrap();
        assert_eq!(found[0].content, "Qdrant indexes vectors for similarity search");
    }
}

#[cfg(test)]
mod snapshot_tests {
    use crate::*;
    use insta::assert_yaml_snapshot;

    #[test]
    fn test_default_config_snapshot() {
        let config = ResponderConfig {
            failure_mode: FailureMode::Surface,
            ..Default::default()
        };
        assert_yaml_snapshot!(config, @r###"
        model: "llama3:8b"
        collection: documents
        keyword_prompt_path: "./prompts/keyword_extractor.md"
        context_prompt_path: "./prompts/context_based_query.md"
        backend: ollama
        failure_mode: surface
        qdrant_url: "http://localhost:6333"
        ollama_url: "http://localhost:11434"
        embed_model: all-minilm
        embed_dimensions: 384
        local_store: false
        local_store_dir: "./.docqa"
        "###);
    }
}

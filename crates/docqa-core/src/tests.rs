//! Snapshot tests for core types

#[cfg(test)]
mod snapshot_tests {
    use crate::{collect_text, Backend, ChatTurn, Error, Passage, TextStream};
    use futures::stream;
    use insta::assert_yaml_snapshot;
    use serde_json::json;

    #[test]
    fn test_chat_turn_snapshot() {
        let turn = ChatTurn::user("Summarize the release notes")
            .with_system("You are a helpful AI assistant.")
            .with_temperature(0.5)
            .with_stream(false);

        assert_yaml_snapshot!(turn, @r###"
        system: You are a helpful AI assistant.
        user: Summarize the release notes
        temperature: 0.5
        stream: false
        "###);
    }

    #[test]
    fn test_passage_snapshot() {
        let passage = Passage::new("Qdrant stores vectors").with_metadata(json!({"source": "notes.md"}));

        assert_yaml_snapshot!(passage, @r###"
        content: Qdrant stores vectors
        metadata:
          source: notes.md
        "###);
    }

    #[test]
    fn test_backend_parsing() {
        assert_eq!("ollama".parse::<Backend>().unwrap(), Backend::Ollama);
        assert_eq!("OpenAI".parse::<Backend>().unwrap(), Backend::OpenAi);
        assert!(matches!("bard".parse::<Backend>(), Err(Error::Configuration(_))));
        assert_eq!(Backend::OpenAi.to_string(), "openai");
        assert_eq!(Backend::OpenAi.default_model(), "gpt-3.5-turbo");
    }

    #[test]
    fn test_placeholder_detection() {
        assert!(Passage::new(crate::PLACEHOLDER_CONTENT).is_placeholder());
        assert!(!Passage::new("This is a placeholder document for initialization. Extra").is_placeholder());
    }

    #[tokio::test]
    async fn test_collect_text_forwards_fragments() {
        let fragments: TextStream = Box::pin(stream::iter(vec![
            Ok("The ".to_string()),
            Ok("answer ".to_string()),
            Ok("is 42".to_string()),
        ]));

        let mut seen = Vec::new();
        let text = collect_text(fragments, |f| seen.push(f.to_string())).await.unwrap();

        assert_eq!(text, "The answer is 42");
        assert_eq!(seen, vec!["The ", "answer ", "is 42"]);
    }

    #[tokio::test]
    async fn test_collect_text_stops_on_error() {
        let fragments: TextStream = Box::pin(stream::iter(vec![
            Ok("partial".to_string()),
            Err(Error::Network("connection reset".to_string())),
            Ok("never seen".to_string()),
        ]));

        let result = collect_text(fragments, |_| {}).await;
        assert!(matches!(result, Err(Error::Network(_))));
    }
}

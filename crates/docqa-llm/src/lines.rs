//! Line framing for streamed HTTP bodies
//!
//! Ollama streams newline-delimited JSON and OpenAI streams server-sent
//! events; both are read one line at a time from the response body.

use std::fmt::Display;
use std::pin::Pin;

use futures::{stream, Stream, StreamExt};

use docqa_core::{Error, Result};

struct LineState<S> {
    inner: Pin<Box<S>>,
    buf: Vec<u8>,
    finished: bool,
}

/// Split a byte stream into trimmed, non-empty text lines.
///
/// A transport error is yielded once and ends the stream.
pub fn byte_lines<S, B, E>(inner: S) -> impl Stream<Item = Result<String>> + Send
where
    S: Stream<Item = std::result::Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Display + Send + 'static,
{
    let state = LineState {
        inner: Box::pin(inner),
        buf: Vec::new(),
        finished: false,
    };

    stream::unfold(state, |mut st| async move {
        loop {
            if let Some(pos) = st.buf.iter().position(|b| *b == b'\n') {
                let raw: Vec<u8> = st.buf.drain(..=pos).collect();
                let line = String::from_utf8_lossy(&raw).trim().to_string();
                if line.is_empty() {
                    continue;
                }
                return Some((Ok(line), st));
            }

            if st.finished {
                let rest = std::mem::take(&mut st.buf);
                let line = String::from_utf8_lossy(&rest).trim().to_string();
                if line.is_empty() {
                    return None;
                }
                return Some((Ok(line), st));
            }

            match st.inner.next().await {
                Some(Ok(chunk)) => st.buf.extend_from_slice(chunk.as_ref()),
                Some(Err(e)) => {
                    st.finished = true;
                    st.buf.clear();
                    return Some((Err(Error::Network(e.to_string())), st));
                }
                None => st.finished = true,
            }
        }
    })
}

/// Payload of a server-sent `data:` line, if the line is one
pub fn sse_data(line: &str) -> Option<&str> {
    line.strip_prefix("data:").map(str::trim)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunks(parts: &[&str]) -> impl Stream<Item = std::result::Result<Vec<u8>, std::io::Error>> + Send + 'static {
        let owned: Vec<_> = parts.iter().map(|p| Ok(p.as_bytes().to_vec())).collect();
        stream::iter(owned)
    }

    #[tokio::test]
    async fn test_lines_split_across_chunks() {
        let lines: Vec<String> = byte_lines(chunks(&["{\"a\":", "1}\n{\"b\"", ":2}\n\n", "{\"c\":3}"]))
            .map(|l| l.unwrap())
            .collect()
            .await;

        assert_eq!(lines, vec!["{\"a\":1}", "{\"b\":2}", "{\"c\":3}"]);
    }

    #[tokio::test]
    async fn test_transport_error_ends_stream() {
        let parts = vec![
            Ok(b"first\nsecond-part".to_vec()),
            Err(std::io::Error::other("connection reset")),
            Ok(b"ignored\n".to_vec()),
        ];

        let items: Vec<Result<String>> = byte_lines(stream::iter(parts)).collect().await;

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_ref().unwrap(), "first");
        assert!(matches!(items[1], Err(Error::Network(_))));
    }

    #[test]
    fn test_sse_data() {
        assert_eq!(sse_data("data: {\"x\":1}"), Some("{\"x\":1}"));
        assert_eq!(sse_data("data:[DONE]"), Some("[DONE]"));
        assert_eq!(sse_data(": keep-alive"), None);
    }
}

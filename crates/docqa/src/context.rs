//! Context building: chunking, truncation and the chat prompt

use serde::{Deserialize, Serialize};
use text_splitter::{ChunkConfig, TextSplitter};
use tracing::debug;

pub const SYSTEM_PROMPT: &str =
    "You are a helpful assistant that answers questions based on the provided document.";

pub const NOT_FOUND_ANSWER: &str = "I could not find an answer in the document.";

/// Limits applied when turning document text into model context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextLimits {
    /// Maximum characters per chunk
    pub chunk_size: usize,
    /// Number of leading chunks to keep
    pub max_chunks: usize,
    /// Hard cap on the joined context, in characters
    pub max_context_chars: usize,
}

impl Default for ContextLimits {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            max_chunks: 3,
            max_context_chars: 3000,
        }
    }
}

/// One chat message in the Ollama wire format
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Split text into chunks of at most `chunk_size` characters
pub fn chunk_text(text: &str, chunk_size: usize) -> Vec<String> {
    let splitter = TextSplitter::new(ChunkConfig::new(chunk_size.max(1)));
    let chunks: Vec<String> = splitter.chunks(text).map(str::to_string).collect();

    debug!(
        input_chars = text.chars().count(),
        chunk_count = chunks.len(),
        chunk_size,
        "Text chunked"
    );

    chunks
}

/// Cut `text` to at most `max_chars` characters
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Leading chunks joined by blank lines, then hard-truncated
pub fn build_context(chunks: &[String], limits: &ContextLimits) -> String {
    let joined = chunks
        .iter()
        .take(limits.max_chunks)
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join("\n\n");

    truncate_chars(&joined, limits.max_context_chars).to_string()
}

/// System and user messages for one question
pub fn build_messages(question: &str, context: &str) -> Vec<ChatMessage> {
    let prompt = format!(
        "{SYSTEM_PROMPT}\n\
         Answer the following question based on the document content below.\n\
         If the answer cannot be found in the document, say '{NOT_FOUND_ANSWER}'\n\
         \n\
         Question: {question}\n\
         \n\
         Document content:\n\
         {context}\n\
         \n\
         Answer:"
    );

    vec![ChatMessage::system(SYSTEM_PROMPT), ChatMessage::user(prompt)]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunks_respect_size() {
        let text = "word ".repeat(1200);
        let chunks = chunk_text(&text, 1000);
        assert!(chunks.len() >= 6);
        assert!(chunks.iter().all(|c| c.chars().count() <= 1000));
    }

    #[test]
    fn test_truncate_is_char_safe() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 10), "abc");
        assert_eq!(truncate_chars("abc", 0), "");
    }

    #[test]
    fn test_context_uses_leading_chunks_and_cap() {
        let chunks: Vec<String> = ["a", "b", "c", "d"].iter().map(|s| s.repeat(1000)).collect();

        let context = build_context(&chunks, &ContextLimits::default());
        assert_eq!(context.chars().count(), 3000);
        assert!(!context.contains('c'));
        assert!(!context.contains('d'));

        let small = ContextLimits {
            max_chunks: 2,
            max_context_chars: 10_000,
            ..ContextLimits::default()
        };
        assert_eq!(build_context(&chunks, &small).chars().count(), 2002);
    }

    #[test]
    fn test_messages_embed_question_and_context() {
        let messages = build_messages("Who wrote it?", "Written by Ada.");
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0], ChatMessage::system(SYSTEM_PROMPT));
        assert_eq!(messages[1].role, "user");
        assert!(messages[1].content.contains("Question: Who wrote it?"));
        assert!(messages[1].content.contains("Document content:\nWritten by Ada."));
        assert!(messages[1].content.contains(NOT_FOUND_ANSWER));
        assert!(messages[1].content.ends_with("Answer:"));
    }
}

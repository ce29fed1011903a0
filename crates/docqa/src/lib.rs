//! Papertrail Document Q&A
//!
//! Loads a PDF, keeps its text as fixed-size chunks and answers questions by
//! forwarding the leading chunks to a local chat model.

pub mod context;
pub mod errors;
pub mod llm;
pub mod pdf;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use papertrail_common::config::AssistantConfig;
use tracing::{info, instrument};

pub use context::{ChatMessage, ContextLimits};
pub use errors::{DocQaError, Result};
pub use llm::{Answerer, MockAnswerer, OllamaClient};

/// Reply used when the model returns nothing
pub const EMPTY_ANSWER: &str = "I couldn't find an answer to that question in the document.";

/// Summary of a loaded document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedDocument {
    pub path: PathBuf,
    pub chars: usize,
    pub chunks: usize,
}

pub struct DocumentAssistant {
    answerer: Arc<dyn Answerer>,
    limits: ContextLimits,
    document: Option<LoadedDocument>,
    chunks: Vec<String>,
}

impl DocumentAssistant {
    pub fn new(answerer: Arc<dyn Answerer>, limits: ContextLimits) -> Self {
        Self {
            answerer,
            limits,
            document: None,
            chunks: Vec::new(),
        }
    }

    /// Assistant backed by the Ollama server named in `config`
    pub fn from_config(config: &AssistantConfig) -> Result<Self> {
        let client = OllamaClient::new(
            config.endpoint.clone(),
            config.model.clone(),
            Duration::from_secs(config.timeout_secs),
        )?;

        Ok(Self::new(
            Arc::new(client),
            ContextLimits {
                chunk_size: config.chunk_size,
                max_chunks: config.max_chunks,
                max_context_chars: config.max_context_chars,
            },
        ))
    }

    pub fn document(&self) -> Option<&LoadedDocument> {
        self.document.as_ref()
    }

    pub fn model_name(&self) -> &str {
        self.answerer.model_name()
    }

    /// Extract and chunk a PDF, replacing any previously loaded document.
    /// On failure the previous document stays loaded.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub async fn load(&mut self, path: impl AsRef<Path>) -> Result<&LoadedDocument> {
        let path = path.as_ref().to_path_buf();
        pdf::ensure_pdf(&path)?;

        let extract_from = path.clone();
        let text = tokio::task::spawn_blocking(move || pdf::extract_text_from_pdf(&extract_from)).await??;

        let chunks = context::chunk_text(&text, self.limits.chunk_size);
        let document = LoadedDocument {
            path,
            chars: text.chars().count(),
            chunks: chunks.len(),
        };

        info!(chars = document.chars, chunks = document.chunks, "Document loaded");

        self.chunks = chunks;
        Ok(self.document.insert(document))
    }

    /// Answer a question about the loaded document
    #[instrument(skip(self), fields(model = %self.answerer.model_name()))]
    pub async fn ask(&self, question: &str) -> Result<String> {
        if self.document.is_none() {
            return Err(DocQaError::NoDocument);
        }

        let question = question.trim();
        if question.is_empty() {
            return Err(DocQaError::EmptyQuestion);
        }

        let context = context::build_context(&self.chunks, &self.limits);
        let messages = context::build_messages(question, &context);

        let answer = self.answerer.chat(&messages).await?;
        let answer = answer.trim();

        if answer.is_empty() {
            Ok(EMPTY_ANSWER.to_string())
        } else {
            Ok(answer.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::tests::write_pdf;
    use tempfile::TempDir;
    use tokio_test::{assert_err, assert_ok};

    fn assistant(reply: &str) -> (DocumentAssistant, Arc<MockAnswerer>) {
        let mock = Arc::new(MockAnswerer::new(reply));
        let assistant = DocumentAssistant::new(mock.clone(), ContextLimits::default());
        (assistant, mock)
    }

    #[tokio::test]
    async fn test_ask_before_load() {
        let (assistant, mock) = assistant("unused");
        assert!(matches!(assistant.ask("What?").await, Err(DocQaError::NoDocument)));
        assert!(mock.calls().is_empty());
    }

    #[tokio::test]
    async fn test_load_and_ask() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("paper.pdf");
        write_pdf(&path, &["Allocation caps reviewers at two per paper"]);

        let (mut assistant, mock) = assistant("  Two reviewers.\n");
        let loaded = assert_ok!(assistant.load(&path).await);
        assert_eq!(loaded.chunks, 1);

        let answer = assert_ok!(assistant.ask("  How many reviewers?  ").await);
        assert_eq!(answer, "Two reviewers.");

        let calls = mock.calls();
        assert_eq!(calls.len(), 1);
        let prompt = &calls[0][1].content;
        assert!(prompt.contains("Question: How many reviewers?"));
        assert!(prompt.contains("Allocation caps reviewers at two per paper"));
    }

    #[tokio::test]
    async fn test_blank_question_and_empty_answer() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("paper.pdf");
        write_pdf(&path, &["Some text"]);

        let (mut assistant, mock) = assistant("   ");
        assert_ok!(assistant.load(&path).await);

        assert!(matches!(assistant.ask(" \n").await, Err(DocQaError::EmptyQuestion)));
        assert!(mock.calls().is_empty());

        assert_eq!(assistant.ask("Anything?").await.unwrap(), EMPTY_ANSWER);
    }

    #[tokio::test]
    async fn test_failed_load_keeps_previous_document() {
        let dir = TempDir::new().unwrap();
        let good = dir.path().join("good.pdf");
        write_pdf(&good, &["First document"]);

        let (mut assistant, _mock) = assistant("ok");
        assert_ok!(assistant.load(&good).await);

        let err = assert_err!(assistant.load(dir.path().join("missing.pdf")).await);
        assert!(matches!(err, DocQaError::FileNotFound(_)));
        assert_eq!(assistant.document().unwrap().path, good);
    }
}

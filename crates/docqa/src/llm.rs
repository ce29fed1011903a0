//! Language model access
//!
//! [`Answerer`] abstracts the chat backend so the assistant can be driven by a
//! local Ollama server in production and by [`MockAnswerer`] in tests.

use crate::context::ChatMessage;
use crate::errors::{DocQaError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use std::time::Duration;
use tracing::debug;

/// Trait for chat completion backends
#[async_trait]
pub trait Answerer: Send + Sync {
    /// Send one non-streaming chat request and return the reply text
    async fn chat(&self, messages: &[ChatMessage]) -> Result<String>;

    /// Get the model name
    fn model_name(&self) -> &str;
}

/// Client for the Ollama `/api/chat` endpoint
pub struct OllamaClient {
    client: reqwest::Client,
    endpoint: String,
    model: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
}

#[derive(Deserialize)]
struct ChatResponse {
    message: ChatMessage,
}

impl OllamaClient {
    pub fn new(endpoint: impl Into<String>, model: impl Into<String>, timeout: Duration) -> Result<Self> {
        let endpoint = endpoint.into();
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|source| DocQaError::Unreachable {
                endpoint: endpoint.clone(),
                source,
            })?;

        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            model: model.into(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl Answerer for OllamaClient {
    async fn chat(&self, messages: &[ChatMessage]) -> Result<String> {
        let url = format!("{}/api/chat", self.endpoint);
        let request = ChatRequest {
            model: &self.model,
            messages,
            stream: false,
        };

        debug!(url = %url, model = %self.model, messages = messages.len(), "Sending chat request");

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|source| DocQaError::Unreachable {
                endpoint: self.endpoint.clone(),
                source,
            })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(DocQaError::Inference { status, body });
        }

        let result: ChatResponse = response
            .json()
            .await
            .map_err(|e| DocQaError::InvalidResponse(e.to_string()))?;

        Ok(result.message.content)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// Canned answerer for tests; remembers every request
#[derive(Default)]
pub struct MockAnswerer {
    reply: String,
    calls: Mutex<Vec<Vec<ChatMessage>>>,
}

impl MockAnswerer {
    pub fn new(reply: impl Into<String>) -> Self {
        Self {
            reply: reply.into(),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Message lists received so far, oldest first
    pub fn calls(&self) -> Vec<Vec<ChatMessage>> {
        self.calls
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Answerer for MockAnswerer {
    async fn chat(&self, messages: &[ChatMessage]) -> Result<String> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(messages.to_vec());
        }
        Ok(self.reply.clone())
    }

    fn model_name(&self) -> &str {
        "mock-chat"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode, routing::post, Json, Router};
    use serde_json::{json, Value};
    use std::sync::Arc;

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}/")
    }

    #[tokio::test]
    async fn test_ollama_request_shape() {
        let seen: Arc<Mutex<Option<Value>>> = Arc::default();
        let captured = seen.clone();
        let router = Router::new().route(
            "/api/chat",
            post(move |Json(body): Json<Value>| async move {
                *captured.lock().unwrap() = Some(body);
                Json(json!({
                    "model": "llama3.2",
                    "message": { "role": "assistant", "content": "Forty-two." },
                    "done": true
                }))
            }),
        );
        let endpoint = serve(router).await;

        let client = OllamaClient::new(endpoint, "llama3.2", Duration::from_secs(5)).unwrap();
        assert!(!client.endpoint().ends_with('/'));

        let answer = client
            .chat(&[ChatMessage::system("sys"), ChatMessage::user("question")])
            .await
            .unwrap();
        assert_eq!(answer, "Forty-two.");

        let body = seen.lock().unwrap().clone().unwrap();
        assert_eq!(body["model"], "llama3.2");
        assert_eq!(body["stream"], false);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "question");
    }

    #[tokio::test]
    async fn test_ollama_error_status() {
        let router = Router::new().route(
            "/api/chat",
            post(|| async { (StatusCode::NOT_FOUND, "model \"missing\" not found") }),
        );
        let endpoint = serve(router).await;
        let client = OllamaClient::new(endpoint, "missing", Duration::from_secs(5)).unwrap();

        match client.chat(&[ChatMessage::user("hi")]).await {
            Err(DocQaError::Inference { status, body }) => {
                assert_eq!(status, 404);
                assert!(body.contains("not found"));
            }
            other => panic!("expected inference error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_ollama_malformed_reply() {
        let router = Router::new().route("/api/chat", post(|| async { Json(json!({ "done": true })) }));
        let endpoint = serve(router).await;
        let client = OllamaClient::new(endpoint, "llama3.2", Duration::from_secs(5)).unwrap();

        assert!(matches!(
            client.chat(&[ChatMessage::user("hi")]).await,
            Err(DocQaError::InvalidResponse(_))
        ));
    }

    #[tokio::test]
    async fn test_ollama_unreachable() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = OllamaClient::new(format!("http://{addr}"), "llama3.2", Duration::from_secs(2)).unwrap();
        assert!(matches!(
            client.chat(&[ChatMessage::user("hi")]).await,
            Err(DocQaError::Unreachable { .. })
        ));
    }

    #[tokio::test]
    async fn test_mock_records_calls() {
        let mock = MockAnswerer::new("ok");
        assert_eq!(mock.chat(&[ChatMessage::user("one")]).await.unwrap(), "ok");
        assert_eq!(mock.chat(&[ChatMessage::user("two")]).await.unwrap(), "ok");

        let calls = mock.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[1][0].content, "two");
        assert_eq!(mock.model_name(), "mock-chat");
    }
}

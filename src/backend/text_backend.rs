//! Text generation backend abstraction
//! Ships an OpenAI API compatible implementation (OpenAI, Ollama, vLLM, etc.)

use async_trait::async_trait;
use bytes::Bytes;
use eventsource_stream::{EventStreamError, Eventsource};
use futures::stream::{Stream, StreamExt};
use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE},
    Client,
};
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use std::sync::Arc;
use tracing::debug;

use crate::backend::gemini::GeminiBackend;
use crate::config::{BackendConfig, ProtocolType};
use crate::error::{AppError, Result};

/// Ordered text chunks produced by a backend
pub type TextStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// Trait for text generation backends
#[async_trait]
pub trait TextBackend: Send + Sync {
    /// Get the backend name
    fn name(&self) -> &str;

    /// Get the model requests are sent to
    fn model(&self) -> &str;

    /// Start a streaming generation with a system instruction and a single user turn.
    ///
    /// An `Err` here means the backend rejected the call before producing output.
    async fn open_stream(&self, system_instruction: &str, user_text: &str) -> Result<TextStream>;
}

/// Turn a streamed response body into the payloads of its `data:` fields.
///
/// An event cut off by the end of the body is never yielded.
pub(crate) fn event_data<S>(body: S) -> impl Stream<Item = Result<String>> + Send
where
    S: Stream<Item = reqwest::Result<Bytes>> + Send,
{
    body.eventsource()
        .map(|event| event.map(|event| event.data).map_err(event_stream_error))
}

fn event_stream_error(error: EventStreamError<reqwest::Error>) -> AppError {
    match error {
        EventStreamError::Transport(e) => AppError::HttpClient(e),
        other => AppError::Decode(other.to_string()),
    }
}

/// Chat message for completion requests
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

/// Streaming chat completion request (OpenAI compatible)
#[derive(Debug, Clone, Serialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub stream: bool,
}

/// One `data:` payload of a streamed chat completion
#[derive(Debug, Default, Deserialize)]
pub struct ChatCompletionChunk {
    #[serde(default)]
    pub choices: Vec<ChunkChoice>,
    #[serde(default)]
    pub error: Option<ApiErrorBody>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ChunkChoice {
    #[serde(default)]
    pub delta: ChunkDelta,
}

#[derive(Debug, Default, Deserialize)]
pub struct ChunkDelta {
    #[serde(default)]
    pub content: Option<String>,
}

/// Error object embedded in a streamed payload
#[derive(Debug, Default, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub message: String,
}

/// Extract the text carried by one OpenAI style stream payload
pub fn parse_chat_chunk(data: &str) -> Result<String> {
    if data.trim() == "[DONE]" {
        return Ok(String::new());
    }

    let chunk: ChatCompletionChunk = serde_json::from_str(data)?;
    if let Some(error) = chunk.error {
        return Err(AppError::BackendError(error.message));
    }

    Ok(chunk
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.delta.content)
        .unwrap_or_default())
}

/// OpenAI API compatible text backend
pub struct OpenAICompatibleBackend {
    name: String,
    client: Client,
    base_url: String,
    model: String,
    auth_token: String,
}

impl OpenAICompatibleBackend {
    /// Create a new OpenAI compatible backend
    pub fn new(config: &BackendConfig, auth_token: String) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout())
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            name: config.protocol.to_string(),
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            auth_token,
        })
    }

    /// Get headers with authentication
    fn get_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if !self.auth_token.is_empty() {
            if let Ok(value) = HeaderValue::from_str(&format!("Bearer {}", self.auth_token)) {
                headers.insert(AUTHORIZATION, value);
            }
        }

        headers
    }
}

#[async_trait]
impl TextBackend for OpenAICompatibleBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn open_stream(&self, system_instruction: &str, user_text: &str) -> Result<TextStream> {
        let url = format!("{}/chat/completions", self.base_url);

        debug!(backend = %self.name, url = %url, model = %self.model, "Opening chat completion stream");

        let request = ChatCompletionRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: system_instruction.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: user_text.to_string(),
                },
            ],
            stream: true,
        };

        let response = self
            .client
            .post(&url)
            .headers(self.get_headers())
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::BackendError(format!(
                "Backend returned {}: {}",
                status, body
            )));
        }

        let events = event_data(response.bytes_stream());
        Ok(Box::pin(events.map(|event| event.and_then(|data| parse_chat_chunk(&data)))))
    }
}

/// Create the text backend selected by configuration
pub fn create_text_backend(config: &BackendConfig, api_key: String) -> Result<Arc<dyn TextBackend>> {
    match config.protocol {
        ProtocolType::Gemini => Ok(Arc::new(GeminiBackend::new(config, api_key)?)),
        ProtocolType::OpenAI => Ok(Arc::new(OpenAICompatibleBackend::new(config, api_key)?)),
    }
}

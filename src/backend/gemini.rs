//! Google Generative Language API backend

use async_trait::async_trait;
use futures::stream::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::backend::text_backend::{event_data, TextBackend, TextStream};
use crate::config::BackendConfig;
use crate::error::{AppError, Result};

const API_KEY_HEADER: &str = "x-goog-api-key";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    system_instruction: Content<'a>,
    contents: Vec<Content<'a>>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'a str>,
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

/// One `data:` payload of a `streamGenerateContent` response
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentChunk {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    #[serde(default)]
    pub prompt_feedback: Option<PromptFeedback>,
    #[serde(default)]
    pub error: Option<GeminiError>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Candidate {
    #[serde(default)]
    pub content: Option<CandidateContent>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CandidateContent {
    #[serde(default)]
    pub parts: Vec<ResponsePart>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ResponsePart {
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptFeedback {
    #[serde(default)]
    pub block_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct GeminiError {
    #[serde(default)]
    pub code: Option<u16>,
    #[serde(default)]
    pub message: String,
}

/// Extract the text of the first candidate from one stream payload.
///
/// A blocked prompt carries no candidates, which is reported as an error.
pub fn parse_stream_payload(data: &str) -> Result<String> {
    let chunk: GenerateContentChunk = serde_json::from_str(data)?;

    if let Some(error) = chunk.error {
        return Err(AppError::BackendError(match error.code {
            Some(code) => format!("Backend returned {}: {}", code, error.message),
            None => error.message,
        }));
    }

    let Some(candidate) = chunk.candidates.into_iter().next() else {
        if let Some(reason) = chunk.prompt_feedback.and_then(|f| f.block_reason) {
            return Err(AppError::BackendError(format!("Prompt blocked: {}", reason)));
        }
        return Ok(String::new());
    };

    Ok(candidate
        .content
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter_map(|part| part.text)
                .collect::<String>()
        })
        .unwrap_or_default())
}

/// Gemini text backend
pub struct GeminiBackend {
    client: Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl GeminiBackend {
    pub fn new(config: &BackendConfig, api_key: String) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout())
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key,
        })
    }

    fn stream_url(&self) -> String {
        format!("{}/models/{}:streamGenerateContent", self.base_url, self.model)
    }
}

#[async_trait]
impl TextBackend for GeminiBackend {
    fn name(&self) -> &str {
        "gemini"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn open_stream(&self, system_instruction: &str, user_text: &str) -> Result<TextStream> {
        let url = self.stream_url();

        debug!(url = %url, model = %self.model, "Opening Gemini stream");

        let request = GenerateContentRequest {
            system_instruction: Content {
                role: None,
                parts: vec![Part { text: system_instruction }],
            },
            contents: vec![Content {
                role: Some("user"),
                parts: vec![Part { text: user_text }],
            }],
        };

        let response = self
            .client
            .post(&url)
            .query(&[("alt", "sse")])
            .header(API_KEY_HEADER, &self.api_key)
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
        Ok(Box::pin(events.map(|event| event.and_then(|data| parse_stream_payload(&data)))))
    }
}

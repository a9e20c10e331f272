//! Provider tests against mock HTTP servers

mod common;

use axum::http::StatusCode;
use common::{body_text, generate_request, test_app};
use futures::StreamExt;
use medscribe_gateway::backend::{GeminiBackend, OpenAICompatibleBackend, TextBackend};
use medscribe_gateway::config::{BackendConfig, ProtocolType};
use medscribe_gateway::AppError;
use serde_json::json;
use std::sync::Arc;
use tower::ServiceExt;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const GEMINI_PATH: &str = "/v1beta/models/gemini-test:streamGenerateContent";

fn gemini_config(server: &MockServer) -> BackendConfig {
    BackendConfig {
        protocol: ProtocolType::Gemini,
        base_url: format!("{}/v1beta", server.uri()),
        model: "gemini-test".to_string(),
        ..Default::default()
    }
}

fn gemini_event(text: &str) -> String {
    format!(
        "data: {}\r\n\r\n",
        json!({"candidates": [{"content": {"role": "model", "parts": [{"text": text}]}}]})
    )
}

fn sse_response(body: String) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body, "text/event-stream")
}

async fn collect_text(backend: &dyn TextBackend, system: &str, user: &str) -> Vec<String> {
    backend
        .open_stream(system, user)
        .await
        .unwrap()
        .map(|chunk| chunk.unwrap())
        .collect()
        .await
}

#[tokio::test]
async fn test_gemini_streams_candidate_text() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(GEMINI_PATH))
        .and(query_param("alt", "sse"))
        .and(header("x-goog-api-key", "test-key"))
        .and(body_partial_json(json!({
            "systemInstruction": {"parts": [{"text": "Be concise."}]},
            "contents": [{"role": "user", "parts": [{"text": "pt c/o HA x3d"}]}]
        })))
        .respond_with(sse_response(format!(
            "{}{}",
            gemini_event("Patient reports "),
            gemini_event("headache for three days.")
        )))
        .expect(1)
        .mount(&server)
        .await;

    let backend = GeminiBackend::new(&gemini_config(&server), "test-key".to_string()).unwrap();
    let chunks = collect_text(&backend, "Be concise.", "pt c/o HA x3d").await;

    assert_eq!(
        chunks,
        vec!["Patient reports ".to_string(), "headache for three days.".to_string()]
    );
}

#[tokio::test]
async fn test_gemini_rejection_is_pre_stream_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(GEMINI_PATH))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": {"code": 400, "message": "API key not valid.", "status": "INVALID_ARGUMENT"}
        })))
        .mount(&server)
        .await;

    let backend = GeminiBackend::new(&gemini_config(&server), "bad-key".to_string()).unwrap();
    let err = backend
        .open_stream("Be concise.", "pt c/o HA")
        .await
        .err()
        .expect("rejected call should not open a stream");

    assert!(matches!(err, AppError::BackendError(ref message) if message.contains("400")));
}

#[tokio::test]
async fn test_gemini_end_to_end_mid_stream_error() {
    let server = MockServer::start().await;

    let body = format!(
        "{}data: {}\r\n\r\n",
        gemini_event("Partial "),
        json!({"error": {"code": 500, "message": "Internal error encountered."}})
    );

    Mock::given(method("POST"))
        .and(path(GEMINI_PATH))
        .respond_with(sse_response(body))
        .mount(&server)
        .await;

    let backend = GeminiBackend::new(&gemini_config(&server), "test-key".to_string()).unwrap();
    let app = test_app(Arc::new(backend));

    let response = app
        .oneshot(generate_request(r#"{"shorthand":"pt c/o HA","mode":"expand"}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_text(response.into_body()).await,
        "Partial Error generating response."
    );
}

#[tokio::test]
async fn test_gemini_end_to_end_rejection() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(GEMINI_PATH))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .mount(&server)
        .await;

    let backend = GeminiBackend::new(&gemini_config(&server), "test-key".to_string()).unwrap();
    let app = test_app(Arc::new(backend));

    let response = app
        .oneshot(generate_request(r#"{"shorthand":"pt c/o HA","mode":"expand"}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        body_text(response.into_body()).await,
        "An error occurred while generating the note."
    );
}

fn openai_config(server: &MockServer) -> BackendConfig {
    BackendConfig {
        protocol: ProtocolType::OpenAI,
        base_url: format!("{}/v1", server.uri()),
        model: "llama3".to_string(),
        ..Default::default()
    }
}

fn chat_event(content: &str) -> String {
    format!(
        "data: {}\n\n",
        json!({"choices": [{"index": 0, "delta": {"content": content}}]})
    )
}

#[tokio::test]
async fn test_openai_compatible_stream() {
    let server = MockServer::start().await;

    let body = [
        json!({"choices": [{"index": 0, "delta": {"role": "assistant"}}]}),
        json!({"choices": [{"index": 0, "delta": {"content": "Chest pain, "}}]}),
        json!({"choices": [{"index": 0, "delta": {"content": "two days."}}]}),
    ]
    .iter()
    .map(|event| format!("data: {}\n\n", event))
    .collect::<String>()
        + "data: [DONE]\n\n";

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_partial_json(json!({
            "model": "llama3",
            "stream": true,
            "messages": [
                {"role": "system", "content": "Summarize."},
                {"role": "user", "content": "CP x2d"}
            ]
        })))
        .respond_with(sse_response(body))
        .expect(1)
        .mount(&server)
        .await;

    let backend = OpenAICompatibleBackend::new(&openai_config(&server), "sk-test".to_string()).unwrap();
    let chunks = collect_text(&backend, "Summarize.", "CP x2d").await;

    let text: String = chunks.concat();
    assert_eq!(text, "Chest pain, two days.");
}

#[tokio::test]
async fn test_openai_end_to_end_rejection() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": {"message": "Incorrect API key provided: sk-test", "type": "invalid_request_error"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let backend = OpenAICompatibleBackend::new(&openai_config(&server), "sk-test".to_string()).unwrap();
    let app = test_app(Arc::new(backend));

    let response = app
        .oneshot(generate_request(r#"{"shorthand":"CP x2d","mode":"summarize"}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let text = body_text(response.into_body()).await;
    assert_eq!(text, "An error occurred while generating the note.");
    assert!(!text.contains("sk-test"));
}

#[tokio::test]
async fn test_openai_end_to_end_mid_stream_error() {
    let server = MockServer::start().await;

    let body = format!(
        "{}data: {}\n\n{}",
        chat_event("Partial "),
        json!({"error": {"message": "The server had an error while processing your request."}}),
        chat_event("never sent")
    );

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(sse_response(body))
        .mount(&server)
        .await;

    let backend = OpenAICompatibleBackend::new(&openai_config(&server), "sk-test".to_string()).unwrap();
    let app = test_app(Arc::new(backend));

    let response = app
        .oneshot(generate_request(r#"{"shorthand":"CP x2d","mode":"summarize"}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_text(response.into_body()).await,
        "Partial Error generating response."
    );
}

#[tokio::test]
async fn test_gemini_truncated_final_event_is_dropped() {
    let server = MockServer::start().await;

    let body = format!(
        "{}data: {{\"candidates\":[{{\"content\":{{\"parts\":[{{\"text\":\"Hel",
        gemini_event("Complete sentence.")
    );

    Mock::given(method("POST"))
        .and(path(GEMINI_PATH))
        .respond_with(sse_response(body))
        .mount(&server)
        .await;

    let backend = GeminiBackend::new(&gemini_config(&server), "test-key".to_string()).unwrap();
    let chunks = collect_text(&backend, "Be concise.", "pt c/o HA").await;

    assert_eq!(chunks, vec!["Complete sentence.".to_string()]);
}

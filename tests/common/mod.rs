//! Shared helpers for integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use axum::{body::Body, http::Request, Router};
use futures::stream;
use medscribe_gateway::{
    api::routes::create_router,
    backend::{TextBackend, TextStream},
    config::Settings,
    AppError, AppState, Result,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

/// One scripted backend action
#[derive(Clone)]
pub enum Step {
    Chunk(String),
    Fail(String),
    /// Block until the gate is notified
    Wait(Arc<Notify>),
}

impl Step {
    pub fn chunk(text: &str) -> Self {
        Step::Chunk(text.to_string())
    }

    pub fn fail(message: &str) -> Self {
        Step::Fail(message.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendCall {
    pub system_instruction: String,
    pub user_text: String,
}

/// In-memory backend that replays a fixed script for every call
pub struct ScriptedBackend {
    steps: Vec<Step>,
    open_error: Option<String>,
    calls: Mutex<Vec<BackendCall>>,
    dropped: Arc<AtomicBool>,
}

impl ScriptedBackend {
    pub fn new(steps: Vec<Step>) -> Arc<Self> {
        Arc::new(Self {
            steps,
            open_error: None,
            calls: Mutex::new(Vec::new()),
            dropped: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Backend that rejects the call outright
    pub fn rejecting(message: &str) -> Arc<Self> {
        Arc::new(Self {
            steps: Vec::new(),
            open_error: Some(message.to_string()),
            calls: Mutex::new(Vec::new()),
            dropped: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn calls(&self) -> Vec<BackendCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Whether the last opened stream has been dropped
    pub fn stream_dropped(&self) -> bool {
        self.dropped.load(Ordering::SeqCst)
    }
}

struct DropFlag(Arc<AtomicBool>);

impl Drop for DropFlag {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl TextBackend for ScriptedBackend {
    fn name(&self) -> &str {
        "scripted"
    }

    fn model(&self) -> &str {
        "scripted-model"
    }

    async fn open_stream(&self, system_instruction: &str, user_text: &str) -> Result<TextStream> {
        self.calls.lock().unwrap().push(BackendCall {
            system_instruction: system_instruction.to_string(),
            user_text: user_text.to_string(),
        });

        if let Some(message) = &self.open_error {
            return Err(AppError::BackendError(message.clone()));
        }

        self.dropped.store(false, Ordering::SeqCst);
        let steps: VecDeque<Step> = self.steps.iter().cloned().collect();
        let flag = DropFlag(self.dropped.clone());

        Ok(Box::pin(stream::unfold((steps, flag), |(mut steps, flag)| async move {
            loop {
                match steps.pop_front()? {
                    Step::Chunk(text) => return Some((Ok(text), (steps, flag))),
                    Step::Fail(message) => {
                        return Some((Err(AppError::BackendError(message)), (steps, flag)))
                    }
                    Step::Wait(gate) => gate.notified().await,
                }
            }
        })))
    }
}

pub fn test_app(backend: Arc<dyn TextBackend>) -> Router {
    test_app_with_settings(Settings::default(), backend)
}

pub fn test_app_with_settings(settings: Settings, backend: Arc<dyn TextBackend>) -> Router {
    create_router(Arc::new(AppState::new(settings, backend)))
}

pub fn generate_request(body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/generate")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub async fn body_text(body: Body) -> String {
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

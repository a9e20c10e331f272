//! MedScribe Gateway
//!
//! Streams clinical shorthand through a text generation backend, either expanding
//! it into a full patient note or summarizing it into a narrative paragraph.

pub mod api;
pub mod backend;
pub mod config;
pub mod error;
pub mod gateway;

pub use error::{AppError, Result};

use std::sync::Arc;

use backend::TextBackend;
use gateway::{GenerationGateway, PromptProfiles};

/// Application state shared across all handlers
pub struct AppState {
    pub settings: Arc<config::Settings>,
    pub gateway: Arc<GenerationGateway>,
}

impl AppState {
    /// Wire the gateway from settings and an already constructed backend
    pub fn new(settings: config::Settings, backend: Arc<dyn TextBackend>) -> Self {
        let gateway = GenerationGateway::new(
            backend,
            PromptProfiles::from_config(&settings.prompts),
            settings.stream.idle_timeout(),
        );

        Self {
            settings: Arc::new(settings),
            gateway: Arc::new(gateway),
        }
    }
}

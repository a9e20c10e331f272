//! Backend module - text generation providers behind a streaming trait

pub mod gemini;
pub mod text_backend;

pub use gemini::GeminiBackend;
pub use text_backend::{create_text_backend, OpenAICompatibleBackend, TextBackend, TextStream};

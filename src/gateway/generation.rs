//! Streaming relay between a text backend and the HTTP response
//!
//! A request moves through `Validated -> Streaming -> Completed | ErroredMidStream`.
//! Nothing is sent to the caller until the backend has produced its first piece of
//! text, so a backend that fails early still gets a proper error status. Once text
//! has been relayed the status is fixed, and a later failure can only be reported
//! in-band with [`MID_STREAM_ERROR_MESSAGE`].

use bytes::Bytes;
use futures::stream::{self, Stream, StreamExt};
use std::convert::Infallible;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, Span};

use crate::backend::{TextBackend, TextStream};
use crate::error::{AppError, Result};
use crate::gateway::prompts::{Mode, PromptProfiles};

/// Trailing text emitted when the backend fails after streaming started
pub const MID_STREAM_ERROR_MESSAGE: &str = "Error generating response.";

/// Byte stream handed to the HTTP layer
pub type RelayStream = Pin<Box<dyn Stream<Item = std::result::Result<Bytes, Infallible>> + Send>>;

/// A validated generation request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub text: String,
    pub mode: Mode,
}

/// How a committed stream ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamOutcome {
    Completed,
    ErroredMidStream,
}

/// Maps requests to system instructions and relays backend output
pub struct GenerationGateway {
    backend: Arc<dyn TextBackend>,
    prompts: PromptProfiles,
    idle_timeout: Duration,
}

impl GenerationGateway {
    pub fn new(backend: Arc<dyn TextBackend>, prompts: PromptProfiles, idle_timeout: Duration) -> Self {
        Self {
            backend,
            prompts,
            idle_timeout,
        }
    }

    /// Open a backend stream for the request and return the relay.
    ///
    /// Returns `Err` when the backend fails before producing any text.
    pub async fn generate(&self, request: GenerationRequest) -> Result<RelayStream> {
        let instruction = self.prompts.instruction_for(request.mode);

        info!(
            backend = %self.backend.name(),
            model = %self.backend.model(),
            mode = %request.mode,
            text_len = request.text.len(),
            "Opening generation stream"
        );

        let mut upstream = self.backend.open_stream(instruction, &request.text).await?;

        let first = loop {
            match next_chunk(&mut upstream, self.idle_timeout).await {
                Some(Ok(chunk)) if chunk.is_empty() => continue,
                other => break other,
            }
        };

        match first {
            Some(Ok(chunk)) => Ok(relay(chunk, upstream, self.idle_timeout, Span::current())),
            Some(Err(e)) => Err(e),
            None => {
                info!(outcome = ?StreamOutcome::Completed, chunks = 0, "Backend finished without output");
                Ok(Box::pin(stream::empty()))
            }
        }
    }
}

async fn next_chunk(upstream: &mut TextStream, idle_timeout: Duration) -> Option<Result<String>> {
    match tokio::time::timeout(idle_timeout, upstream.next()).await {
        Ok(item) => item,
        Err(_) => Some(Err(AppError::Timeout(idle_timeout))),
    }
}

struct RelayState {
    pending: Option<String>,
    upstream: Option<TextStream>,
    idle_timeout: Duration,
    chunks: usize,
    span: Span,
}

/// Forward `first` and then every later non-empty chunk as it arrives.
///
/// Dropping the relay drops the upstream stream, which closes the backend connection.
fn relay(first: String, upstream: TextStream, idle_timeout: Duration, span: Span) -> RelayStream {
    let state = RelayState {
        pending: Some(first),
        upstream: Some(upstream),
        idle_timeout,
        chunks: 0,
        span,
    };

    Box::pin(stream::unfold(state, |mut state| async move {
        if let Some(chunk) = state.pending.take() {
            state.chunks += 1;
            return Some((Ok(Bytes::from(chunk)), state));
        }

        let item = loop {
            let upstream = state.upstream.as_mut()?;
            match next_chunk(upstream, state.idle_timeout).await {
                Some(Ok(chunk)) if chunk.is_empty() => continue,
                other => break other,
            }
        };

        match item {
            Some(Ok(chunk)) => {
                state.chunks += 1;
                Some((Ok(Bytes::from(chunk)), state))
            }
            Some(Err(e)) => {
                state.span.in_scope(|| {
                    error!(
                        error = %e,
                        chunks = state.chunks,
                        outcome = ?StreamOutcome::ErroredMidStream,
                        "Error during generation stream"
                    )
                });
                state.upstream = None;
                Some((Ok(Bytes::from_static(MID_STREAM_ERROR_MESSAGE.as_bytes())), state))
            }
            None => {
                state.span.in_scope(|| {
                    info!(chunks = state.chunks, outcome = ?StreamOutcome::Completed, "Generation stream finished")
                });
                None
            }
        }
    }))
}

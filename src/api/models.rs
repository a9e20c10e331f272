//! API request models

use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

use crate::error::{AppError, Result};
use crate::gateway::{GenerationRequest, Mode};

/// Note generation request body
#[derive(Debug, Clone, Default, Deserialize, Serialize, ToSchema)]
pub struct GenerateNoteRequest {
    /// Clinical shorthand to expand or summarize
    #[schema(example = "45yo M c/o CP x2d, worse w/ exertion. Hx HTN.")]
    pub shorthand: Option<String>,

    /// `expand` for a full sectioned note, anything else for a narrative summary
    #[schema(example = "expand")]
    pub mode: Option<String>,
}

impl GenerateNoteRequest {
    /// Parse a raw request body and validate it into a [`GenerationRequest`].
    ///
    /// Fields that are present but not strings count as missing.
    pub fn parse(body: &[u8]) -> Result<GenerationRequest> {
        let value: Value = serde_json::from_slice(body).map_err(|_| AppError::InvalidJson)?;

        let object = match value {
            Value::Object(map) if !map.is_empty() => map,
            _ => return Err(AppError::InvalidJson),
        };

        // A number or boolean `mode` is rejected here rather than falling through to summarize
        let field = |name: &str| object.get(name).and_then(Value::as_str).map(str::to_string);

        GenerateNoteRequest {
            shorthand: field("shorthand"),
            mode: field("mode"),
        }
        .try_into()
    }
}

impl TryFrom<GenerateNoteRequest> for GenerationRequest {
    type Error = AppError;

    fn try_from(request: GenerateNoteRequest) -> Result<Self> {
        match (request.shorthand, request.mode) {
            (Some(text), Some(mode)) if !text.is_empty() && !mode.is_empty() => Ok(GenerationRequest {
                text,
                mode: Mode::from(mode.as_str()),
            }),
            _ => Err(AppError::MissingFields),
        }
    }
}

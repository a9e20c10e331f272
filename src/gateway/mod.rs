//! Generation gateway - prompt selection and the streaming relay

pub mod generation;
pub mod prompts;

pub use generation::{GenerationGateway, GenerationRequest, RelayStream, MID_STREAM_ERROR_MESSAGE};
pub use prompts::{Mode, PromptProfiles};

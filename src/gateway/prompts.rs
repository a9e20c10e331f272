//! Prompt profiles mapping a mode to its system instruction

use crate::config::PromptConfig;

pub const DEFAULT_EXPAND_INSTRUCTION: &str = "As a medical transcriptionist, expand the user's clinical shorthand into a full, professional patient note. Format the note into sections (e.g., History, Complaint, Plan), correct obvious typos, and maintain a neutral clinical tone. Do not add information not present in the shorthand.";

pub const DEFAULT_SUMMARIZE_INSTRUCTION: &str = "You are a medical assistant summarizing a clinician's shorthand. Your task is to synthesize the shorthand into a concise, narrative paragraph. Use complete sentences and a professional, clinical tone. Do NOT use bullet points, markdown formatting, or any descriptive headers.";

/// Output style requested by the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Expand,
    Summarize,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Expand => "expand",
            Mode::Summarize => "summarize",
        }
    }
}

impl From<&str> for Mode {
    /// Only the exact keyword `expand` selects expansion; anything else summarizes.
    fn from(value: &str) -> Self {
        if value == "expand" {
            Mode::Expand
        } else {
            Mode::Summarize
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The two system instructions, fixed for the lifetime of the process
#[derive(Debug, Clone)]
pub struct PromptProfiles {
    expand: String,
    summarize: String,
}

impl PromptProfiles {
    pub fn new(expand: impl Into<String>, summarize: impl Into<String>) -> Self {
        Self {
            expand: expand.into(),
            summarize: summarize.into(),
        }
    }

    pub fn from_config(config: &PromptConfig) -> Self {
        Self::new(config.expand.clone(), config.summarize.clone())
    }

    pub fn instruction_for(&self, mode: Mode) -> &str {
        match mode {
            Mode::Expand => &self.expand,
            Mode::Summarize => &self.summarize,
        }
    }
}

impl Default for PromptProfiles {
    fn default() -> Self {
        Self::new(DEFAULT_EXPAND_INSTRUCTION, DEFAULT_SUMMARIZE_INSTRUCTION)
    }
}

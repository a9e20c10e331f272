//! Application settings and configuration management

use crate::error::{AppError, Result};
use crate::gateway::prompts::{DEFAULT_EXPAND_INSTRUCTION, DEFAULT_SUMMARIZE_INSTRUCTION};
use axum::http::HeaderValue;
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Default location of the optional settings file
pub const DEFAULT_CONFIG_PATH: &str = "config/gateway.yaml";

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Settings {
    pub server: ServerConfig,
    pub cors: CorsConfig,
    pub backend: BackendConfig,
    pub stream: StreamConfig,
    pub prompts: PromptConfig,
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Mount Swagger UI and the OpenAPI document
    #[serde(default)]
    pub docs_enabled: bool,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}

/// Cross-origin policy for the API routes
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CorsConfig {
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,
}

fn default_allowed_origins() -> Vec<String> {
    vec![
        "http://localhost:5173".to_string(),
        "http://medscribe-ai-9.test".to_string(),
    ]
}

/// Protocol spoken by the text generation backend
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProtocolType {
    #[default]
    Gemini,
    OpenAI,
}

impl std::fmt::Display for ProtocolType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProtocolType::Gemini => write!(f, "gemini"),
            ProtocolType::OpenAI => write!(f, "openai"),
        }
    }
}

/// Text generation backend configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BackendConfig {
    #[serde(default)]
    pub protocol: ProtocolType,

    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_model")]
    pub model: String,

    /// Environment variable holding the API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Inline API key, takes precedence over `api_key_env`
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_ms: u64,
}

fn default_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

fn default_model() -> String {
    "gemini-1.5-flash-latest".to_string()
}

fn default_api_key_env() -> String {
    "API_KEY".to_string()
}

fn default_connect_timeout() -> u64 {
    10000
}

impl BackendConfig {
    /// Resolve the API key from the inline value or the configured environment variable
    pub fn resolve_api_key(&self) -> Result<String> {
        if let Some(key) = self.api_key.as_ref().filter(|k| !k.is_empty()) {
            return Ok(key.clone());
        }

        match std::env::var(&self.api_key_env) {
            Ok(key) if !key.is_empty() => Ok(key),
            _ => Err(AppError::config(format!(
                "{} is not defined in the environment variables.",
                self.api_key_env
            ))),
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

/// Streaming behaviour
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StreamConfig {
    /// Longest wait for the next backend chunk
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_ms: u64,
}

fn default_idle_timeout() -> u64 {
    60000
}

impl StreamConfig {
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }
}

/// System instructions for the two modes
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PromptConfig {
    #[serde(default = "default_expand")]
    pub expand: String,
    #[serde(default = "default_summarize")]
    pub summarize: String,
}

fn default_expand() -> String {
    DEFAULT_EXPAND_INSTRUCTION.to_string()
}

fn default_summarize() -> String {
    DEFAULT_SUMMARIZE_INSTRUCTION.to_string()
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

impl Settings {
    /// Load settings from the default file location and environment variables
    pub fn load() -> Result<Self> {
        Self::load_from_path(DEFAULT_CONFIG_PATH)
    }

    /// Load settings from a YAML or TOML file, then apply environment overrides
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let format = if path.extension().map_or(false, |ext| ext == "yaml" || ext == "yml") {
            FileFormat::Yaml
        } else {
            FileFormat::Toml
        };

        let mut config_builder = Config::builder()
            .set_default("server.host", default_host())?
            .set_default("server.port", i64::from(default_port()))?
            .set_default("server.docs_enabled", false)?
            .set_default("cors.allowed_origins", default_allowed_origins())?
            .set_default("backend.protocol", "gemini")?
            .set_default("backend.base_url", default_base_url())?
            .set_default("backend.model", default_model())?
            .set_default("backend.api_key_env", default_api_key_env())?
            .set_default("backend.connect_timeout_ms", default_connect_timeout() as i64)?
            .set_default("stream.idle_timeout_ms", default_idle_timeout() as i64)?
            .set_default("prompts.expand", DEFAULT_EXPAND_INSTRUCTION)?
            .set_default("prompts.summarize", DEFAULT_SUMMARIZE_INSTRUCTION)?
            .set_default("logging.level", default_log_level())?
            .set_default("logging.format", default_log_format())?;

        if path.exists() {
            config_builder = config_builder.add_source(File::from(path).format(format));
        }

        config_builder = config_builder
            .add_source(
                Environment::with_prefix("MEDSCRIBE")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("cors.allowed_origins")
                    .try_parsing(true),
            )
            // Plain MODEL_NAME is honoured for compatibility with existing deployments
            .set_override_option("backend.model", std::env::var("MODEL_NAME").ok())?;

        let settings: Settings = config_builder.build()?.try_deserialize()?;
        Ok(settings)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(AppError::config("Server port cannot be 0"));
        }

        if self.backend.base_url.trim().is_empty() {
            return Err(AppError::config("Backend base_url cannot be empty"));
        }

        if self.backend.model.trim().is_empty() {
            return Err(AppError::config("Backend model cannot be empty"));
        }

        if self.stream.idle_timeout_ms == 0 {
            return Err(AppError::config("Stream idle timeout cannot be 0"));
        }

        if self.prompts.expand.trim().is_empty() || self.prompts.summarize.trim().is_empty() {
            return Err(AppError::config("Prompt instructions cannot be empty"));
        }

        for origin in &self.cors.allowed_origins {
            if origin.parse::<HeaderValue>().is_err() {
                return Err(AppError::config(format!("Invalid CORS origin '{}'", origin)));
            }
        }

        Ok(())
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: default_host(),
                port: default_port(),
                docs_enabled: false,
            },
            cors: CorsConfig {
                allowed_origins: default_allowed_origins(),
            },
            backend: BackendConfig::default(),
            stream: StreamConfig {
                idle_timeout_ms: default_idle_timeout(),
            },
            prompts: PromptConfig {
                expand: default_expand(),
                summarize: default_summarize(),
            },
            logging: LoggingConfig {
                level: default_log_level(),
                format: default_log_format(),
            },
        }
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            protocol: ProtocolType::default(),
            base_url: default_base_url(),
            model: default_model(),
            api_key_env: default_api_key_env(),
            api_key: None,
            connect_timeout_ms: default_connect_timeout(),
        }
    }
}

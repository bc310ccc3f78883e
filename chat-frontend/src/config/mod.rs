use crate::services::providers::gemini::GEMINI_API_BASE;
use chat_core::config as core_config;
use chat_core::error::AppError;
use secrecy::Secret;
use serde::Deserialize;
use std::env;

/// Default system instruction sent with every generation call.
const DEFAULT_SYSTEM_PROMPT: &str = "You are a concise, friendly assistant. \
    Answer using the conversation so far, and cite web sources when they are available.";

#[derive(Debug, Clone, Deserialize)]
pub struct ChatConfig {
    #[serde(flatten)]
    pub common: core_config::Config,
    pub google: GoogleConfig,
    pub models: ModelConfig,
    pub generation: GenerationConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GoogleConfig {
    pub api_key: Secret<String>,
    /// Generation endpoint base; overridable for tests.
    pub api_base_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelConfig {
    /// Chat model (e.g., gemini-2.5-flash).
    pub text_model: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GenerationConfig {
    /// Fixed instruction sent with every call.
    pub system_prompt: String,
    /// Whether answers are grounded with web search.
    pub grounding_enabled: bool,
    /// Maximum attempts when network-level failures are retried.
    pub max_retries: u32,
}

impl ChatConfig {
    pub fn load() -> Result<Self, AppError> {
        let common_config = core_config::Config::load()?;
        let is_prod = env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string()) == "prod";

        Ok(ChatConfig {
            common: common_config,
            google: GoogleConfig {
                // No default anywhere: a missing key halts startup.
                api_key: Secret::new(get_env("GEMINI_API_KEY", None, is_prod)?),
                api_base_url: get_env("GEMINI_API_BASE_URL", Some(GEMINI_API_BASE), is_prod)?,
            },
            models: ModelConfig {
                text_model: get_env("CHAT_TEXT_MODEL", Some("gemini-2.5-flash"), is_prod)?,
            },
            generation: GenerationConfig {
                system_prompt: get_env("CHAT_SYSTEM_PROMPT", Some(DEFAULT_SYSTEM_PROMPT), is_prod)?,
                grounding_enabled: get_env("CHAT_GROUNDING_ENABLED", Some("true"), is_prod)?
                    .parse()
                    .unwrap_or(true),
                max_retries: get_env("CHAT_MAX_RETRIES", Some("5"), is_prod)?
                    .parse()
                    .unwrap_or(5),
            },
        })
    }
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required in production but not set",
                    key
                )))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required but not set",
                    key
                )))
            }
        }
    }
}

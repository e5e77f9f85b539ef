use crate::services::providers::gemini::GEMINI_API_BASE;
use serde::Deserialize;
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;
use std::time::Duration;

const DEFAULT_TEXT_MODEL: &str = "gemini-1.5-flash";
const DEFAULT_GENERATION_TIMEOUT_SECS: u64 = 20;
const DEFAULT_SESSION_TTL_SECS: u64 = 3600;
const DEFAULT_DEMO_SWEEP_PROBABILITY: f64 = 0.1;

#[derive(Debug, Clone, Deserialize)]
pub struct TalespinConfig {
    #[serde(flatten)]
    pub common: core_config::Config,
    pub google: GoogleConfig,
    pub models: ModelConfig,
    pub generation: GenerationSettings,
    pub sessions: SessionSettings,
    pub streaming: StreamingSettings,
    pub otlp_endpoint: Option<String>,
}

#[derive(Clone, Deserialize)]
pub struct GoogleConfig {
    /// Absent means every generation call falls back locally.
    pub api_key: Option<String>,
    pub api_base: String,
}

impl std::fmt::Debug for GoogleConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoogleConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("api_base", &self.api_base)
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelConfig {
    /// Model for story text (e.g., gemini-1.5-flash)
    pub text_model: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GenerationSettings {
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionSettings {
    pub ttl_secs: u64,
    /// Chance that a demo call also sweeps expired sessions.
    pub demo_sweep_probability: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StreamingSettings {
    /// Apply per-style delays between streamed chunks.
    pub pacing: bool,
}

impl TalespinConfig {
    pub fn load() -> Result<Self, AppError> {
        let common_config = core_config::Config::load()?;
        let is_prod = env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string()) == "prod";

        Ok(TalespinConfig {
            common: common_config,
            google: GoogleConfig {
                api_key: get_optional_env("GOOGLE_API_KEY")
                    .or_else(|| get_optional_env("GEMINI_API_KEY")),
                api_base: get_env("GEMINI_API_BASE", Some(GEMINI_API_BASE), is_prod)?,
            },
            models: ModelConfig {
                text_model: get_env("TALESPIN_TEXT_MODEL", Some(DEFAULT_TEXT_MODEL), is_prod)?,
            },
            generation: GenerationSettings {
                timeout_secs: parse_or(
                    get_optional_env("TALESPIN_GENERATION_TIMEOUT_SECS"),
                    DEFAULT_GENERATION_TIMEOUT_SECS,
                ),
            },
            sessions: SessionSettings {
                ttl_secs: parse_or(
                    get_optional_env("TALESPIN_SESSION_TTL_SECS"),
                    DEFAULT_SESSION_TTL_SECS,
                ),
                demo_sweep_probability: parse_or(
                    get_optional_env("TALESPIN_DEMO_SWEEP_PROBABILITY"),
                    DEFAULT_DEMO_SWEEP_PROBABILITY,
                )
                .clamp(0.0, 1.0),
            },
            streaming: StreamingSettings {
                pacing: parse_or(get_optional_env("TALESPIN_STREAM_PACING"), true),
            },
            otlp_endpoint: get_optional_env("OTLP_ENDPOINT"),
        })
    }

    /// Settings for local runs and tests: no API key, random port.
    pub fn local() -> Self {
        TalespinConfig {
            common: core_config::Config {
                port: 0,
                ..Default::default()
            },
            google: GoogleConfig {
                api_key: None,
                api_base: GEMINI_API_BASE.to_string(),
            },
            models: ModelConfig {
                text_model: DEFAULT_TEXT_MODEL.to_string(),
            },
            generation: GenerationSettings {
                timeout_secs: DEFAULT_GENERATION_TIMEOUT_SECS,
            },
            sessions: SessionSettings {
                ttl_secs: DEFAULT_SESSION_TTL_SECS,
                demo_sweep_probability: DEFAULT_DEMO_SWEEP_PROBABILITY,
            },
            streaming: StreamingSettings { pacing: false },
            otlp_endpoint: None,
        }
    }

    pub fn generation_timeout(&self) -> Duration {
        Duration::from_secs(self.generation.timeout_secs)
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.sessions.ttl_secs)
    }
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if let Some(def) = default {
                Ok(def.to_string())
            } else if is_prod {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required in production but not set",
                    key
                )))
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required but not set",
                    key
                )))
            }
        }
    }
}

/// Unset and blank values are treated alike.
fn get_optional_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_or<T: std::str::FromStr>(value: Option<String>, default: T) -> T {
    value
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

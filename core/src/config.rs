//! Process configuration read once from the environment at start-up.
//!
//! Values come through a lookup function so callers (and tests) decide where
//! they originate; the server binary loads `.env` first and then passes
//! `std::env::var`.

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

use crate::agents::config::{
    is_placeholder, ProviderConfig, ProviderName, DEFAULT_MAX_OUTPUT_TOKENS, DEFAULT_TEMPERATURE,
    DEFAULT_TIMEOUT_MS,
};

const DEFAULT_SECRET_KEY: &str = "change-me-in-production";
const DEFAULT_TOKEN_TTL_MINUTES: i64 = 30;
/// One year.
const MAX_TOKEN_TTL_MINUTES: i64 = 525_600;
const DEFAULT_CORS_ORIGIN: &str = "http://localhost:3000";

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{key} must be a positive integer, got {value:?}")]
    NotPositive { key: String, value: String },
    #[error("{key} must be at most {max}, got {value:?}")]
    TooLarge { key: String, value: String, max: i64 },
    #[error("{key} must be a number between 0 and 1, got {value:?}")]
    TemperatureOutOfRange { key: String, value: String },
    #[error("endpoint for {0} provider is empty")]
    EmptyEndpoint(ProviderName),
    #[error("model for {0} provider is empty")]
    EmptyModel(ProviderName),
}

/// Token signing and password hashing parameters.
#[derive(Debug, Clone)]
pub struct AuthSettings {
    pub secret_key: SecretString,
    pub token_ttl_minutes: i64,
    pub password_cost: u32,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            secret_key: SecretString::from(DEFAULT_SECRET_KEY),
            token_ttl_minutes: DEFAULT_TOKEN_TTL_MINUTES,
            password_cost: bcrypt::DEFAULT_COST,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub auth: AuthSettings,
    pub cors_origin: String,
    pub providers: Vec<ProviderConfig>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let secret_key = match get("SECRET_KEY") {
            Some(secret) if !is_placeholder(&secret) => SecretString::from(secret),
            _ => SecretString::from(DEFAULT_SECRET_KEY),
        };
        let token_ttl_minutes = positive(&get, "ACCESS_TOKEN_EXPIRE_MINUTES", DEFAULT_TOKEN_TTL_MINUTES as u64)?;
        let token_ttl_minutes = i64::try_from(token_ttl_minutes)
            .ok()
            .filter(|minutes| *minutes <= MAX_TOKEN_TTL_MINUTES)
            .ok_or_else(|| ConfigError::TooLarge {
                key: "ACCESS_TOKEN_EXPIRE_MINUTES".into(),
                value: token_ttl_minutes.to_string(),
                max: MAX_TOKEN_TTL_MINUTES,
            })?;

        let timeout_ms = positive(&get, "AI_TIMEOUT_MS", DEFAULT_TIMEOUT_MS)?;
        let max_output_tokens = positive(&get, "AI_MAX_OUTPUT_TOKENS", DEFAULT_MAX_OUTPUT_TOKENS as u64)?;
        let max_output_tokens = u32::try_from(max_output_tokens).map_err(|_| ConfigError::NotPositive {
            key: "AI_MAX_OUTPUT_TOKENS".into(),
            value: max_output_tokens.to_string(),
        })?;
        let temperature = temperature(&get, "AI_TEMPERATURE")?;

        let mut providers = Vec::new();
        for name in ProviderName::ALL {
            let (key_var, endpoint_var, model_var) = env_keys(name);
            let mut config = ProviderConfig::defaults(name);
            if let Some(credential) = get(key_var) {
                config = config.with_credential(credential);
            }
            if let Some(endpoint) = get(endpoint_var) {
                config.endpoint = endpoint;
            }
            if let Some(model) = get(model_var) {
                config.model = model;
            }
            config.timeout_ms = timeout_ms;
            config.max_output_tokens = max_output_tokens;
            config.temperature = temperature;
            config.validate()?;
            providers.push(config);
        }

        Ok(Self {
            auth: AuthSettings {
                secret_key,
                token_ttl_minutes,
                password_cost: bcrypt::DEFAULT_COST,
            },
            cors_origin: get("CORS_ORIGIN").unwrap_or_else(|| DEFAULT_CORS_ORIGIN.to_string()),
            providers,
        })
    }

    /// Providers that hold a usable credential, for start-up diagnostics.
    pub fn configured_providers(&self) -> Vec<ProviderName> {
        self.providers
            .iter()
            .filter(|config| config.is_configured())
            .map(|config| config.name)
            .collect()
    }

    pub fn uses_default_secret(&self) -> bool {
        self.auth.secret_key.expose_secret() == DEFAULT_SECRET_KEY
    }
}

fn env_keys(name: ProviderName) -> (&'static str, &'static str, &'static str) {
    match name {
        ProviderName::Primary => ("GEMINI_API_KEY", "GEMINI_ENDPOINT", "GEMINI_MODEL"),
        ProviderName::Secondary => ("OPENAI_API_KEY", "OPENAI_ENDPOINT", "OPENAI_MODEL"),
        ProviderName::Tertiary => ("GITHUB_TOKEN", "GITHUB_ENDPOINT", "GITHUB_MODEL"),
    }
}

fn positive(get: &impl Fn(&str) -> Option<String>, key: &str, default: u64) -> Result<u64, ConfigError> {
    match get(key) {
        None => Ok(default),
        Some(raw) => match raw.trim().parse::<u64>() {
            Ok(value) if value > 0 => Ok(value),
            _ => Err(ConfigError::NotPositive {
                key: key.to_string(),
                value: raw,
            }),
        },
    }
}

fn temperature(get: &impl Fn(&str) -> Option<String>, key: &str) -> Result<f32, ConfigError> {
    match get(key) {
        None => Ok(DEFAULT_TEMPERATURE),
        Some(raw) => match raw.trim().parse::<f32>() {
            Ok(value) if (0.0..=1.0).contains(&value) => Ok(value),
            _ => Err(ConfigError::TemperatureOutOfRange {
                key: key.to_string(),
                value: raw,
            }),
        },
    }
}

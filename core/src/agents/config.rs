use std::fmt;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;

use crate::config::ConfigError;

/// Position of a provider in the reply chain. The derived ordering is the
/// priority order in which providers are attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderName {
    Primary,
    Secondary,
    Tertiary,
}

impl ProviderName {
    pub const ALL: [ProviderName; 3] = [Self::Primary, Self::Secondary, Self::Tertiary];

    /// Name of the hosted service behind each slot.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Primary => "gemini",
            Self::Secondary => "openai",
            Self::Tertiary => "github",
        }
    }
}

impl fmt::Display for ProviderName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

struct ProviderSeed {
    name: ProviderName,
    endpoint: &'static str,
    model: &'static str,
}

const PROVIDER_SEEDS: &[ProviderSeed] = &[
    ProviderSeed {
        name: ProviderName::Primary,
        endpoint: "https://generativelanguage.googleapis.com/v1beta/models",
        model: "gemini-1.5-flash",
    },
    ProviderSeed {
        name: ProviderName::Secondary,
        endpoint: "https://api.openai.com/v1",
        model: "gpt-4o-mini",
    },
    ProviderSeed {
        name: ProviderName::Tertiary,
        endpoint: "https://models.github.ai/inference",
        model: "openai/gpt-5",
    },
];

pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 200;
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

/// Everything needed to call one external text-generation provider.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub name: ProviderName,
    pub credential: Option<SecretString>,
    pub endpoint: String,
    pub model: String,
    pub timeout_ms: u64,
    pub max_output_tokens: u32,
    pub temperature: f32,
}

impl ProviderConfig {
    /// Seeded endpoint and model for `name`, without a credential.
    pub fn defaults(name: ProviderName) -> Self {
        let seed = PROVIDER_SEEDS
            .iter()
            .find(|seed| seed.name == name)
            .unwrap_or(&PROVIDER_SEEDS[0]);
        Self {
            name,
            credential: None,
            endpoint: seed.endpoint.to_string(),
            model: seed.model.to_string(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            max_output_tokens: DEFAULT_MAX_OUTPUT_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
        }
    }

    pub fn with_credential(mut self, credential: impl Into<String>) -> Self {
        self.credential = Some(SecretString::from(credential.into()));
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// True when the credential is present and not a template placeholder.
    pub fn is_configured(&self) -> bool {
        let has_secret = self
            .credential
            .as_ref()
            .is_some_and(|secret| !is_placeholder(secret.expose_secret()));
        has_secret && !self.endpoint.trim().is_empty()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.endpoint.trim().is_empty() {
            return Err(ConfigError::EmptyEndpoint(self.name));
        }
        if self.model.trim().is_empty() {
            return Err(ConfigError::EmptyModel(self.name));
        }
        if self.timeout_ms == 0 {
            return Err(ConfigError::NotPositive {
                key: format!("{}.timeout_ms", self.name),
                value: "0".into(),
            });
        }
        if self.max_output_tokens == 0 {
            return Err(ConfigError::NotPositive {
                key: format!("{}.max_output_tokens", self.name),
                value: "0".into(),
            });
        }
        if !(0.0..=1.0).contains(&self.temperature) {
            return Err(ConfigError::TemperatureOutOfRange {
                key: format!("{}.temperature", self.name),
                value: self.temperature.to_string(),
            });
        }
        Ok(())
    }
}

/// Template values such as `your-openai-api-key` count as missing.
pub fn is_placeholder(secret: &str) -> bool {
    let trimmed = secret.trim();
    trimmed.is_empty() || trimmed.to_ascii_lowercase().starts_with("your-")
}

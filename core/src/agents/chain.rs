//! Ordered provider fallback chain.
//!
//! Providers are tried one after another in priority order, each under its
//! own timeout, and the first usable answer wins. When every provider fails
//! (or none is configured) the rule-based responder answers instead, so a
//! call always yields text. Worst-case latency is the sum of the configured
//! timeouts. Dropping the returned future cancels the in-flight request and
//! no further provider is attempted.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use reqwest::Client;
use serde::Serialize;

use super::config::{ProviderConfig, ProviderName};
use super::fallback;
use super::prompt::{ChatContext, Prompt};
use super::providers::{build_client, ProviderClient, ProviderError};

/// Text produced by a provider.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProviderResult {
    pub text: String,
    pub provider_name: ProviderName,
}

/// Which branch of the chain produced the reply.
#[derive(Debug, Clone, PartialEq)]
pub enum ChainOutcome {
    Success(ProviderResult),
    Fallback(String),
}

impl ChainOutcome {
    pub fn text(&self) -> &str {
        match self {
            Self::Success(result) => &result.text,
            Self::Fallback(text) => text,
        }
    }

    pub fn into_text(self) -> String {
        match self {
            Self::Success(result) => result.text,
            Self::Fallback(text) => text,
        }
    }

    /// Provider that answered, `None` for the rule-based fallback.
    pub fn provider(&self) -> Option<ProviderName> {
        match self {
            Self::Success(result) => Some(result.provider_name),
            Self::Fallback(_) => None,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Self::Fallback(_))
    }
}

/// Reply generator that owns one client per configured provider.
pub struct ProviderChain {
    clients: Vec<Arc<dyn ProviderClient>>,
}

impl ProviderChain {
    /// Build clients for every provider with a usable credential, in
    /// priority order. Providers without one are skipped here and never
    /// called.
    pub fn from_configs(configs: &[ProviderConfig]) -> Result<Self> {
        let http = Client::builder()
            .user_agent(concat!("LoackIn/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("failed to construct HTTP client")?;

        let mut usable = Vec::new();
        for config in configs {
            if config.is_configured() {
                usable.push(config.clone());
            } else {
                log::info!("{} provider has no credential, leaving it out of the chain", config.name);
            }
        }
        usable.sort_by_key(|config| config.name);
        usable.dedup_by_key(|config| config.name);

        let clients = usable
            .into_iter()
            .map(|config| build_client(http.clone(), config))
            .collect();
        Ok(Self::with_clients(clients))
    }

    /// Use the given clients in the given order.
    pub fn with_clients(clients: Vec<Arc<dyn ProviderClient>>) -> Self {
        Self { clients }
    }

    pub fn providers(&self) -> Vec<ProviderName> {
        self.clients.iter().map(|client| client.name()).collect()
    }

    /// Answer `message`, trying each provider in turn before falling back
    /// to the rule-based responder. Never fails.
    pub async fn generate_reply(
        &self,
        message: &str,
        context: Option<&ChatContext>,
    ) -> ChainOutcome {
        let Some(prompt) = Prompt::new(message, context) else {
            log::debug!("blank message, skipping providers");
            return fallback_outcome(message);
        };

        for client in &self.clients {
            let name = client.name();
            let started = Instant::now();
            match attempt(client.as_ref(), &prompt).await {
                Ok(text) => {
                    log::info!("{name} provider answered in {:?}", started.elapsed());
                    return ChainOutcome::Success(ProviderResult {
                        text,
                        provider_name: name,
                    });
                }
                Err(err) => {
                    log::warn!(
                        "{name} provider failed after {:?}: {err}; trying next",
                        started.elapsed()
                    );
                }
            }
        }

        if !self.clients.is_empty() {
            log::warn!("all {} providers failed, using fallback rules", self.clients.len());
        }
        fallback_outcome(message)
    }

    /// [`generate_reply`](Self::generate_reply) reduced to its text.
    pub async fn reply(&self, message: &str, context: Option<&ChatContext>) -> String {
        self.generate_reply(message, context).await.into_text()
    }
}

async fn attempt(client: &dyn ProviderClient, prompt: &Prompt) -> Result<String, ProviderError> {
    let bound: Duration = client.timeout();
    let text = match tokio::time::timeout(bound, client.generate(prompt)).await {
        Ok(result) => result?,
        Err(_) => return Err(ProviderError::Timeout(bound)),
    };
    if text.trim().is_empty() {
        return Err(ProviderError::MalformedResponse("empty reply".into()));
    }
    Ok(text)
}

fn fallback_outcome(message: &str) -> ChainOutcome {
    ChainOutcome::Fallback(fallback::respond(message).to_string())
}

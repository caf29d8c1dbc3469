pub mod chain;
pub mod config;
pub mod fallback;
pub mod prompt;
pub mod providers;

pub use chain::{ChainOutcome, ProviderChain, ProviderResult};
pub use config::{ProviderConfig, ProviderName};
pub use prompt::{ChatContext, Prompt};
pub use providers::{ProviderClient, ProviderError};

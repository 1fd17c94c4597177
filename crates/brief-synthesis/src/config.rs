//! Synthesis client configuration.

use std::time::Duration;

use crate::error::{SynthesisError, SynthesisResult};

/// Freshness window for cached provider responses.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(30 * 60);

/// Configuration for the synthesis client.
#[derive(Clone)]
pub struct SynthesisConfig {
    /// Base URL of the provider API
    pub base_url: String,
    /// Static API credential sent as `x-api-key`
    pub api_key: String,
    /// Request timeout
    pub timeout: Duration,
    /// Freshness window for terminal job snapshots and persona listings
    pub cache_ttl: Duration,
}

impl SynthesisConfig {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            timeout: Duration::from_secs(30),
            cache_ttl: DEFAULT_CACHE_TTL,
        }
    }

    /// Create config from environment variables.
    pub fn from_env() -> SynthesisResult<Self> {
        let api_key = std::env::var("SYNTHESIS_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| SynthesisError::Config("SYNTHESIS_API_KEY must be set".to_string()))?;

        Ok(Self {
            base_url: std::env::var("SYNTHESIS_API_URL")
                .unwrap_or_else(|_| "http://localhost:8090/v1".to_string()),
            api_key,
            timeout: Duration::from_secs(
                std::env::var("SYNTHESIS_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            ),
            cache_ttl: std::env::var("SYNTHESIS_CACHE_TTL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_CACHE_TTL),
        })
    }
}

impl std::fmt::Debug for SynthesisConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SynthesisConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .field("timeout", &self.timeout)
            .field("cache_ttl", &self.cache_ttl)
            .finish()
    }
}

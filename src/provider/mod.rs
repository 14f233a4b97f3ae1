pub mod credentials;
pub mod fixture;
pub mod http;
pub mod official;
pub mod rapid;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::ProviderConfig;
use crate::domain::{Post, SourceCategory, SourceSpec};

pub use credentials::CredentialSet;
pub use fixture::FixtureProvider;
pub use official::OfficialApiProvider;
pub use rapid::RapidApiProvider;

/// Failure reported by a provider for a single source fetch.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("Unauthorized: check your API credentials")]
    Unauthorized,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Rate limit or quota exhausted")]
    QuotaExhausted,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Failed to decode response: {0}")]
    Decode(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("{0}")]
    Other(String),
}

impl FetchError {
    /// Only quota exhaustion triggers a key rotation.
    pub fn is_quota_exhausted(&self) -> bool {
        matches!(self, FetchError::QuotaExhausted)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Multi-key REST aggregator.
    #[default]
    RapidApi,
    /// Official v2 API.
    Official,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::RapidApi => "rapidapi",
            ProviderKind::Official => "official",
        }
    }

    pub fn supports(&self, category: SourceCategory) -> bool {
        match self {
            ProviderKind::RapidApi => category != SourceCategory::HomeTimeline,
            ProviderKind::Official => category != SourceCategory::Communities,
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Backend capability: fetch up to `limit` posts for one source.
///
/// `credential` is the currently active key of the credential set; providers
/// that authenticate some other way may ignore it when empty.
#[async_trait]
pub trait Provider {
    fn kind(&self) -> ProviderKind;

    async fn fetch(
        &self,
        spec: &SourceSpec,
        limit: usize,
        credential: &str,
    ) -> Result<Vec<Post>, FetchError>;
}

/// Build the provider selected in the config.
pub fn build_provider(config: &ProviderConfig) -> Arc<dyn Provider + Send + Sync> {
    match config.kind {
        ProviderKind::RapidApi => Arc::new(RapidApiProvider::new(config)),
        ProviderKind::Official => Arc::new(OfficialApiProvider::new(config)),
    }
}

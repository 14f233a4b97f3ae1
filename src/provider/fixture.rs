//! Offline provider that replays posts from a local JSON file.
//!
//! Accepts either a plain array of posts or a saved RapidAPI timeline response.

use std::path::Path;

use async_trait::async_trait;
use serde_json::Value;

use crate::app::{Result, XflowError};
use crate::domain::{Post, SourceSpec};
use crate::provider::rapid::parse_timeline;
use crate::provider::{FetchError, Provider, ProviderKind};

pub struct FixtureProvider {
    kind: ProviderKind,
    posts: Vec<Post>,
}

impl FixtureProvider {
    pub fn new(kind: ProviderKind, posts: Vec<Post>) -> Self {
        Self { kind, posts }
    }

    pub fn from_file<P: AsRef<Path>>(kind: ProviderKind, path: P) -> Result<Self> {
        let body = std::fs::read(path.as_ref())?;
        let json: Value = serde_json::from_slice(&body)?;

        let posts = if json.is_array() {
            serde_json::from_value(json)?
        } else {
            parse_timeline(&json).map_err(|e| {
                XflowError::Other(format!(
                    "{} is not a post list or timeline: {}",
                    path.as_ref().display(),
                    e
                ))
            })?
        };

        Ok(Self::new(kind, posts))
    }

    pub fn len(&self) -> usize {
        self.posts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.posts.is_empty()
    }
}

#[async_trait]
impl Provider for FixtureProvider {
    fn kind(&self) -> ProviderKind {
        self.kind
    }

    async fn fetch(
        &self,
        _spec: &SourceSpec,
        limit: usize,
        _credential: &str,
    ) -> std::result::Result<Vec<Post>, FetchError> {
        Ok(self.posts.iter().take(limit).cloned().collect())
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single fetched post. The `id` is the only key used for de-duplication.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub author_id: Option<String>,
    #[serde(default)]
    pub author_name: Option<String>,
    #[serde(default)]
    pub author_handle: Option<String>,
    #[serde(default)]
    pub author_avatar_url: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_verified: Option<bool>,
    #[serde(default)]
    pub follower_count: Option<u64>,
}

impl Post {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            author_id: None,
            author_name: None,
            author_handle: None,
            author_avatar_url: None,
            created_at: None,
            is_verified: None,
            follower_count: None,
        }
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = Some(created_at);
        self
    }

    pub fn with_author(mut self, name: Option<String>, handle: Option<String>) -> Self {
        self.author_name = name;
        self.author_handle = handle;
        self
    }

    pub fn with_follower_count(mut self, count: u64) -> Self {
        self.follower_count = Some(count);
        self
    }

    pub fn with_verified(mut self, verified: bool) -> Self {
        self.is_verified = Some(verified);
        self
    }

    pub fn display_handle(&self) -> &str {
        self.author_handle.as_deref().unwrap_or("User")
    }

    /// Link to the post on x.com. Falls back to the `i` pseudo-handle.
    pub fn permalink(&self) -> String {
        let handle = self.author_handle.as_deref().unwrap_or("i");
        format!("https://x.com/{}/status/{}", handle, self.id)
    }

    /// Short age like `12s`, `5m`, `3h`, `2d`. Empty when the timestamp is unknown.
    pub fn relative_timestamp(&self, now: DateTime<Utc>) -> String {
        let Some(created_at) = self.created_at else {
            return String::new();
        };
        let diff = now.signed_duration_since(created_at).num_seconds();

        if diff < 60 {
            format!("{}s", diff.max(1))
        } else if diff < 3600 {
            format!("{}m", diff / 60)
        } else if diff < 86400 {
            format!("{}h", diff / 3600)
        } else {
            format!("{}d", diff / 86400)
        }
    }
}

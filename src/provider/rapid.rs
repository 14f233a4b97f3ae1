//! Multi-key REST aggregator backend (RapidAPI `twitter241`).

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use html_escape::decode_html_entities;
use reqwest::Client;
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::config::ProviderConfig;
use crate::domain::{Post, SourceSpec};
use crate::provider::http::{build_client, read_json};
use crate::provider::{FetchError, Provider, ProviderKind};

pub const DEFAULT_HOST: &str = "twitter241.p.rapidapi.com";

const CREATED_AT_FORMAT: &str = "%a %b %d %H:%M:%S %z %Y";

pub struct RapidApiProvider {
    client: Client,
    host: String,
    base_url: String,
    user_ids: Mutex<HashMap<String, String>>,
}

impl RapidApiProvider {
    pub fn new(config: &ProviderConfig) -> Self {
        let host = if config.rapidapi_host.trim().is_empty() {
            DEFAULT_HOST.to_string()
        } else {
            config.rapidapi_host.trim().to_string()
        };
        let base_url = config
            .rapidapi_base_url
            .clone()
            .unwrap_or_else(|| format!("https://{}", host));

        Self {
            client: build_client(config.request_timeout()),
            host,
            base_url: base_url.trim_end_matches('/').to_string(),
            user_ids: Mutex::new(HashMap::new()),
        }
    }

    async fn get(&self, path: &str, params: &[(&str, &str)], key: &str) -> Result<Value, FetchError> {
        let url = Url::parse_with_params(&format!("{}/{}", self.base_url, path), params)
            .map_err(|e| FetchError::Other(format!("Invalid URL: {}", e)))?;

        debug!("GET {}", url.path());
        let response = self
            .client
            .get(url)
            .header("X-RapidAPI-Key", key)
            .header("X-RapidAPI-Host", &self.host)
            .send()
            .await?;

        read_json(response, path).await
    }

    async fn user_id(&self, username: &str, key: &str) -> Result<String, FetchError> {
        let cache_key = username.to_lowercase();
        if let Some(id) = self.cached_user_id(&cache_key) {
            return Ok(id);
        }

        let json = self.get("user", &[("username", username)], key).await?;
        let id = json
            .pointer("/result/data/user/result/rest_id")
            .and_then(Value::as_str)
            .ok_or_else(|| FetchError::NotFound(format!("user @{}", username)))?
            .to_string();

        if let Ok(mut cache) = self.user_ids.lock() {
            cache.insert(cache_key, id.clone());
        }
        Ok(id)
    }

    fn cached_user_id(&self, username: &str) -> Option<String> {
        self.user_ids.lock().ok()?.get(username).cloned()
    }

    async fn search(&self, query: &str, count: &str, key: &str) -> Result<Value, FetchError> {
        let params = [("type", "Latest"), ("count", count), ("query", query)];
        match self.get("search-v3", &params, key).await {
            Err(e) if !e.is_quota_exhausted() => {
                debug!("search-v3 failed ({}), falling back to search-v2", e);
                self.get("search-v2", &params, key).await
            }
            other => other,
        }
    }
}

#[async_trait]
impl Provider for RapidApiProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::RapidApi
    }

    async fn fetch(
        &self,
        spec: &SourceSpec,
        limit: usize,
        credential: &str,
    ) -> Result<Vec<Post>, FetchError> {
        if credential.is_empty() {
            return Err(FetchError::Unauthorized);
        }
        let count = limit.to_string();

        let json = match spec {
            SourceSpec::UserHandle(handle) => {
                let user_id = self.user_id(handle, credential).await?;
                self.get("user-tweets", &[("user", user_id.as_str()), ("count", count.as_str())], credential)
                    .await?
            }
            SourceSpec::SearchQuery(query) => self.search(query, &count, credential).await?,
            SourceSpec::ListId(id) => {
                self.get("list-timeline", &[("listId", id.as_str()), ("count", count.as_str())], credential)
                    .await?
            }
            SourceSpec::CommunityId(id) => {
                self.get(
                    "explore-community-timeline",
                    &[("topicId", id.as_str()), ("count", count.as_str())],
                    credential,
                )
                .await?
            }
            SourceSpec::HomeTimeline(_) => {
                return Err(FetchError::Other(
                    "Home timeline is not available from RapidAPI".into(),
                ))
            }
        };

        let mut posts = parse_timeline(&json)?;
        posts.truncate(limit);
        Ok(posts)
    }
}

/// Walk `result.timeline.instructions` and collect every tweet entry.
pub fn parse_timeline(json: &Value) -> Result<Vec<Post>, FetchError> {
    let instructions = json
        .pointer("/result/timeline/instructions")
        .and_then(Value::as_array)
        .ok_or_else(|| FetchError::Decode("missing timeline instructions".into()))?;

    let mut posts = Vec::new();
    for instruction in instructions {
        let entries = instruction
            .get("entries")
            .and_then(Value::as_array)
            .map(|e| e.iter().collect::<Vec<_>>())
            .or_else(|| instruction.get("entry").map(|e| vec![e]))
            .unwrap_or_default();

        for entry in entries {
            if let Some(result) = entry.pointer("/content/itemContent/tweet_results/result") {
                posts.extend(convert_tweet(result));
            }
            // Conversation modules nest their tweets one level deeper.
            if let Some(items) = entry.pointer("/content/items").and_then(Value::as_array) {
                posts.extend(
                    items
                        .iter()
                        .filter_map(|i| i.pointer("/item/itemContent/tweet_results/result"))
                        .filter_map(convert_tweet),
                );
            }
        }
    }
    Ok(posts)
}

fn convert_tweet(result: &Value) -> Option<Post> {
    // TweetWithVisibilityResults wraps the real tweet.
    let tweet = if result.get("legacy").is_some() {
        result
    } else {
        result.get("tweet")?
    };
    let legacy = tweet.get("legacy")?;

    let id = legacy
        .get("id_str")
        .or_else(|| tweet.get("rest_id"))
        .and_then(Value::as_str)?;
    let text = tweet
        .pointer("/note_tweet/note_tweet_results/result/text")
        .or_else(|| legacy.get("full_text"))
        .and_then(Value::as_str)?;

    let mut post = Post::new(id, decode_html_entities(text).to_string());
    post.created_at = legacy
        .get("created_at")
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_str(s, CREATED_AT_FORMAT).ok())
        .map(|dt| dt.with_timezone(&Utc));

    if let Some(user) = tweet.pointer("/core/user_results/result") {
        let user_legacy = user.get("legacy");
        let field = |name: &str| {
            user_legacy
                .and_then(|l| l.get(name))
                .or_else(|| user.pointer(&format!("/core/{}", name)))
                .and_then(Value::as_str)
                .map(String::from)
        };

        post.author_id = user.get("rest_id").and_then(Value::as_str).map(String::from);
        post.author_name = field("name");
        post.author_handle = field("screen_name");
        post.author_avatar_url = user_legacy
            .and_then(|l| l.get("profile_image_url_https"))
            .or_else(|| user.pointer("/avatar/image_url"))
            .and_then(Value::as_str)
            .map(String::from);
        post.follower_count = user_legacy
            .and_then(|l| l.get("followers_count"))
            .and_then(Value::as_u64);
        post.is_verified = user
            .get("is_blue_verified")
            .or_else(|| user_legacy.and_then(|l| l.get("verified")))
            .and_then(Value::as_bool);
    }

    Some(post)
}

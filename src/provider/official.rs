//! Official v2 API backend.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use html_escape::decode_html_entities;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::config::ProviderConfig;
use crate::domain::{Post, SourceSpec};
use crate::provider::http::{build_client, classify_status, read_json};
use crate::provider::{FetchError, Provider, ProviderKind};

pub const DEFAULT_BASE_URL: &str = "https://api.x.com";

const TWEET_FIELDS: &str = "created_at,author_id";
const USER_FIELDS: &str = "name,username,profile_image_url,verified,public_metrics";

pub struct OfficialApiProvider {
    client: Client,
    base_url: String,
    api_key: String,
    api_secret: String,
    user_token: String,
    app_token: Mutex<Option<String>>,
    user_ids: Mutex<HashMap<String, String>>,
}

#[derive(Debug, Deserialize)]
struct TimelineResponse {
    #[serde(default)]
    data: Vec<ApiTweet>,
    includes: Option<Includes>,
}

#[derive(Debug, Deserialize)]
struct ApiTweet {
    id: String,
    text: String,
    author_id: Option<String>,
    created_at: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Includes {
    #[serde(default)]
    users: Vec<ApiUser>,
}

#[derive(Debug, Deserialize)]
struct ApiUser {
    id: String,
    name: Option<String>,
    username: Option<String>,
    profile_image_url: Option<String>,
    verified: Option<bool>,
    public_metrics: Option<PublicMetrics>,
}

#[derive(Debug, Deserialize)]
struct PublicMetrics {
    followers_count: Option<u64>,
}

impl OfficialApiProvider {
    pub fn new(config: &ProviderConfig) -> Self {
        let base_url = config
            .official_base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        Self {
            client: build_client(config.request_timeout()),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: config.official_api_key.trim().to_string(),
            api_secret: config.official_api_secret.trim().to_string(),
            user_token: config.official_user_token.trim().to_string(),
            app_token: Mutex::new(None),
            user_ids: Mutex::new(HashMap::new()),
        }
    }

    /// Bearer token for app-only endpoints: the active credential if any,
    /// otherwise one exchanged from the consumer key and secret.
    async fn app_token(&self, credential: &str) -> Result<String, FetchError> {
        if !credential.is_empty() {
            return Ok(credential.to_string());
        }
        if let Some(token) = self.app_token.lock().ok().and_then(|t| t.clone()) {
            return Ok(token);
        }
        if self.api_key.is_empty() || self.api_secret.is_empty() {
            return Err(FetchError::Unauthorized);
        }

        let response = self
            .client
            .post(format!("{}/oauth2/token", self.base_url))
            .basic_auth(&self.api_key, Some(&self.api_secret))
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded;charset=UTF-8")
            .body("grant_type=client_credentials")
            .send()
            .await?;

        let status = response.status();
        let body = response.bytes().await?;
        if !status.is_success() {
            return Err(match classify_status(status, &body, "oauth2/token") {
                FetchError::QuotaExhausted => FetchError::QuotaExhausted,
                _ => FetchError::Unauthorized,
            });
        }

        let json: Value =
            serde_json::from_slice(&body).map_err(|e| FetchError::Decode(e.to_string()))?;
        let token = json
            .get("access_token")
            .and_then(Value::as_str)
            .ok_or_else(|| FetchError::Decode("missing access_token".into()))?
            .to_string();

        if let Ok(mut cached) = self.app_token.lock() {
            *cached = Some(token.clone());
        }
        Ok(token)
    }

    async fn get(&self, path: &str, params: &[(&str, &str)], token: &str) -> Result<Value, FetchError> {
        let url = Url::parse_with_params(&format!("{}/2/{}", self.base_url, path), params)
            .map_err(|e| FetchError::Other(format!("Invalid URL: {}", e)))?;

        debug!("GET {}", url.path());
        let response = self.client.get(url).bearer_auth(token.trim()).send().await?;
        read_json(response, path).await
    }

    async fn user_id(&self, username: &str, token: &str) -> Result<String, FetchError> {
        let username = username.to_lowercase();
        if let Some(id) = self.user_ids.lock().ok().and_then(|c| c.get(&username).cloned()) {
            return Ok(id);
        }

        let json = self
            .get(&format!("users/by/username/{}", username), &[], token)
            .await?;
        let id = json
            .pointer("/data/id")
            .and_then(Value::as_str)
            .ok_or_else(|| FetchError::NotFound(format!("user @{}", username)))?
            .to_string();

        if let Ok(mut cache) = self.user_ids.lock() {
            cache.insert(username, id.clone());
        }
        Ok(id)
    }

    async fn timeline(
        &self,
        path: &str,
        limit: usize,
        min_results: usize,
        extra: &[(&str, &str)],
        token: &str,
    ) -> Result<Vec<Post>, FetchError> {
        let max_results = limit.clamp(min_results, 100).to_string();
        let mut params = vec![
            ("max_results", max_results.as_str()),
            ("tweet.fields", TWEET_FIELDS),
            ("expansions", "author_id"),
            ("user.fields", USER_FIELDS),
        ];
        params.extend_from_slice(extra);

        let json = self.get(path, &params, token).await?;
        let response: TimelineResponse =
            serde_json::from_value(json).map_err(|e| FetchError::Decode(e.to_string()))?;

        let mut posts = map_timeline(response);
        posts.truncate(limit);
        Ok(posts)
    }
}

#[async_trait]
impl Provider for OfficialApiProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Official
    }

    async fn fetch(
        &self,
        spec: &SourceSpec,
        limit: usize,
        credential: &str,
    ) -> Result<Vec<Post>, FetchError> {
        match spec {
            SourceSpec::UserHandle(handle) => {
                let token = self.app_token(credential).await?;
                let user_id = self.user_id(handle, &token).await?;
                self.timeline(&format!("users/{}/tweets", user_id), limit, 5, &[], &token)
                    .await
            }
            SourceSpec::SearchQuery(query) => {
                let token = self.app_token(credential).await?;
                self.timeline("tweets/search/recent", limit, 10, &[("query", query.as_str())], &token)
                    .await
            }
            SourceSpec::ListId(id) => {
                let token = self.app_token(credential).await?;
                self.timeline(&format!("lists/{}/tweets", id), limit, 5, &[], &token)
                    .await
            }
            SourceSpec::HomeTimeline(handle) => {
                // Reverse-chronological home timeline needs a user-context token.
                if self.user_token.is_empty() {
                    return Err(FetchError::Unauthorized);
                }
                let user_id = self.user_id(handle, &self.user_token).await?;
                self.timeline(
                    &format!("users/{}/timelines/reverse_chronological", user_id),
                    limit,
                    5,
                    &[],
                    &self.user_token,
                )
                .await
            }
            SourceSpec::CommunityId(_) => Err(FetchError::Other(
                "Communities are not available from the official API".into(),
            )),
        }
    }
}

fn map_timeline(response: TimelineResponse) -> Vec<Post> {
    let users: HashMap<String, ApiUser> = response
        .includes
        .map(|i| i.users)
        .unwrap_or_default()
        .into_iter()
        .map(|u| (u.id.clone(), u))
        .collect();

    response
        .data
        .into_iter()
        .map(|tweet| {
            let user = tweet.author_id.as_ref().and_then(|id| users.get(id));
            let mut post = Post::new(tweet.id, decode_html_entities(&tweet.text).to_string());
            post.created_at = tweet
                .created_at
                .as_deref()
                .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                .map(|dt| dt.with_timezone(&Utc));
            post.author_id = tweet.author_id.clone();
            if let Some(user) = user {
                post.author_name = user.name.clone();
                post.author_handle = user.username.clone();
                post.author_avatar_url = user.profile_image_url.clone();
                post.is_verified = user.verified;
                post.follower_count = user.public_metrics.as_ref().and_then(|m| m.followers_count);
            }
            post
        })
        .collect()
}

use std::sync::Arc;

use serde_json::{json, Value};
use wiremock::matchers::{body_string, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use xflow::aggregator::Aggregator;
use xflow::config::{Config, ProviderConfig};
use xflow::domain::SourceSpec;
use xflow::provider::{FetchError, OfficialApiProvider, Provider, ProviderKind, RapidApiProvider};

fn rapid_tweet(id: &str, text: &str, created_at: &str) -> Value {
    json!({
        "rest_id": id,
        "core": {"user_results": {"result": {
            "rest_id": "42",
            "legacy": {"name": "Amy", "screen_name": "amy", "followers_count": 10}
        }}},
        "legacy": {"id_str": id, "full_text": text, "created_at": created_at}
    })
}

fn rapid_timeline(tweets: Vec<Value>) -> Value {
    let entries: Vec<Value> = tweets
        .into_iter()
        .map(|t| json!({"content": {"itemContent": {"tweet_results": {"result": t}}}}))
        .collect();
    json!({"result": {"timeline": {"instructions": [{"entries": entries}]}}})
}

fn rapid_config(server: &MockServer) -> ProviderConfig {
    ProviderConfig {
        rapidapi_base_url: Some(server.uri()),
        ..ProviderConfig::default()
    }
}

async fn mount_user_lookup(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/user"))
        .and(query_param("username", "amy"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": {"data": {"user": {"result": {"rest_id": "42"}}}}
        })))
        .expect(1)
        .mount(server)
        .await;
}

#[tokio::test]
async fn rapid_user_tweets_resolve_handle_once() {
    let server = MockServer::start().await;
    mount_user_lookup(&server).await;
    Mock::given(method("GET"))
        .and(path("/user-tweets"))
        .and(query_param("user", "42"))
        .and(header("X-RapidAPI-Key", "key-a"))
        .respond_with(ResponseTemplate::new(200).set_body_json(rapid_timeline(vec![
            rapid_tweet("1", "first", "Tue Jun 02 20:12:29 +0000 2009"),
            rapid_tweet("2", "second", "Tue Jun 02 20:13:29 +0000 2009"),
        ])))
        .mount(&server)
        .await;

    let provider = RapidApiProvider::new(&rapid_config(&server));
    let spec = SourceSpec::UserHandle("amy".into());

    let posts = provider.fetch(&spec, 1, "key-a").await.unwrap();
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].author_handle.as_deref(), Some("amy"));

    // Second fetch hits the user-id cache.
    let posts = provider.fetch(&spec, 10, "key-a").await.unwrap();
    assert_eq!(posts.len(), 2);
}

#[tokio::test]
async fn rapid_search_falls_back_to_v2() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search-v3"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/search-v2"))
        .and(query_param("query", "rust lang"))
        .respond_with(ResponseTemplate::new(200).set_body_json(rapid_timeline(vec![
            rapid_tweet("9", "found", "Tue Jun 02 20:12:29 +0000 2009"),
        ])))
        .mount(&server)
        .await;

    let provider = RapidApiProvider::new(&rapid_config(&server));
    let posts = provider
        .fetch(&SourceSpec::SearchQuery("rust lang".into()), 10, "k")
        .await
        .unwrap();
    assert_eq!(posts[0].id, "9");
}

#[tokio::test]
async fn rapid_quota_is_not_retried_on_v2() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search-v3"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/search-v2"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let provider = RapidApiProvider::new(&rapid_config(&server));
    let err = provider
        .fetch(&SourceSpec::SearchQuery("q".into()), 10, "k")
        .await
        .unwrap_err();
    assert_eq!(err, FetchError::QuotaExhausted);
}

#[tokio::test]
async fn rapid_status_classification() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/list-timeline"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({"message": "plan"})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/explore-community-timeline"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let provider = RapidApiProvider::new(&rapid_config(&server));
    let list = provider.fetch(&SourceSpec::ListId("1".into()), 5, "k").await;
    assert_eq!(list.unwrap_err(), FetchError::Forbidden("plan".into()));

    let community = provider
        .fetch(&SourceSpec::CommunityId("2".into()), 5, "k")
        .await;
    assert_eq!(community.unwrap_err(), FetchError::Unauthorized);

    let missing_key = provider.fetch(&SourceSpec::ListId("1".into()), 5, "").await;
    assert_eq!(missing_key.unwrap_err(), FetchError::Unauthorized);
}

#[tokio::test]
async fn aggregator_rotates_key_against_live_provider() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/list-timeline"))
        .and(header("X-RapidAPI-Key", "key-a"))
        .respond_with(ResponseTemplate::new(429))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/list-timeline"))
        .and(header("X-RapidAPI-Key", "key-b"))
        .respond_with(ResponseTemplate::new(200).set_body_json(rapid_timeline(vec![
            rapid_tweet("2", "newer", "Tue Jun 02 20:13:29 +0000 2009"),
            rapid_tweet("1", "older", "Tue Jun 02 20:12:29 +0000 2009"),
        ])))
        .mount(&server)
        .await;

    let mut config = Config::default();
    config.sources.lists = "77".into();
    config.provider = rapid_config(&server);
    config.provider.rapidapi_keys = vec!["key-a".into(), "key-b".into()];

    let provider: Arc<dyn Provider + Send + Sync> =
        Arc::new(RapidApiProvider::new(&config.provider));
    let mut aggregator = Aggregator::new(provider, config.provider.credential_set());

    let outcome = aggregator.run_pass(&config).await;
    assert!(outcome.error.is_none());
    let ids: Vec<_> = outcome.accepted.iter().map(|p| p.id.as_str()).collect();
    assert_eq!(ids, ["1", "2"]);
    assert_eq!(aggregator.credentials().active_key(), "key-b");
}

fn official_config(server: &MockServer) -> ProviderConfig {
    ProviderConfig {
        kind: ProviderKind::Official,
        official_base_url: Some(server.uri()),
        ..ProviderConfig::default()
    }
}

fn official_timeline() -> Value {
    json!({
        "data": [{"id": "5", "text": "hello", "author_id": "u1", "created_at": "2024-01-01T00:00:00Z"}],
        "includes": {"users": [{"id": "u1", "username": "amy", "public_metrics": {"followers_count": 3}}]}
    })
}

#[tokio::test]
async fn official_exchanges_consumer_keys_for_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .and(body_string("grant_type=client_credentials"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"token_type": "bearer", "access_token": "app-token"})),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/2/tweets/search/recent"))
        .and(header("Authorization", "Bearer app-token"))
        .and(query_param("max_results", "10"))
        .respond_with(ResponseTemplate::new(200).set_body_json(official_timeline()))
        .mount(&server)
        .await;

    let mut config = official_config(&server);
    config.official_api_key = "ck".into();
    config.official_api_secret = "cs".into();
    let provider = OfficialApiProvider::new(&config);
    let spec = SourceSpec::SearchQuery("rust".into());

    let posts = provider.fetch(&spec, 3, "").await.unwrap();
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].author_handle.as_deref(), Some("amy"));
    assert_eq!(posts[0].follower_count, Some(3));

    // Token is cached after the first exchange.
    provider.fetch(&spec, 3, "").await.unwrap();
}

#[tokio::test]
async fn official_user_tweets_with_bearer_credential() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/2/users/by/username/amy"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {"id": "u1"}})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/2/users/u1/tweets"))
        .and(header("Authorization", "Bearer tok"))
        .and(query_param("max_results", "100"))
        .respond_with(ResponseTemplate::new(200).set_body_json(official_timeline()))
        .mount(&server)
        .await;

    let provider = OfficialApiProvider::new(&official_config(&server));
    let posts = provider
        .fetch(&SourceSpec::UserHandle("amy".into()), 500, "tok")
        .await
        .unwrap();
    assert_eq!(posts[0].id, "5");
}

#[tokio::test]
async fn official_home_timeline_needs_user_token() {
    let server = MockServer::start().await;
    let provider = OfficialApiProvider::new(&official_config(&server));

    let err = provider
        .fetch(&SourceSpec::HomeTimeline("amy".into()), 10, "tok")
        .await
        .unwrap_err();
    assert_eq!(err, FetchError::Unauthorized);

    let err = provider
        .fetch(&SourceSpec::CommunityId("1".into()), 10, "tok")
        .await
        .unwrap_err();
    assert!(matches!(err, FetchError::Other(_)));
}

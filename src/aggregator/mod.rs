//! One fetch pass across every configured source.
//!
//! A pass fetches sources sequentially in resolution order, rotates the
//! credential once on quota exhaustion and restarts from the first source,
//! then dedups, filters and orders what came back. Accepted posts are
//! returned oldest first and appended to the history.

pub mod filter;
pub mod history;

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::config::Config;
use crate::domain::{resolve_sources, Post, SourceSpec};
use crate::provider::{CredentialSet, FetchError, Provider};
use crate::store::Store;

pub use history::History;

/// Per-source limit once the initial backlog has been served.
pub const SUBSEQUENT_FETCH_LIMIT: usize = 10;

/// Result of one pass. `error` may be set while `accepted` is non-empty when
/// a later source failed after earlier ones succeeded.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct PassOutcome {
    pub accepted: Vec<Post>,
    pub error: Option<FetchError>,
}

pub struct Aggregator {
    provider: Arc<dyn Provider + Send + Sync>,
    credentials: CredentialSet,
    history: History,
    first_pass: bool,
    store: Option<Arc<dyn Store + Send + Sync>>,
}

impl Aggregator {
    pub fn new(provider: Arc<dyn Provider + Send + Sync>, credentials: CredentialSet) -> Self {
        Self {
            provider,
            credentials,
            history: History::new(),
            first_pass: true,
            store: None,
        }
    }

    /// Attach a store and restore the persisted key index for these credentials.
    pub fn with_store(mut self, store: Arc<dyn Store + Send + Sync>) -> Self {
        self.store = Some(store);
        self.restore_rotation();
        self
    }

    pub fn credentials(&self) -> &CredentialSet {
        &self.credentials
    }

    pub fn set_credentials(&mut self, credentials: CredentialSet) {
        self.credentials = credentials;
        self.restore_rotation();
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn is_first_pass(&self) -> bool {
        self.first_pass
    }

    /// Forget everything accepted so far; the next pass serves the backlog again.
    pub fn reset(&mut self) {
        self.history.clear();
        self.first_pass = true;
    }

    pub async fn run_pass(&mut self, config: &Config) -> PassOutcome {
        let specs = resolve_sources(&config.sources, self.provider.kind());
        if specs.is_empty() {
            debug!("No sources configured, skipping pass");
            return PassOutcome::default();
        }

        self.history.set_max_len(config.polling.max_history);
        let first_pass = self.first_pass;
        let limit = if first_pass {
            config.polling.initial_backlog
        } else {
            SUBSEQUENT_FETCH_LIMIT
        };
        let timeout = config.provider.request_timeout();

        let mut fetched = Vec::new();
        let mut retried = false;
        let error = loop {
            match self.fetch_all(&specs, limit, timeout, &mut fetched).await {
                Ok(()) => break None,
                Err(e) if e.is_quota_exhausted() && !retried && self.rotate_key() => {
                    retried = true;
                    info!("Retrying pass with the next key");
                }
                Err(e) => {
                    warn!(error = %e, "Pass ended early");
                    break Some(e);
                }
            }
        };

        let fetched_count = fetched.len();
        let batch = filter::dedup_batch(fetched);
        let batch = filter::drop_seen(batch, &self.history);
        let mut batch = filter::apply_filters(batch, &config.filters);
        filter::sort_newest_first(&mut batch);
        if first_pass {
            batch.truncate(config.polling.initial_backlog);
        }
        batch.reverse();

        self.history.extend(batch.iter().cloned());
        self.first_pass = false;

        info!(
            sources = specs.len(),
            fetched = fetched_count,
            accepted = batch.len(),
            history = self.history.len(),
            "Pass complete"
        );

        PassOutcome {
            accepted: batch,
            error,
        }
    }

    /// Fetch every source in order, appending into `out`. Stops at the first failure.
    async fn fetch_all(
        &self,
        specs: &[SourceSpec],
        limit: usize,
        timeout: Duration,
        out: &mut Vec<Post>,
    ) -> Result<(), FetchError> {
        for spec in specs {
            let posts = self.fetch_source(spec, limit, timeout).await?;
            debug!(source = %spec, count = posts.len(), "Fetched source");
            self.record_cursor(spec, &posts);
            out.extend(posts);
        }
        Ok(())
    }

    async fn fetch_source(
        &self,
        spec: &SourceSpec,
        limit: usize,
        timeout: Duration,
    ) -> Result<Vec<Post>, FetchError> {
        let key = self.credentials.active_key();
        match tokio::time::timeout(timeout, self.provider.fetch(spec, limit, key)).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::Transport(format!(
                "{} timed out after {}s",
                spec,
                timeout.as_secs()
            ))),
        }
    }

    fn rotate_key(&mut self) -> bool {
        let previous = self.credentials.active_key_fingerprint();
        if !self.credentials.rotate() {
            warn!(key = %previous, "Quota exhausted and no other key to rotate to");
            return false;
        }

        warn!(
            from = %previous,
            to = %self.credentials.active_key_fingerprint(),
            index = self.credentials.active_index(),
            "Quota exhausted, rotated key"
        );
        if let Some(store) = &self.store {
            if let Err(e) = store.save_rotation(
                self.provider.kind(),
                &self.credentials.fingerprint(),
                self.credentials.active_index(),
            ) {
                warn!(error = %e, "Failed to persist key rotation");
            }
        }
        true
    }

    fn restore_rotation(&mut self) {
        let Some(store) = &self.store else {
            return;
        };
        match store.load_rotation(self.provider.kind()) {
            Ok(Some(state)) if state.keys_fingerprint == self.credentials.fingerprint() => {
                self.credentials.set_active_index(state.active_index);
                debug!(index = self.credentials.active_index(), "Restored key index");
            }
            Ok(_) => {}
            Err(e) => warn!(error = %e, "Failed to load rotation state"),
        }
    }

    fn record_cursor(&self, spec: &SourceSpec, posts: &[Post]) {
        let Some(store) = &self.store else {
            return;
        };
        let newest = posts
            .iter()
            .reduce(|a, b| if b.created_at > a.created_at { b } else { a });
        if let Some(post) = newest {
            if let Err(e) = store.set_source_cursor(&spec.source_key(), &post.id, post.created_at) {
                warn!(source = %spec, error = %e, "Failed to record source cursor");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::{DateTime, TimeZone, Utc};

    use crate::provider::ProviderKind;
    use crate::store::SqliteStore;

    /// Answers per (source key, credential); unknown pairs return nothing.
    #[derive(Default)]
    struct ScriptedProvider {
        responses: HashMap<(String, String), Result<Vec<Post>, FetchError>>,
        calls: Mutex<Vec<(String, String, usize)>>,
    }

    impl ScriptedProvider {
        fn respond(
            mut self,
            source: &str,
            key: &str,
            result: Result<Vec<Post>, FetchError>,
        ) -> Self {
            self.responses
                .insert((source.to_string(), key.to_string()), result);
            self
        }

        fn calls(&self) -> Vec<(String, String, usize)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Provider for ScriptedProvider {
        fn kind(&self) -> ProviderKind {
            ProviderKind::RapidApi
        }

        async fn fetch(
            &self,
            spec: &SourceSpec,
            limit: usize,
            credential: &str,
        ) -> Result<Vec<Post>, FetchError> {
            let source = spec.source_key();
            self.calls
                .lock()
                .unwrap()
                .push((source.clone(), credential.to_string(), limit));
            self.responses
                .get(&(source, credential.to_string()))
                .cloned()
                .unwrap_or_else(|| Ok(Vec::new()))
        }
    }

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, hour, 0, 0).unwrap()
    }

    fn post(id: &str, hour: u32) -> Post {
        Post::new(id, format!("post {}", id)).with_created_at(at(hour))
    }

    fn config_for(handles: &str, search: &str) -> Config {
        let mut config = Config::default();
        config.sources.user_handles = handles.to_string();
        config.sources.search_query = search.to_string();
        config
    }

    fn ids(posts: &[Post]) -> Vec<&str> {
        posts.iter().map(|p| p.id.as_str()).collect()
    }

    fn aggregator(provider: ScriptedProvider, keys: &[&str]) -> (Aggregator, Arc<ScriptedProvider>) {
        let provider = Arc::new(provider);
        let agg = Aggregator::new(provider.clone(), CredentialSet::new(keys));
        (agg, provider)
    }

    #[tokio::test]
    async fn test_second_identical_pass_accepts_nothing() {
        let provider = ScriptedProvider::default()
            .respond("handle:alice", "k", Ok(vec![post("1", 1), post("2", 2)]));
        let (mut agg, _) = aggregator(provider, &["k"]);
        let config = config_for("alice", "");

        let first = agg.run_pass(&config).await;
        assert_eq!(first.accepted.len(), 2);
        assert!(first.error.is_none());

        let second = agg.run_pass(&config).await;
        assert!(second.accepted.is_empty());
        assert!(second.error.is_none());
        assert_eq!(agg.history().len(), 2);
    }

    #[tokio::test]
    async fn test_duplicate_across_sources_kept_once() {
        let shared = Post::new("7", "from handle").with_created_at(at(5));
        let mut dup = shared.clone();
        dup.text = "from search".to_string();

        let provider = ScriptedProvider::default()
            .respond("handle:alice", "k", Ok(vec![shared]))
            .respond("search:rust", "k", Ok(vec![dup, post("8", 6)]));
        let (mut agg, _) = aggregator(provider, &["k"]);

        let outcome = agg.run_pass(&config_for("alice", "rust")).await;
        assert_eq!(ids(&outcome.accepted), ["7", "8"]);
        assert_eq!(outcome.accepted[0].text, "from handle");
    }

    #[tokio::test]
    async fn test_accepted_posts_are_oldest_first() {
        let provider = ScriptedProvider::default()
            .respond("handle:alice", "k", Ok(vec![post("b", 2), post("c", 3), post("a", 1)]));
        let (mut agg, _) = aggregator(provider, &["k"]);

        let outcome = agg.run_pass(&config_for("alice", "")).await;
        assert_eq!(ids(&outcome.accepted), ["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_first_pass_keeps_most_recent_backlog() {
        let provider = ScriptedProvider::default().respond(
            "handle:alice",
            "k",
            Ok(vec![post("1", 1), post("5", 5), post("3", 3), post("2", 2), post("4", 4)]),
        );
        let (mut agg, provider) = aggregator(provider, &["k"]);
        let mut config = config_for("alice", "");
        config.polling.initial_backlog = 2;

        let outcome = agg.run_pass(&config).await;
        assert_eq!(ids(&outcome.accepted), ["4", "5"]);

        agg.run_pass(&config).await;
        let limits: Vec<_> = provider.calls().iter().map(|c| c.2).collect();
        assert_eq!(limits, [2, SUBSEQUENT_FETCH_LIMIT]);
    }

    #[tokio::test]
    async fn test_follower_window_applied_when_enabled() {
        let provider = ScriptedProvider::default().respond(
            "handle:alice",
            "k",
            Ok(vec![
                post("99", 1).with_follower_count(99),
                post("100", 2).with_follower_count(100),
                post("none", 3),
            ]),
        );
        let (mut agg, _) = aggregator(provider, &["k"]);
        let mut config = config_for("alice", "");
        config.filters.enabled = true;
        config.filters.min_followers_enabled = true;
        config.filters.min_followers = 100;

        let outcome = agg.run_pass(&config).await;
        assert_eq!(ids(&outcome.accepted), ["100"]);
    }

    #[tokio::test]
    async fn test_quota_rotates_and_retries_from_start() {
        let provider = ScriptedProvider::default()
            .respond("handle:alice", "A", Ok(vec![post("1", 1)]))
            .respond("handle:bob", "A", Err(FetchError::QuotaExhausted))
            .respond("handle:alice", "B", Ok(vec![post("1", 1)]))
            .respond("handle:bob", "B", Ok(vec![post("2", 2)]));
        let (mut agg, provider) = aggregator(provider, &["A", "B"]);

        let outcome = agg.run_pass(&config_for("alice,bob", "")).await;
        assert!(outcome.error.is_none());
        assert_eq!(ids(&outcome.accepted), ["1", "2"]);
        assert_eq!(agg.credentials().active_key(), "B");

        let order: Vec<_> = provider
            .calls()
            .into_iter()
            .map(|(source, key, _)| format!("{}@{}", source, key))
            .collect();
        assert_eq!(
            order,
            ["handle:alice@A", "handle:bob@A", "handle:alice@B", "handle:bob@B"]
        );
    }

    #[tokio::test]
    async fn test_quota_on_retry_is_surfaced() {
        let provider = ScriptedProvider::default()
            .respond("handle:alice", "A", Err(FetchError::QuotaExhausted))
            .respond("handle:alice", "B", Err(FetchError::QuotaExhausted));
        let (mut agg, provider) = aggregator(provider, &["A", "B", "C"]);

        let outcome = agg.run_pass(&config_for("alice", "")).await;
        assert_eq!(outcome.error, Some(FetchError::QuotaExhausted));
        assert_eq!(provider.calls().len(), 2);
        assert_eq!(agg.credentials().active_index(), 1);
    }

    #[tokio::test]
    async fn test_single_key_does_not_retry() {
        let provider = ScriptedProvider::default()
            .respond("handle:alice", "A", Err(FetchError::QuotaExhausted));
        let (mut agg, provider) = aggregator(provider, &["A"]);

        let outcome = agg.run_pass(&config_for("alice", "")).await;
        assert_eq!(outcome.error, Some(FetchError::QuotaExhausted));
        assert_eq!(provider.calls().len(), 1);
        assert_eq!(agg.credentials().active_index(), 0);
    }

    #[tokio::test]
    async fn test_error_keeps_earlier_sources() {
        let provider = ScriptedProvider::default()
            .respond("handle:alice", "k", Ok(vec![post("1", 1)]))
            .respond("handle:bob", "k", Err(FetchError::NotFound("bob".into())))
            .respond("handle:carol", "k", Ok(vec![post("3", 3)]));
        let (mut agg, provider) = aggregator(provider, &["k"]);

        let outcome = agg.run_pass(&config_for("alice,bob,carol", "")).await;
        assert_eq!(ids(&outcome.accepted), ["1"]);
        assert_eq!(outcome.error, Some(FetchError::NotFound("bob".into())));
        assert_eq!(provider.calls().len(), 2);
    }

    /// Never answers for one source key.
    struct StalledProvider {
        stalled: String,
    }

    #[async_trait]
    impl Provider for StalledProvider {
        fn kind(&self) -> ProviderKind {
            ProviderKind::RapidApi
        }

        async fn fetch(
            &self,
            spec: &SourceSpec,
            _limit: usize,
            _credential: &str,
        ) -> Result<Vec<Post>, FetchError> {
            if spec.source_key() == self.stalled {
                tokio::time::sleep(Duration::from_secs(60)).await;
            }
            Ok(vec![post(&spec.source_key(), 1)])
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_source_times_out_as_transport_error() {
        let provider = StalledProvider {
            stalled: "handle:bob".to_string(),
        };
        let mut agg = Aggregator::new(Arc::new(provider), CredentialSet::new(["k"]));
        let mut config = config_for("alice,bob", "");
        config.provider.request_timeout_secs = 1;

        let outcome = agg.run_pass(&config).await;
        assert!(matches!(outcome.error, Some(FetchError::Transport(_))));
        assert_eq!(ids(&outcome.accepted), ["handle:alice"]);
    }

    #[tokio::test]
    async fn test_no_sources_keeps_backlog_pending() {
        let (mut agg, provider) = aggregator(ScriptedProvider::default(), &["k"]);

        let outcome = agg.run_pass(&Config::default()).await;
        assert_eq!(outcome, PassOutcome::default());
        assert!(provider.calls().is_empty());
        assert!(agg.is_first_pass());
    }

    #[tokio::test]
    async fn test_reset_serves_backlog_again() {
        let provider = ScriptedProvider::default()
            .respond("handle:alice", "k", Ok(vec![post("1", 1)]));
        let (mut agg, _) = aggregator(provider, &["k"]);
        let config = config_for("alice", "");

        agg.run_pass(&config).await;
        agg.reset();
        assert!(agg.is_first_pass());

        let outcome = agg.run_pass(&config).await;
        assert_eq!(ids(&outcome.accepted), ["1"]);
    }

    #[tokio::test]
    async fn test_rotation_and_cursors_persist() {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let provider = Arc::new(
            ScriptedProvider::default()
                .respond("handle:alice", "A", Err(FetchError::QuotaExhausted))
                .respond("handle:alice", "B", Ok(vec![post("1", 1), post("2", 2)])),
        );

        let mut agg = Aggregator::new(provider.clone(), CredentialSet::new(["A", "B"]))
            .with_store(store.clone());
        agg.run_pass(&config_for("alice", "")).await;

        let cursor = store.get_source_cursor("handle:alice").unwrap().unwrap();
        assert_eq!(cursor.last_seen_id, "2");

        let restored = Aggregator::new(provider.clone(), CredentialSet::new(["A", "B"]))
            .with_store(store.clone());
        assert_eq!(restored.credentials().active_key(), "B");

        let other_keys = Aggregator::new(provider, CredentialSet::new(["A", "C"]))
            .with_store(store);
        assert_eq!(other_keys.credentials().active_index(), 0);
    }
}

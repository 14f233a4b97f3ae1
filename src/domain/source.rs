use std::fmt;

use crate::config::SourceConfig;
use crate::provider::ProviderKind;

/// One unit of work for a poll pass.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SourceSpec {
    UserHandle(String),
    SearchQuery(String),
    ListId(String),
    CommunityId(String),
    HomeTimeline(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceCategory {
    Handles,
    Search,
    Lists,
    Communities,
    HomeTimeline,
}

impl SourceSpec {
    pub fn category(&self) -> SourceCategory {
        match self {
            SourceSpec::UserHandle(_) => SourceCategory::Handles,
            SourceSpec::SearchQuery(_) => SourceCategory::Search,
            SourceSpec::ListId(_) => SourceCategory::Lists,
            SourceSpec::CommunityId(_) => SourceCategory::Communities,
            SourceSpec::HomeTimeline(_) => SourceCategory::HomeTimeline,
        }
    }

    pub fn value(&self) -> &str {
        match self {
            SourceSpec::UserHandle(v)
            | SourceSpec::SearchQuery(v)
            | SourceSpec::ListId(v)
            | SourceSpec::CommunityId(v)
            | SourceSpec::HomeTimeline(v) => v,
        }
    }

    fn tag(&self) -> &'static str {
        match self {
            SourceSpec::UserHandle(_) => "handle",
            SourceSpec::SearchQuery(_) => "search",
            SourceSpec::ListId(_) => "list",
            SourceSpec::CommunityId(_) => "community",
            SourceSpec::HomeTimeline(_) => "home",
        }
    }

    /// Stable bookkeeping key, e.g. `handle:rustlang`.
    pub fn source_key(&self) -> String {
        format!("{}:{}", self.tag(), self.value())
    }
}

impl fmt::Display for SourceSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source_key())
    }
}

/// Split a comma-separated config field, trimming and dropping empties.
fn split_field(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(',').map(str::trim).filter(|s| !s.is_empty())
}

fn strip_at(handle: &str) -> String {
    handle.strip_prefix('@').unwrap_or(handle).to_string()
}

/// Turn the raw source settings into the ordered list of specs for one pass.
///
/// Category order is fixed: handles, search, lists, communities, home timeline.
/// A category is skipped when its flag is off or the provider cannot serve it.
pub fn resolve_sources(config: &SourceConfig, provider: ProviderKind) -> Vec<SourceSpec> {
    let mut specs = Vec::new();
    let enabled = |flag: bool, category| flag && provider.supports(category);

    if enabled(config.use_user_handles, SourceCategory::Handles) {
        specs.extend(
            split_field(&config.user_handles)
                .map(strip_at)
                .filter(|h| !h.is_empty())
                .map(SourceSpec::UserHandle),
        );
    }

    if enabled(config.use_search, SourceCategory::Search) {
        let query = config.search_query.trim();
        if !query.is_empty() {
            specs.push(SourceSpec::SearchQuery(query.to_string()));
        }
    }

    if enabled(config.use_lists, SourceCategory::Lists) {
        specs.extend(split_field(&config.lists).map(|id| SourceSpec::ListId(id.to_string())));
    }

    if enabled(config.use_communities, SourceCategory::Communities) {
        specs.extend(
            split_field(&config.communities).map(|id| SourceSpec::CommunityId(id.to_string())),
        );
    }

    if enabled(config.use_home_timeline, SourceCategory::HomeTimeline) {
        let handle = strip_at(config.home_timeline.trim());
        if !handle.is_empty() {
            specs.push(SourceSpec::HomeTimeline(handle));
        }
    }

    specs
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_sources() -> SourceConfig {
        SourceConfig {
            user_handles: " @alice, bob ,, @ ".into(),
            use_user_handles: true,
            search_query: "  rust lang ".into(),
            use_search: true,
            lists: "123, 456".into(),
            use_lists: true,
            communities: "789".into(),
            use_communities: true,
            home_timeline: "@me".into(),
            use_home_timeline: true,
        }
    }

    #[test]
    fn test_resolve_order_and_normalization() {
        let specs = resolve_sources(&all_sources(), ProviderKind::RapidApi);
        assert_eq!(
            specs,
            vec![
                SourceSpec::UserHandle("alice".into()),
                SourceSpec::UserHandle("bob".into()),
                SourceSpec::SearchQuery("rust lang".into()),
                SourceSpec::ListId("123".into()),
                SourceSpec::ListId("456".into()),
                SourceSpec::CommunityId("789".into()),
            ]
        );
    }

    #[test]
    fn test_official_provider_skips_communities() {
        let specs = resolve_sources(&all_sources(), ProviderKind::Official);
        assert!(specs
            .iter()
            .all(|s| s.category() != SourceCategory::Communities));
        assert_eq!(specs.last(), Some(&SourceSpec::HomeTimeline("me".into())));
    }

    #[test]
    fn test_disabled_category_skipped() {
        let mut config = all_sources();
        config.use_user_handles = false;
        config.use_search = false;
        let specs = resolve_sources(&config, ProviderKind::RapidApi);
        assert_eq!(specs[0], SourceSpec::ListId("123".into()));
    }

    #[test]
    fn test_empty_config_yields_nothing() {
        let specs = resolve_sources(&SourceConfig::default(), ProviderKind::RapidApi);
        assert!(specs.is_empty());
    }

    #[test]
    fn test_source_key() {
        assert_eq!(
            SourceSpec::UserHandle("alice".into()).source_key(),
            "handle:alice"
        );
        assert_eq!(SourceSpec::ListId("9".into()).to_string(), "list:9");
    }
}

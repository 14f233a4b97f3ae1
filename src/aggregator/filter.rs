//! Batch stages applied after fetching: dedup, filtering and ordering.

use std::collections::HashSet;

use crate::aggregator::history::History;
use crate::config::FilterConfig;
use crate::domain::Post;

/// Keep the first occurrence of each id, in traversal order.
pub fn dedup_batch(batch: Vec<Post>) -> Vec<Post> {
    let mut seen = HashSet::new();
    batch
        .into_iter()
        .filter(|post| seen.insert(post.id.clone()))
        .collect()
}

/// Drop posts already accepted by an earlier pass.
pub fn drop_seen(batch: Vec<Post>, history: &History) -> Vec<Post> {
    batch
        .into_iter()
        .filter(|post| !history.contains(&post.id))
        .collect()
}

/// Whether a post survives the configured filters. Always true when filtering is off.
///
/// A post without a follower count fails as soon as either bound is active.
pub fn passes_filters(post: &Post, filters: &FilterConfig) -> bool {
    if !filters.enabled {
        return true;
    }

    if filters.verified_only && post.is_verified != Some(true) {
        return false;
    }

    if filters.min_followers_enabled || filters.max_followers_enabled {
        let Some(count) = post.follower_count else {
            return false;
        };
        if filters.min_followers_enabled && count < filters.min_followers {
            return false;
        }
        if filters.max_followers_enabled && count > filters.max_followers {
            return false;
        }
    }

    true
}

pub fn apply_filters(batch: Vec<Post>, filters: &FilterConfig) -> Vec<Post> {
    batch
        .into_iter()
        .filter(|post| passes_filters(post, filters))
        .collect()
}

/// Stable sort, newest first. Missing timestamps sort as oldest.
pub fn sort_newest_first(batch: &mut [Post]) {
    batch.sort_by(|a, b| b.created_at.cmp(&a.created_at));
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn with_followers(id: &str, count: Option<u64>) -> Post {
        let post = Post::new(id, "text");
        match count {
            Some(c) => post.with_follower_count(c),
            None => post,
        }
    }

    #[test]
    fn test_dedup_keeps_first_occurrence() {
        let batch = vec![
            Post::new("1", "from handle"),
            Post::new("2", "other"),
            Post::new("1", "from search"),
        ];
        let deduped = dedup_batch(batch);

        assert_eq!(deduped.len(), 2);
        assert_eq!(deduped[0].text, "from handle");
        assert_eq!(deduped[1].id, "2");
    }

    #[test]
    fn test_min_follower_boundary() {
        let filters = FilterConfig {
            enabled: true,
            min_followers_enabled: true,
            min_followers: 100,
            ..FilterConfig::default()
        };

        assert!(!passes_filters(&with_followers("a", Some(99)), &filters));
        assert!(passes_filters(&with_followers("b", Some(100)), &filters));
        assert!(!passes_filters(&with_followers("c", None), &filters));
    }

    #[test]
    fn test_max_follower_bound_is_inclusive() {
        let filters = FilterConfig {
            enabled: true,
            max_followers_enabled: true,
            max_followers: 500,
            ..FilterConfig::default()
        };

        assert!(passes_filters(&with_followers("a", Some(500)), &filters));
        assert!(!passes_filters(&with_followers("b", Some(501)), &filters));
    }

    #[test]
    fn test_filters_ignored_when_master_switch_off() {
        let filters = FilterConfig {
            enabled: false,
            verified_only: true,
            min_followers_enabled: true,
            min_followers: 1_000,
            ..FilterConfig::default()
        };
        assert!(passes_filters(&with_followers("a", None), &filters));
    }

    #[test]
    fn test_verified_only_rejects_unknown() {
        let filters = FilterConfig {
            enabled: true,
            verified_only: true,
            ..FilterConfig::default()
        };

        assert!(passes_filters(&Post::new("a", "x").with_verified(true), &filters));
        assert!(!passes_filters(&Post::new("b", "x").with_verified(false), &filters));
        assert!(!passes_filters(&Post::new("c", "x"), &filters));
    }

    #[test]
    fn test_sort_puts_missing_timestamps_last() {
        let t1 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let t2 = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
        let mut batch = vec![
            Post::new("none", "x"),
            Post::new("old", "x").with_created_at(t1),
            Post::new("new", "x").with_created_at(t2),
        ];
        sort_newest_first(&mut batch);

        let ids: Vec<_> = batch.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, ["new", "old", "none"]);
    }
}

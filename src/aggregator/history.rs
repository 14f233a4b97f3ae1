use std::collections::{HashSet, VecDeque};

use crate::domain::Post;

/// Accepted posts in arrival order plus an id index for dedup.
///
/// Unbounded unless a ceiling is set, in which case the oldest posts are
/// evicted first. Evicted ids may be accepted again by a later pass.
#[derive(Debug, Default)]
pub struct History {
    posts: VecDeque<Post>,
    ids: HashSet<String>,
    max_len: Option<usize>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_len(max_len: Option<usize>) -> Self {
        Self {
            max_len,
            ..Self::default()
        }
    }

    pub fn set_max_len(&mut self, max_len: Option<usize>) {
        self.max_len = max_len;
        self.evict();
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.posts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.posts.is_empty()
    }

    pub fn extend<I: IntoIterator<Item = Post>>(&mut self, batch: I) {
        for post in batch {
            if self.ids.insert(post.id.clone()) {
                self.posts.push_back(post);
            }
        }
        self.evict();
    }

    pub fn clear(&mut self) {
        self.posts.clear();
        self.ids.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &Post> {
        self.posts.iter()
    }

    pub fn to_vec(&self) -> Vec<Post> {
        self.posts.iter().cloned().collect()
    }

    fn evict(&mut self) {
        let Some(max) = self.max_len else {
            return;
        };
        while self.posts.len() > max {
            if let Some(old) = self.posts.pop_front() {
                self.ids.remove(&old.id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extend_keeps_order_and_skips_known_ids() {
        let mut history = History::new();
        history.extend([Post::new("1", "a"), Post::new("2", "b")]);
        history.extend([Post::new("2", "b again"), Post::new("3", "c")]);

        let ids: Vec<_> = history.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, ["1", "2", "3"]);
        assert_eq!(history.iter().nth(1).unwrap().text, "b");
    }

    #[test]
    fn test_ceiling_evicts_oldest() {
        let mut history = History::with_max_len(Some(2));
        history.extend([Post::new("1", "a"), Post::new("2", "b"), Post::new("3", "c")]);

        assert_eq!(history.len(), 2);
        assert!(!history.contains("1"));
        assert!(history.contains("3"));
    }

    #[test]
    fn test_clear() {
        let mut history = History::new();
        history.extend([Post::new("1", "a")]);
        history.clear();
        assert!(history.is_empty());
        assert!(!history.contains("1"));
    }
}

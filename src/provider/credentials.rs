use sha2::{Digest, Sha256};

/// Ordered API keys with a round-robin active index.
///
/// Blank entries are dropped on construction, so `active_index` always points
/// at a usable key when the set is non-empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CredentialSet {
    keys: Vec<String>,
    active_index: usize,
}

impl CredentialSet {
    pub fn new<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let keys = keys
            .into_iter()
            .map(|k| k.as_ref().trim().to_string())
            .filter(|k| !k.is_empty())
            .collect();
        Self {
            keys,
            active_index: 0,
        }
    }

    pub fn with_active_index(mut self, index: usize) -> Self {
        self.set_active_index(index);
        self
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn active_index(&self) -> usize {
        self.active_index
    }

    pub fn set_active_index(&mut self, index: usize) {
        self.active_index = index.min(self.keys.len().saturating_sub(1));
    }

    /// The key at the active index, or `""` when there is none.
    pub fn active_key(&self) -> &str {
        self.keys
            .get(self.active_index.min(self.keys.len().saturating_sub(1)))
            .map(String::as_str)
            .unwrap_or("")
    }

    /// Advance to the next key. Returns false when there is nothing to rotate to.
    pub fn rotate(&mut self) -> bool {
        if self.keys.len() <= 1 {
            return false;
        }
        self.active_index = (self.active_index + 1) % self.keys.len();
        true
    }

    /// Digest of the whole key list. A stored index only applies to the same list.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        for key in &self.keys {
            hasher.update(key.as_bytes());
            hasher.update(b"\n");
        }
        hex::encode(hasher.finalize())
    }

    /// Loggable stand-in for the active key.
    pub fn active_key_fingerprint(&self) -> String {
        key_fingerprint(self.active_key())
    }
}

/// First eight hex chars of the key's SHA-256.
pub fn key_fingerprint(key: &str) -> String {
    if key.is_empty() {
        return "none".to_string();
    }
    let digest = hex::encode(Sha256::digest(key.as_bytes()));
    digest[..8].to_string()
}

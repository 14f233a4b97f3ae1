pub mod sqlite;

use chrono::{DateTime, Utc};

use crate::app::Result;
use crate::provider::ProviderKind;

pub use sqlite::SqliteStore;

/// Persisted active key index for one provider's credential set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RotationState {
    pub provider: String,
    pub keys_fingerprint: String,
    pub active_index: usize,
    pub updated_at: DateTime<Utc>,
}

/// Newest post seen from one source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceCursor {
    pub source_key: String,
    pub last_seen_id: String,
    pub last_seen_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

pub trait Store {
    // Rotation state
    fn load_rotation(&self, provider: ProviderKind) -> Result<Option<RotationState>>;
    fn save_rotation(
        &self,
        provider: ProviderKind,
        keys_fingerprint: &str,
        active_index: usize,
    ) -> Result<()>;

    // Per-source bookkeeping
    fn set_source_cursor(
        &self,
        source_key: &str,
        last_seen_id: &str,
        last_seen_at: Option<DateTime<Utc>>,
    ) -> Result<()>;
    fn get_source_cursor(&self, source_key: &str) -> Result<Option<SourceCursor>>;
    fn list_source_cursors(&self) -> Result<Vec<SourceCursor>>;
}

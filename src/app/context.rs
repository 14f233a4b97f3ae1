use std::path::PathBuf;
use std::sync::Arc;

use crate::aggregator::Aggregator;
use crate::app::error::{Result, XflowError};
use crate::config::Config;
use crate::provider::{build_provider, FixtureProvider, Provider};
use crate::store::sqlite::SqliteStore;
use crate::store::Store;

/// Wiring shared by every command: config snapshot, store and provider.
pub struct AppContext {
    pub config: Config,
    pub store: Arc<SqliteStore>,
    pub provider: Arc<dyn Provider + Send + Sync>,
}

impl AppContext {
    pub fn new(config: Config, db_path: Option<PathBuf>) -> Result<Self> {
        let db_path = match db_path {
            Some(p) => p,
            None => Self::data_dir()?.join("xflow.db"),
        };

        let store = Arc::new(SqliteStore::new(&db_path)?);
        let provider = build_provider(&config.provider);

        Ok(Self {
            config,
            store,
            provider,
        })
    }

    pub fn in_memory(config: Config) -> Result<Self> {
        let store = Arc::new(SqliteStore::in_memory()?);
        let provider = build_provider(&config.provider);

        Ok(Self {
            config,
            store,
            provider,
        })
    }

    /// Replace the network provider with posts replayed from a JSON file.
    pub fn with_fixture(mut self, path: PathBuf) -> Result<Self> {
        let fixture = FixtureProvider::from_file(self.config.provider.kind, &path)?;
        tracing::info!(path = %path.display(), posts = fixture.len(), "Using fixture provider");
        self.provider = Arc::new(fixture);
        Ok(self)
    }

    /// An aggregator over this context's provider, credentials and store.
    pub fn aggregator(&self) -> Aggregator {
        let store: Arc<dyn Store + Send + Sync> = self.store.clone();
        Aggregator::new(self.provider.clone(), self.config.provider.credential_set())
            .with_store(store)
    }

    /// `~/.local/share/xflow` or the platform equivalent; created on demand.
    pub fn data_dir() -> Result<PathBuf> {
        let data_dir = dirs::data_dir()
            .ok_or_else(|| XflowError::Config("Could not find data directory".into()))?;
        let xflow_dir = data_dir.join("xflow");
        std::fs::create_dir_all(&xflow_dir)?;
        Ok(xflow_dir)
    }
}

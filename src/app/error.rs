use thiserror::Error;

use crate::config::ConfigError;
use crate::provider::FetchError;

#[derive(Error, Debug)]
pub enum XflowError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("{0}")]
    Other(String),
}

impl From<ConfigError> for XflowError {
    fn from(err: ConfigError) -> Self {
        XflowError::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, XflowError>;

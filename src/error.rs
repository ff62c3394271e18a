use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScraperError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Fetch of {url} failed with status {status}")]
    Fetch { url: String, status: u16 },

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),
}

/// Failure while deriving fields for a single candidate element.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractionError {
    #[error("cannot resolve link '{href}': {reason}")]
    InvalidUrl { href: String, reason: String },
}

#[derive(Error, Debug)]
pub enum StoreError {
    /// Another record already holds the same `(title, date)` pair.
    #[error("duplicate event '{title}' on {date}")]
    Conflict { title: String, date: String },

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage lock poisoned")]
    Poisoned,

    #[error("invalid record: {0}")]
    InvalidRecord(String),
}

impl StoreError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict { .. })
    }
}

pub type Result<T> = std::result::Result<T, ScraperError>;

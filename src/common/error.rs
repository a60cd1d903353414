use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScraperError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("CSV write failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Browser error: {0}")]
    Browser(String),
}

pub type Result<T> = std::result::Result<T, ScraperError>;

/// Transient page retrieval failures. Retried with backoff by the
/// orchestrator; once attempts are exhausted the owning site is failed.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("page load timed out after {0:?}")]
    Timeout(Duration),

    #[error("navigation failed: {0}")]
    Navigation(String),
}

/// A page reference could not be parsed or advanced. Terminal for the
/// owning site's crawl; other sites are unaffected.
#[derive(Error, Debug)]
pub enum PaginationError {
    #[error("malformed pagination fragment: {0}")]
    MalformedFragment(String),

    #[error("page reference could not be built: {0}")]
    BadPageRef(String),
}

// src/core/error.rs

use std::path::PathBuf;
use thiserror::Error;

/// Fatal problems with the policy document. These abort the process.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("policy file {path} not found")]
    NotFound { path: PathBuf },
    #[error("could not read policy file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not parse policy document: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("policy document is empty")]
    Empty,
    #[error("policy document has no scored rules (headers or unwanted_headers)")]
    NoScoredRules,
    #[error("rule with an empty header name in `{section}`")]
    EmptyName { section: &'static str },
}

/// A single fetch attempt failed. Always recovered locally into the
/// sentinel `FetchResult`; it never leaves the fetcher.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("could not build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
    #[error("request to {url} timed out")]
    Timeout { url: String },
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

impl FetchError {
    pub fn from_request(url: &str, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            FetchError::Timeout { url: url.to_string() }
        } else {
            FetchError::Request { url: url.to_string(), source }
        }
    }
}

/// Result Store failures. Logged by callers; in bulk mode they only mark
/// the affected URL as not persisted.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("unrecognised status `{0}` in results table")]
    UnknownStatus(String),
    #[error("invalid window of {0} days")]
    InvalidWindow(i64),
    #[error("storage task failed: {0}")]
    Task(String),
}

use thiserror::Error;

/// Network collaborator failures. Never escapes a single page or profile.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("not found: {url}")]
    NotFound { url: String },

    #[error("HTTP {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("timed out fetching {url}")]
    Timeout { url: String },

    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

#[derive(Debug, Error)]
pub enum HarvestError {
    /// The only fatal outcome: nothing usable came out of any scope.
    #[error("no records produced across {scopes} scope(s) ({failures} failure(s) recorded)")]
    NoRecords { scopes: usize, failures: usize },

    #[error("invalid configuration: {0}")]
    Config(String),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("could not prepare database at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

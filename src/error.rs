use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by the fetch, configuration and watch layers.
///
/// Tree building, layout and collapse never fail: malformed records are
/// skipped and name conflicts are recorded on the tree instead.
#[derive(Debug, Error)]
pub enum RadialError {
    #[error("malformed repository input `{0}`: expected <owner>/<repo>")]
    MalformedInput(String),

    #[error("request to {url} failed: {source}")]
    Fetch {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("repository API returned {status} for {url}")]
    Api { status: u16, url: String },

    #[error("failed to decode response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to read config file {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("file watcher error: {0}")]
    Watch(#[from] notify::Error),

    #[error("directory not found: {0}")]
    PathNotFound(PathBuf),

    #[error("fetch worker disconnected before delivering a result")]
    WorkerDisconnected,
}

pub type Result<T> = std::result::Result<T, RadialError>;

use std::path::PathBuf;
use std::time::Duration;

use reqwest::StatusCode;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ArchiveError>;

/// Fatal conditions of an archive run.
///
/// Per-item failures that do not stop the run (rejected deletes, skipped
/// attachments) are reported through outcomes instead.
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("failed to read config file {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),

    #[error("search request at offset {offset} failed: {source}")]
    SearchTransport {
        offset: u32,
        #[source]
        source: reqwest::Error,
    },

    #[error("search at offset {offset} returned HTTP {status}")]
    SearchStatus { offset: u32, status: StatusCode },

    #[error("search response at offset {offset} could not be decoded: {source}")]
    SearchDecode {
        offset: u32,
        #[source]
        source: serde_json::Error,
    },

    #[error("search rate limited at offset {offset} (retry after {retry_after:?})")]
    RateLimited { offset: u32, retry_after: Duration },

    #[error("possible infinite pagination: still receiving results after {pages} pages")]
    PaginationRunaway { pages: usize },

    #[error("failed to create output directory {path}: {source}")]
    OutputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize archive: {0}")]
    ArchiveEncode(#[source] serde_json::Error),

    #[error("failed to write archive {path}: {source}")]
    ArchiveWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to save attachment {url} for message {message_id}: {reason}")]
    Attachment {
        message_id: String,
        url: String,
        reason: String,
    },
}

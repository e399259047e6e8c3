use std::path::PathBuf;

use thiserror::Error;

/// Failure to retrieve a remote document or asset.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid url {0}")]
    InvalidUrl(String),

    #[error("timed out fetching {0}")]
    Timeout(String),

    #[error("connection failed for {url}: {message}")]
    Connect { url: String, message: String },

    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },

    #[error("unexpected content type {content_type:?} from {url}")]
    ContentType { content_type: String, url: String },

    #[error("failed reading body of {url}: {message}")]
    Body { url: String, message: String },
}

impl FetchError {
    pub fn from_reqwest(url: &str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout(url.to_string())
        } else if err.is_builder() {
            FetchError::InvalidUrl(url.to_string())
        } else if err.is_body() || err.is_decode() {
            FetchError::Body {
                url: url.to_string(),
                message: err.to_string(),
            }
        } else {
            FetchError::Connect {
                url: url.to_string(),
                message: err.to_string(),
            }
        }
    }

    pub fn reason(&self) -> &'static str {
        match self {
            FetchError::InvalidUrl(_) => "fetch:invalid-url",
            FetchError::Timeout(_) => "fetch:timeout",
            FetchError::Connect { .. } => "fetch:connect",
            FetchError::Status { .. } => "fetch:status",
            FetchError::ContentType { .. } => "fetch:content-type",
            FetchError::Body { .. } => "fetch:body",
        }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// Malformed HTML or JSON fragment. Extraction recovers these locally.
    #[error("parse error: {0}")]
    Parse(String),

    #[error("xml error: {0}")]
    Xml(String),

    #[error("record not found: {}", .0.display())]
    RecordNotFound(PathBuf),

    #[error("record store not found: {}", .0.display())]
    StoreNotFound(PathBuf),

    #[error("invalid record {}: {source}", path.display())]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl Error {
    /// Short, stable label used to group failures in batch summaries.
    pub fn reason(&self) -> &'static str {
        match self {
            Error::Fetch(e) => e.reason(),
            Error::Parse(_) => "parse",
            Error::Xml(_) => "xml",
            Error::RecordNotFound(_) => "record:not-found",
            Error::StoreNotFound(_) => "store:not-found",
            Error::Json { .. } => "record:json",
            Error::Read { .. } => "record:read",
            Error::Write { .. } => "write",
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

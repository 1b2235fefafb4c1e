use std::io;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum BhError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Unexpected response from {url}: {detail}")]
    ResponseShape { url: String, detail: String },

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Request to {url} failed: HTTP {status}")]
    Http { url: String, status: u16 },

    #[error("Redirect limit of {limit} exceeded while fetching {url}")]
    RedirectDepthExceeded { url: String, limit: u32 },

    #[error("Download of {url} failed: HTTP {status} (credential: {method})")]
    Download {
        url: String,
        status: u16,
        method: String,
    },

    #[error("Archive error: {0}")]
    Archive(String),

    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, BhError>;

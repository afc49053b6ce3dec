use std::path::PathBuf;
use thiserror::Error;

/// Failure of a single configuration source.
///
/// None of these escape [`Resolver::resolve`](super::Resolver::resolve): a
/// failing source is logged and the next one in the chain is consulted.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("required hints file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("failed to read '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse hints file '{path}': {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("request to '{url}' failed: {message}")]
    Network { url: String, message: String },

    #[error("'{url}' returned status {status}")]
    Status { url: String, status: u16 },

    #[error("request to '{url}' timed out after {after_ms}ms")]
    Timeout { url: String, after_ms: u128 },

    #[error("invalid JSON from {origin}: {source}")]
    InvalidJson {
        origin: String,
        source: serde_json::Error,
    },

    #[error("{0} did not contain a JSON object")]
    NotAnObject(String),

    #[error("no configuration endpoint available")]
    NoEndpoint,

    #[error("local configuration cache is only available on development hosts (host: {0})")]
    CacheUnavailable(String),

    #[error("storage error: {0}")]
    Storage(String),
}

//! HTTP seam.
//!
//! The resolver and the attendance reporter never talk to the network
//! directly; they go through a [`Fetcher`]. Hosts wire this to whatever
//! client they have. [`StaticDirFetcher`] serves a deployed site directory
//! from disk, which is all the command-line tool needs.

use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;

use crate::config::ConfigError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// Which cookies accompany a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Credentials {
    #[default]
    Omit,
    SameOrigin,
}

/// Response visibility.
///
/// `NoCors` requests are fire-and-forget: the response is opaque and its
/// status is reported as `0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    Cors,
    NoCors,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
    pub credentials: Credentials,
    pub mode: Mode,
}

impl Request {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            url: url.into(),
            headers: vec![("Accept".into(), "application/json".into())],
            body: None,
            credentials: Credentials::Omit,
            mode: Mode::Cors,
        }
    }

    pub fn post_json(url: impl Into<String>, body: String) -> Self {
        Self {
            method: Method::Post,
            url: url.into(),
            headers: vec![("Content-Type".into(), "application/json".into())],
            body: Some(body),
            credentials: Credentials::Omit,
            mode: Mode::Cors,
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = credentials;
        self
    }

    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub body: String,
}

impl Response {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// The response to a `NoCors` request.
    pub fn opaque() -> Self {
        Self::new(0, "")
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn json<T: DeserializeOwned>(&self, origin: &str) -> Result<T, ConfigError> {
        serde_json::from_str(&self.body).map_err(|source| ConfigError::InvalidJson {
            origin: origin.to_string(),
            source,
        })
    }
}

/// Performs one HTTP exchange.
///
/// Implementations report transport failures as [`ConfigError::Network`];
/// non-success statuses are returned as ordinary responses.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, request: Request) -> Result<Response, ConfigError>;
}

/// Runs `request` with an upper bound on how long it may take.
pub async fn fetch_with_timeout(
    fetcher: &dyn Fetcher,
    request: Request,
    timeout: Duration,
) -> Result<Response, ConfigError> {
    let url = request.url.clone();
    match tokio::time::timeout(timeout, fetcher.fetch(request)).await {
        Ok(result) => result,
        Err(_) => Err(ConfigError::Timeout {
            url,
            after_ms: timeout.as_millis(),
        }),
    }
}

/// Fetches JSON assets out of a deployed site directory.
///
/// `GET /config.json` reads `<root>/config.json`; a missing file is a 404.
/// Anything other than `GET` is answered with 405.
#[derive(Debug, Clone)]
pub struct StaticDirFetcher {
    root: PathBuf,
}

impl StaticDirFetcher {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    fn resolve_path(&self, url: &str) -> Option<PathBuf> {
        let path = url.split(['?', '#']).next().unwrap_or_default();
        let relative = Path::new(path.trim_start_matches('/'));
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
        {
            return None;
        }
        Some(self.root.join(relative))
    }
}

#[async_trait]
impl Fetcher for StaticDirFetcher {
    async fn fetch(&self, request: Request) -> Result<Response, ConfigError> {
        if request.method != Method::Get {
            return Ok(Response::new(405, ""));
        }
        let Some(path) = self.resolve_path(&request.url) else {
            return Ok(Response::new(400, ""));
        };

        match tokio::fs::read_to_string(&path).await {
            Ok(body) => Ok(Response::new(200, body)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Response::new(404, "")),
            Err(e) => Err(ConfigError::ReadError { path, source: e }),
        }
    }
}

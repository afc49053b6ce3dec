//! Network-fetched configuration.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use super::source::{ConfigSource, RawConfig};
use super::ConfigError;
use crate::net::{fetch_with_timeout, Fetcher, Request};

/// Same-origin endpoints, in the order they are tried.
pub const CONFIG_ENDPOINTS: &[&str] = &["/api/config", "/config.json", "/env.json"];

/// Static assets tried instead of [`CONFIG_ENDPOINTS`] on static hosting.
pub const STATIC_ASSETS: &[&str] = &["/config.production.json", "/config.json"];

/// Fetches a JSON object from the first path that answers successfully.
pub struct EndpointSource {
    name: &'static str,
    fetcher: Arc<dyn Fetcher>,
    paths: Vec<String>,
    timeout: Duration,
}

impl EndpointSource {
    pub fn new(
        name: &'static str,
        fetcher: Arc<dyn Fetcher>,
        paths: impl IntoIterator<Item = impl Into<String>>,
        timeout: Duration,
    ) -> Self {
        Self {
            name,
            fetcher,
            paths: paths.into_iter().map(Into::into).collect(),
            timeout,
        }
    }

    /// The configuration endpoint of the serving origin.
    pub fn same_origin(fetcher: Arc<dyn Fetcher>, timeout: Duration) -> Self {
        Self::new("endpoint", fetcher, CONFIG_ENDPOINTS.iter().copied(), timeout)
    }

    /// The JSON assets published alongside a statically hosted page.
    pub fn static_assets(fetcher: Arc<dyn Fetcher>, timeout: Duration) -> Self {
        Self::new("static-assets", fetcher, STATIC_ASSETS.iter().copied(), timeout)
    }

    async fn fetch_object(&self, path: &str) -> Result<RawConfig, ConfigError> {
        let request = Request::get(path).with_header("Cache-Control", "no-cache");
        let response = fetch_with_timeout(self.fetcher.as_ref(), request, self.timeout).await?;
        if !response.is_success() {
            return Err(ConfigError::Status {
                url: path.to_string(),
                status: response.status,
            });
        }
        match response.json::<Value>(path)? {
            Value::Object(map) => Ok(map),
            _ => Err(ConfigError::NotAnObject(path.to_string())),
        }
    }
}

impl fmt::Debug for EndpointSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EndpointSource")
            .field("name", &self.name)
            .field("paths", &self.paths)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl ConfigSource for EndpointSource {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn probe(&self) -> Result<RawConfig, ConfigError> {
        for path in &self.paths {
            match self.fetch_object(path).await {
                Ok(map) => return Ok(map),
                Err(e) => debug!(path = %path, error = %e, "configuration endpoint unavailable"),
            }
        }
        Err(ConfigError::NoEndpoint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::Response;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Routes {
        responses: HashMap<String, Response>,
        seen: Mutex<Vec<String>>,
    }

    impl Routes {
        fn with(mut self, path: &str, status: u16, body: &str) -> Self {
            self.responses
                .insert(path.to_string(), Response::new(status, body));
            self
        }
    }

    #[async_trait]
    impl Fetcher for Routes {
        async fn fetch(&self, request: Request) -> Result<Response, ConfigError> {
            self.seen.lock().unwrap().push(request.url.clone());
            self.responses
                .get(&request.url)
                .cloned()
                .ok_or_else(|| ConfigError::Network {
                    url: request.url,
                    message: "connection refused".into(),
                })
        }
    }

    #[tokio::test]
    async fn test_first_successful_endpoint_wins() {
        let routes = Arc::new(
            Routes::default()
                .with("/api/config", 500, "")
                .with("/config.json", 200, r#"{"APP_NAME":"From file"}"#)
                .with("/env.json", 200, r#"{"APP_NAME":"Never read"}"#),
        );
        let source = EndpointSource::same_origin(routes.clone(), Duration::from_secs(1));

        let config = source.probe().await.unwrap();

        assert_eq!(config["APP_NAME"], "From file");
        assert_eq!(*routes.seen.lock().unwrap(), vec!["/api/config", "/config.json"]);
    }

    #[tokio::test]
    async fn test_static_assets_fall_back_to_second_file() {
        let routes = Arc::new(Routes::default().with(
            "/config.json",
            200,
            r#"{"QR_CODE_SIZE":"300"}"#,
        ));
        let source = EndpointSource::static_assets(routes.clone(), Duration::from_secs(1));

        let config = source.probe().await.unwrap();

        assert_eq!(config["QR_CODE_SIZE"], "300");
        assert_eq!(
            *routes.seen.lock().unwrap(),
            vec!["/config.production.json", "/config.json"]
        );
    }

    #[tokio::test]
    async fn test_non_object_and_invalid_bodies_are_skipped() {
        let routes = Arc::new(
            Routes::default()
                .with("/api/config", 200, "[1, 2]")
                .with("/config.json", 200, "{not json"),
        );
        let source = EndpointSource::same_origin(routes, Duration::from_secs(1));

        assert!(matches!(source.probe().await, Err(ConfigError::NoEndpoint)));
    }
}

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use super::coerce::defaults;
use super::hints::MarkupHints;
use super::host::Host;
use super::ConfigError;

/// Flat key/value pairs exactly as a source delivered them.
pub type RawConfig = Map<String, Value>;

/// One place configuration can be read from.
///
/// An empty mapping means "nothing here"; an error means the source was
/// unavailable. Either way the resolver moves on to the next source.
#[async_trait]
pub trait ConfigSource: Send + Sync + fmt::Debug {
    fn name(&self) -> &'static str;

    async fn probe(&self) -> Result<RawConfig, ConfigError>;
}

/// Tries `sources` in order and returns the first non-empty mapping.
pub async fn probe_chain(
    sources: &[Box<dyn ConfigSource>],
) -> Option<(&'static str, RawConfig)> {
    for source in sources {
        match source.probe().await {
            Ok(raw) if !raw.is_empty() => {
                debug!(source = source.name(), keys = raw.len(), "configuration source selected");
                return Some((source.name(), raw));
            }
            Ok(_) => debug!(source = source.name(), "configuration source empty"),
            Err(e) => warn!(source = source.name(), error = %e, "configuration source failed"),
        }
    }
    None
}

/// Public hints pre-rendered into the page.
#[derive(Debug, Clone)]
pub struct MarkupSource {
    hints: Arc<MarkupHints>,
}

impl MarkupSource {
    pub fn new(hints: Arc<MarkupHints>) -> Self {
        Self { hints }
    }
}

#[async_trait]
impl ConfigSource for MarkupSource {
    fn name(&self) -> &'static str {
        "markup"
    }

    async fn probe(&self) -> Result<RawConfig, ConfigError> {
        Ok(self.hints.public().clone())
    }
}

/// The compiled-in safe defaults; never empty.
#[derive(Debug, Clone)]
pub struct DefaultsSource {
    host: Host,
}

impl DefaultsSource {
    pub fn new(host: Host) -> Self {
        Self { host }
    }
}

#[async_trait]
impl ConfigSource for DefaultsSource {
    fn name(&self) -> &'static str {
        "defaults"
    }

    async fn probe(&self) -> Result<RawConfig, ConfigError> {
        Ok(defaults(&self.host)
            .into_iter()
            .map(|(key, value)| (key.name().to_string(), value))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug)]
    struct Fixed(&'static str, Result<RawConfig, ()>);

    #[async_trait]
    impl ConfigSource for Fixed {
        fn name(&self) -> &'static str {
            self.0
        }

        async fn probe(&self) -> Result<RawConfig, ConfigError> {
            self.1.clone().map_err(|_| ConfigError::NoEndpoint)
        }
    }

    fn raw(value: Value) -> RawConfig {
        serde_json::from_value(value).unwrap()
    }

    #[tokio::test]
    async fn test_chain_stops_at_first_non_empty() {
        let sources: Vec<Box<dyn ConfigSource>> = vec![
            Box::new(Fixed("failing", Err(()))),
            Box::new(Fixed("empty", Ok(RawConfig::new()))),
            Box::new(Fixed("second", Ok(raw(json!({"APP_NAME": "B"}))))),
            Box::new(Fixed("third", Ok(raw(json!({"APP_NAME": "C"}))))),
        ];

        let (name, config) = probe_chain(&sources).await.unwrap();

        assert_eq!(name, "second");
        assert_eq!(config["APP_NAME"], "B");
    }

    #[tokio::test]
    async fn test_chain_with_nothing_usable() {
        let sources: Vec<Box<dyn ConfigSource>> = vec![
            Box::new(Fixed("failing", Err(()))),
            Box::new(Fixed("empty", Ok(RawConfig::new()))),
        ];

        assert!(probe_chain(&sources).await.is_none());
    }

    #[tokio::test]
    async fn test_defaults_source_is_complete() {
        let source = DefaultsSource::new(Host::new("localhost"));
        let config = source.probe().await.unwrap();

        assert_eq!(config.len(), super::super::Key::ALL.len());
        assert_eq!(config["QR_CODE_SIZE"], 256);
    }

    #[tokio::test]
    async fn test_markup_source_returns_public_hints_only() {
        let hints = MarkupHints::new()
            .with_public("APP_NAME", "Gala")
            .with_secure(super::super::SecretKey::ApiKey, "k-123");
        let source = MarkupSource::new(Arc::new(hints));

        let config = source.probe().await.unwrap();

        assert_eq!(config.len(), 1);
        assert_eq!(config["APP_NAME"], "Gala");
    }
}

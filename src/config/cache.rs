//! Opt-in local configuration cache for development hosts.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use super::host::Host;
use super::source::{ConfigSource, RawConfig};
use super::ConfigError;
use crate::storage::KeyValueStore;

/// Storage key holding the cached configuration as a JSON object.
pub const CACHE_KEY: &str = "mtc-env-config";

#[derive(Debug, Clone)]
pub struct LocalCacheSource {
    store: Arc<dyn KeyValueStore>,
    host: Host,
}

impl LocalCacheSource {
    pub fn new(store: Arc<dyn KeyValueStore>, host: Host) -> Self {
        Self { store, host }
    }
}

#[async_trait]
impl ConfigSource for LocalCacheSource {
    fn name(&self) -> &'static str {
        "local-cache"
    }

    async fn probe(&self) -> Result<RawConfig, ConfigError> {
        if !self.host.is_development() {
            return Err(ConfigError::CacheUnavailable(self.host.to_string()));
        }
        let Some(stored) = self.store.get(CACHE_KEY)? else {
            return Ok(RawConfig::new());
        };
        match serde_json::from_str(&stored) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) => Err(ConfigError::NotAnObject(CACHE_KEY.to_string())),
            Err(source) => Err(ConfigError::InvalidJson {
                origin: CACHE_KEY.to_string(),
                source,
            }),
        }
    }
}

/// Saves `config` to the local cache. Refused on non-development hosts.
pub fn save_local_config(
    store: &dyn KeyValueStore,
    host: &Host,
    config: &RawConfig,
) -> Result<(), ConfigError> {
    if !host.is_development() {
        return Err(ConfigError::CacheUnavailable(host.to_string()));
    }
    let encoded = serde_json::to_string(config).map_err(|e| ConfigError::Storage(e.to_string()))?;
    store.set(CACHE_KEY, &encoded)
}

//! Sensitive configuration.
//!
//! Sensitive values take a narrower path than public ones: they are never
//! read from the public configuration merge, never appear in the public
//! view, and never reach a log line. Only key names are ever logged.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::hints::MarkupHints;
use super::host::Host;
use super::schema::{Key, SecretKey};
use super::ConfigError;
use crate::net::{fetch_with_timeout, Credentials, Fetcher, Request};
use crate::prompt::{SecretPrompt, WEBHOOK_PROMPT};
use crate::storage::KeyValueStore;

/// Substrings marking a value that was never actually configured.
pub const PLACEHOLDER_MARKERS: &[&str] = &["YOUR_", "PLACEHOLDER"];

/// Server endpoint for sensitive values on production hosts.
pub const SECURE_CONFIG_ENDPOINT: &str = "/api/secure-config";

const SECURE_STORAGE_PREFIX: &str = "secure_";

pub fn is_placeholder(value: &str) -> bool {
    PLACEHOLDER_MARKERS.iter().any(|marker| value.contains(marker))
}

/// Whether `value` is a real, configured secret.
pub fn is_configured(value: &str) -> bool {
    !value.trim().is_empty() && !is_placeholder(value)
}

/// A sensitive value. `Debug` and `Display` never show it.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(<redacted>)")
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("<redacted>")
    }
}

/// The resolved sensitive values. Only configured values are ever stored.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Secrets(BTreeMap<SecretKey, Secret>);

impl Secrets {
    pub fn get(&self, key: SecretKey) -> Option<&str> {
        self.0.get(&key).map(Secret::expose)
    }

    pub fn contains(&self, key: SecretKey) -> bool {
        self.0.contains_key(&key)
    }

    /// Stores `value` if it is configured; returns whether it was stored.
    pub fn insert(&mut self, key: SecretKey, value: &str) -> bool {
        if !is_configured(value) {
            return false;
        }
        self.0.insert(key, Secret::new(value.trim()));
        true
    }

    pub fn keys(&self) -> impl Iterator<Item = SecretKey> + '_ {
        self.0.keys().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Secrets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set()
            .entries(self.0.keys().map(|key| key.name()))
            .finish()
    }
}

/// Reverses and base64-encodes `text`.
///
/// This is obfuscation against casual inspection of client storage, not
/// encryption.
pub fn obfuscate(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }
    let reversed: String = text.chars().rev().collect();
    STANDARD.encode(reversed)
}

/// Inverse of [`obfuscate`]. Anything undecodable yields an empty string.
pub fn deobfuscate(encoded: &str) -> String {
    STANDARD
        .decode(encoded)
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
        .map(|reversed| reversed.chars().rev().collect())
        .unwrap_or_default()
}

/// Obfuscated per-key storage for secrets, layered on a [`KeyValueStore`].
#[derive(Debug, Clone)]
pub struct SecureStore {
    inner: Arc<dyn KeyValueStore>,
}

impl SecureStore {
    pub fn new(inner: Arc<dyn KeyValueStore>) -> Self {
        Self { inner }
    }

    fn storage_key(key: SecretKey) -> String {
        format!("{SECURE_STORAGE_PREFIX}{}", key.name())
    }

    pub fn get(&self, key: SecretKey) -> Option<String> {
        match self.inner.get(&Self::storage_key(key)) {
            Ok(Some(encoded)) => Some(deobfuscate(&encoded)).filter(|v| !v.is_empty()),
            Ok(None) => None,
            Err(e) => {
                warn!(key = key.name(), error = %e, "failed to read cached secret");
                None
            }
        }
    }

    pub fn set(&self, key: SecretKey, value: &str) {
        if let Err(e) = self.inner.set(&Self::storage_key(key), &obfuscate(value)) {
            warn!(key = key.name(), error = %e, "failed to cache secret");
        }
    }

    pub fn remove(&self, key: SecretKey) {
        if let Err(e) = self.inner.remove(&Self::storage_key(key)) {
            warn!(key = key.name(), error = %e, "failed to remove cached secret");
        }
    }

    /// Replaces a cached secret. Placeholder values are refused.
    pub fn update(&self, key: SecretKey, value: &str) -> bool {
        if !is_configured(value) {
            return false;
        }
        self.set(key, value.trim());
        true
    }

    /// Forgets every cached secret.
    pub fn clear(&self) {
        for &key in SecretKey::ALL {
            self.remove(key);
        }
    }
}

/// Resolves the sensitive keys for one page load.
pub(crate) struct SensitivePath<'a> {
    pub host: &'a Host,
    pub hints: &'a MarkupHints,
    pub fetcher: Option<&'a dyn Fetcher>,
    /// Present only on development hosts.
    pub cache: Option<SecureStore>,
    pub prompt: Option<&'a dyn SecretPrompt>,
    pub timeout: Duration,
    /// Time left for the secure endpoint under an overall deadline.
    pub io_deadline: Option<Duration>,
}

impl SensitivePath<'_> {
    /// Returns the resolved secrets.
    ///
    /// May switch the attendance flags in `public` according to the
    /// operator's answer when the webhook prompt is shown.
    pub async fn resolve(&self, public: &mut BTreeMap<Key, Value>) -> Secrets {
        let mut secrets = Secrets::default();

        if let Some(cache) = &self.cache {
            for &key in SecretKey::ALL {
                if let Some(value) = cache.get(key) {
                    if secrets.insert(key, &value) {
                        debug!(key = key.name(), "secret restored from local cache");
                    }
                }
            }
        }

        for (&key, value) in self.hints.secure() {
            if secrets.insert(key, value) {
                debug!(key = key.name(), "secret read from markup");
                if let Some(cache) = &self.cache {
                    cache.set(key, value.trim());
                }
            } else {
                debug!(key = key.name(), "ignoring unconfigured secret hint");
            }
        }

        if self.host.is_production_like() && !self.host.is_static_hosting() {
            if let Some(fetcher) = self.fetcher {
                match self.fetch_within_deadline(fetcher).await {
                    Ok(fetched) => {
                        for (key, value) in fetched {
                            secrets.insert(key, &value);
                        }
                    }
                    Err(e) => warn!(error = %e, "could not load sensitive configuration"),
                }
            }
        }

        if self.should_prompt(&secrets, public) {
            self.prompt_for_webhook(&mut secrets, public).await;
        }

        secrets
    }

    async fn fetch_within_deadline(
        &self,
        fetcher: &dyn Fetcher,
    ) -> Result<Vec<(SecretKey, String)>, ConfigError> {
        let Some(limit) = self.io_deadline else {
            return self.fetch_secure_config(fetcher).await;
        };
        tokio::time::timeout(limit, self.fetch_secure_config(fetcher))
            .await
            .unwrap_or_else(|_| {
                Err(ConfigError::Timeout {
                    url: SECURE_CONFIG_ENDPOINT.to_string(),
                    after_ms: limit.as_millis(),
                })
            })
    }

    async fn fetch_secure_config(
        &self,
        fetcher: &dyn Fetcher,
    ) -> Result<Vec<(SecretKey, String)>, ConfigError> {
        let request =
            Request::get(SECURE_CONFIG_ENDPOINT).with_credentials(Credentials::SameOrigin);
        let response = fetch_with_timeout(fetcher, request, self.timeout).await?;
        if !response.is_success() {
            return Err(ConfigError::Status {
                url: SECURE_CONFIG_ENDPOINT.to_string(),
                status: response.status,
            });
        }
        let body: Value = response.json(SECURE_CONFIG_ENDPOINT)?;
        let Value::Object(map) = body else {
            return Err(ConfigError::NotAnObject(SECURE_CONFIG_ENDPOINT.to_string()));
        };

        Ok(map
            .into_iter()
            .filter_map(|(name, value)| {
                let key = SecretKey::from_name(&name)?;
                match value {
                    Value::String(s) => Some((key, s)),
                    _ => None,
                }
            })
            .collect())
    }

    fn should_prompt(&self, secrets: &Secrets, public: &BTreeMap<Key, Value>) -> bool {
        if self.prompt.is_none() || secrets.contains(SecretKey::GoogleAppsScriptUrl) {
            return false;
        }
        if self.host.is_static_hosting() {
            return true;
        }
        self.host.is_development() && flag(public, Key::FeatureGoogleSheets)
    }

    async fn prompt_for_webhook(&self, secrets: &mut Secrets, public: &mut BTreeMap<Key, Value>) {
        let Some(prompt) = self.prompt else {
            return;
        };
        let key = SecretKey::GoogleAppsScriptUrl;
        let answer = prompt.prompt_for_secret(key, WEBHOOK_PROMPT).await;
        let accepted = answer.as_deref().is_some_and(|url| secrets.insert(key, url));

        if accepted {
            if let (Some(cache), Some(url)) = (&self.cache, secrets.get(key)) {
                cache.set(key, url);
            }
            info!("attendance webhook configured from operator prompt");
        } else {
            info!("no attendance webhook given; attendance tracking disabled");
        }
        public.insert(Key::EnableAttendanceTracking, Value::Bool(accepted));
        public.insert(Key::FeatureGoogleSheets, Value::Bool(accepted));
    }
}

pub(crate) fn flag(values: &BTreeMap<Key, Value>, key: Key) -> bool {
    values.get(&key).and_then(Value::as_bool).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    #[test]
    fn test_placeholders() {
        assert!(is_placeholder("https://script.google.com/macros/s/YOUR_SCRIPT_ID/exec"));
        assert!(is_placeholder("PLACEHOLDER"));
        assert!(!is_placeholder("https://script.google.com/macros/s/AKfy/exec"));
        assert!(!is_configured("   "));
    }

    #[test]
    fn test_obfuscation_round_trip() {
        let url = "https://script.google.com/macros/s/AKfy/exec";
        let encoded = obfuscate(url);

        assert_ne!(encoded, url);
        assert!(!encoded.contains("script.google.com"));
        assert_eq!(deobfuscate(&encoded), url);
    }

    #[test]
    fn test_deobfuscate_garbage_is_empty() {
        assert_eq!(deobfuscate("%%%not base64%%%"), "");
        assert_eq!(obfuscate(""), "");
    }

    #[test]
    fn test_secret_is_redacted() {
        let mut secrets = Secrets::default();
        secrets.insert(SecretKey::ApiKey, "k-123456");

        let debug = format!("{secrets:?}");
        assert!(debug.contains("API_KEY"));
        assert!(!debug.contains("k-123456"));
        assert_eq!(format!("{}", Secret::new("k-123456")), "<redacted>");
    }

    #[test]
    fn test_secrets_refuse_placeholders() {
        let mut secrets = Secrets::default();

        assert!(!secrets.insert(SecretKey::GoogleSheetId, "YOUR_SHEET_ID"));
        assert!(!secrets.insert(SecretKey::GoogleSheetId, ""));
        assert!(secrets.insert(SecretKey::GoogleSheetId, " sheet-1 "));
        assert_eq!(secrets.get(SecretKey::GoogleSheetId), Some("sheet-1"));
    }

    #[test]
    fn test_secure_store_obfuscates_at_rest() {
        let backing = Arc::new(MemoryStore::new());
        let store = SecureStore::new(backing.clone());

        assert!(store.update(SecretKey::ApiKey, "k-123456"));
        assert!(!store.update(SecretKey::ApiKey, "YOUR_KEY"));

        let raw = backing.get("secure_API_KEY").unwrap().unwrap();
        assert_ne!(raw, "k-123456");
        assert_eq!(store.get(SecretKey::ApiKey).as_deref(), Some("k-123456"));

        store.clear();
        assert_eq!(store.get(SecretKey::ApiKey), None);
    }
}

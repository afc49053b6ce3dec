use std::collections::BTreeMap;

use serde_json::{Map, Value};

use super::coerce::defaults;
use super::host::Host;
use super::schema::{Key, SecretKey};
use super::secrets::Secrets;
use super::validate::{validate, Warning};

/// The resolved configuration for one page load.
///
/// Built once by the [`Resolver`](super::Resolver) and read-only
/// afterwards. Every allow-listed key has a value; sensitive values are
/// kept apart and are left out of [`public_view`](Self::public_view) and
/// of `Debug` output.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigSnapshot {
    host: Host,
    source: &'static str,
    values: BTreeMap<Key, Value>,
    secrets: Secrets,
    warnings: Vec<Warning>,
}

impl ConfigSnapshot {
    pub(crate) fn new(
        host: Host,
        source: &'static str,
        values: BTreeMap<Key, Value>,
        secrets: Secrets,
        warnings: Vec<Warning>,
    ) -> Self {
        Self {
            host,
            source,
            values,
            secrets,
            warnings,
        }
    }

    /// The compiled-in defaults for `host`, with no secrets.
    pub fn defaults(host: &Host) -> Self {
        let values = defaults(host);
        let secrets = Secrets::default();
        let warnings = validate(&values, &secrets);
        Self::new(host.clone(), "defaults", values, secrets, warnings)
    }

    pub fn get(&self, key: Key) -> &Value {
        static NULL: Value = Value::Null;
        self.values.get(&key).unwrap_or(&NULL)
    }

    /// Looks a value up by name, returning `fallback` for unknown names.
    ///
    /// Sensitive keys resolve to their value when configured.
    pub fn get_or(&self, name: &str, fallback: Value) -> Value {
        if let Some(key) = Key::from_name(name) {
            return self.get(key).clone();
        }
        SecretKey::from_name(name)
            .and_then(|key| self.secret(key))
            .map(|secret| Value::String(secret.to_string()))
            .unwrap_or(fallback)
    }

    /// A boolean key; anything that is not `true` reads as `false`.
    pub fn flag(&self, key: Key) -> bool {
        self.get(key).as_bool().unwrap_or(false)
    }

    pub fn integer(&self, key: Key) -> Option<i64> {
        self.get(key).as_i64()
    }

    pub fn text(&self, key: Key) -> Option<&str> {
        self.get(key).as_str()
    }

    pub fn secret(&self, key: SecretKey) -> Option<&str> {
        self.secrets.get(key)
    }

    /// The attendance webhook, if one is configured.
    pub fn webhook_url(&self) -> Option<&str> {
        self.secret(SecretKey::GoogleAppsScriptUrl)
    }

    pub fn has_sensitive_config(&self) -> bool {
        !self.secrets.is_empty()
    }

    /// `FEATURE_<NAME>` for a feature name such as `"google_sheets"`.
    pub fn is_feature_enabled(&self, feature: &str) -> bool {
        let name = format!("FEATURE_{}", feature.to_ascii_uppercase());
        Key::from_name(&name).is_some_and(|key| self.flag(key))
    }

    /// Attendance records are sent only when tracking and the sheets
    /// feature are on and a real webhook is configured.
    pub fn attendance_enabled(&self) -> bool {
        self.flag(Key::EnableAttendanceTracking)
            && self.flag(Key::FeatureGoogleSheets)
            && self.webhook_url().is_some()
    }

    pub fn is_development(&self) -> bool {
        self.text(Key::NodeEnv) == Some("development")
    }

    pub fn is_production(&self) -> bool {
        self.text(Key::NodeEnv) == Some("production")
    }

    /// Every public value, keyed by name. Never contains a sensitive key.
    pub fn public_view(&self) -> Map<String, Value> {
        self.values
            .iter()
            .map(|(key, value)| (key.name().to_string(), value.clone()))
            .collect()
    }

    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    /// Name of the source the public values came from.
    pub fn source(&self) -> &'static str {
        self.source
    }

    pub fn host(&self) -> &Host {
        &self.host
    }
}

//! Cross-field validation of a resolved configuration.
//!
//! Nothing here fails resolution; problems are reported as [`Warning`]s.

use std::collections::BTreeMap;
use std::fmt;
use std::ops::RangeInclusive;

use serde_json::Value;

use super::schema::{Key, SecretKey};
use super::secrets::{flag, Secrets};

/// Keys that must hold a non-empty value.
pub const REQUIRED_KEYS: &[Key] = &[Key::AppName, Key::DefaultEventName];

/// Recommended ranges for numeric keys.
pub const RANGES: &[(Key, RangeInclusive<i64>)] = &[
    (Key::QrCodeSize, 128..=1024),
    (Key::MinNameLength, 1..=50),
];

#[derive(Debug, Clone, PartialEq)]
pub enum Warning {
    MissingRequired(Key),
    OutOfRange { key: Key, value: Value, min: i64, max: i64 },
    NotNumeric { key: Key, value: Value },
    /// Attendance tracking is switched on but has nowhere to send records.
    WebhookNotConfigured,
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::MissingRequired(key) => write!(f, "required field {} is missing", key.name()),
            Warning::OutOfRange { key, value, min, max } => write!(
                f,
                "{} should be between {min} and {max} (got {value})",
                key.name()
            ),
            Warning::NotNumeric { key, value } => {
                write!(f, "{} should be a number (got {value})", key.name())
            }
            Warning::WebhookNotConfigured => write!(
                f,
                "{} not configured - attendance tracking will be disabled",
                SecretKey::GoogleAppsScriptUrl.name()
            ),
        }
    }
}

/// Checks `values` and `secrets` and returns every warning found.
pub fn validate(values: &BTreeMap<Key, Value>, secrets: &Secrets) -> Vec<Warning> {
    let mut warnings = Vec::new();

    for &key in REQUIRED_KEYS {
        if is_blank(values.get(&key)) {
            warnings.push(Warning::MissingRequired(key));
        }
    }

    for (key, range) in RANGES {
        let Some(value) = values.get(key) else {
            continue;
        };
        match value.as_f64() {
            Some(n) if n >= *range.start() as f64 && n <= *range.end() as f64 => {}
            Some(_) => warnings.push(Warning::OutOfRange {
                key: *key,
                value: value.clone(),
                min: *range.start(),
                max: *range.end(),
            }),
            None => warnings.push(Warning::NotNumeric {
                key: *key,
                value: value.clone(),
            }),
        }
    }

    if flag(values, Key::EnableAttendanceTracking)
        && flag(values, Key::FeatureGoogleSheets)
        && !secrets.contains(SecretKey::GoogleAppsScriptUrl)
    {
        warnings.push(Warning::WebhookNotConfigured);
    }

    warnings
}

fn is_blank(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        Some(_) => false,
    }
}

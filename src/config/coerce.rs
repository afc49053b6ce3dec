//! Schema-driven value coercion and allow-list filtering.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex_lite::Regex;
use serde_json::{Number, Value};
use tracing::debug;

use super::host::Host;
use super::schema::{Key, Kind};
use super::source::RawConfig;

/// Replacement for any color value that is not a `#RRGGBB` hex string.
pub const FALLBACK_COLOR: &str = "#000000";

fn color_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^#[0-9A-Fa-f]{6}$").expect("color pattern is valid"))
}

/// Coerces a raw source value according to the key's declared kind.
pub fn coerce(kind: Kind, value: Value) -> Value {
    match kind {
        Kind::Boolean => coerce_bool(value),
        Kind::Integer | Kind::Float => coerce_number(value),
        Kind::Color => coerce_color(value),
        Kind::String => value,
    }
}

fn coerce_bool(value: Value) -> Value {
    match value {
        Value::String(s) if s.eq_ignore_ascii_case("true") => Value::Bool(true),
        Value::String(s) if s.eq_ignore_ascii_case("false") => Value::Bool(false),
        other => other,
    }
}

fn coerce_number(value: Value) -> Value {
    let Value::String(s) = value else {
        return value;
    };

    if is_digits(&s) {
        if let Ok(i) = s.parse::<u64>() {
            return Value::Number(i.into());
        }
    } else if let Some((whole, fraction)) = s.split_once('.') {
        if is_digits(whole) && is_digits(fraction) {
            if let Some(n) = s.parse::<f64>().ok().and_then(Number::from_f64) {
                return Value::Number(n);
            }
        }
    }

    // Left as a string; validation reports it.
    Value::String(s)
}

fn coerce_color(value: Value) -> Value {
    match value {
        Value::String(s) if color_pattern().is_match(&s) => Value::String(s),
        _ => Value::String(FALLBACK_COLOR.to_string()),
    }
}

fn is_digits(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_digit())
}

/// Overlays the allow-listed part of `raw` on the defaults for `host`.
///
/// Unknown keys (including sensitive ones) are dropped; `null` keeps the
/// default. The result always contains every allow-listed key.
pub fn sanitize(raw: &RawConfig, host: &Host) -> BTreeMap<Key, Value> {
    let mut values = defaults(host);

    for (name, value) in raw {
        let Some(key) = Key::from_name(name) else {
            debug!(key = %name, "dropping key outside the allow-list");
            continue;
        };
        if value.is_null() {
            continue;
        }
        values.insert(key, coerce(key.kind(), value.clone()));
    }

    values
}

/// The compiled-in defaults for `host`, one value per allow-listed key.
pub fn defaults(host: &Host) -> BTreeMap<Key, Value> {
    Key::ALL
        .iter()
        .map(|&key| (key, key.default_value(host)))
        .collect()
}

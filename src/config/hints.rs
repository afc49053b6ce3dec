//! Markup-embedded configuration hints.
//!
//! A deployment step renders key/value pairs into the page head as
//! `<meta name="env-<key>" content="...">` for public values and
//! `<meta name="secure-<key>" content="...">` for sensitive ones. Keys are
//! written in lower case and read back upper-cased.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex_lite::Regex;
use serde_json::Value;
use tracing::debug;

use super::schema::SecretKey;
use super::source::RawConfig;

const PUBLIC_PREFIX: &str = "env-";
const SECURE_PREFIX: &str = "secure-";

fn meta_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"<meta\s+name="((?:env|secure)-[^"]+)"\s+content="([^"]*)"\s*/?>"#)
            .expect("meta pattern is valid")
    })
}

/// Hints read once at page load.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MarkupHints {
    public: RawConfig,
    secure: BTreeMap<SecretKey, String>,
}

impl MarkupHints {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a public hint. The key is taken verbatim.
    pub fn with_public(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.public.insert(key.into(), value.into());
        self
    }

    pub fn with_secure(mut self, key: SecretKey, value: impl Into<String>) -> Self {
        self.secure.insert(key, value.into());
        self
    }

    /// Extracts `env-*` and `secure-*` meta tags from a rendered page.
    ///
    /// Secure tags naming an unknown key are ignored.
    pub fn parse_html(html: &str) -> Self {
        let mut hints = Self::new();

        for captures in meta_pattern().captures_iter(html) {
            let (Some(name), Some(content)) = (captures.get(1), captures.get(2)) else {
                continue;
            };
            let content = unescape(content.as_str());

            if let Some(key) = name.as_str().strip_prefix(PUBLIC_PREFIX) {
                hints
                    .public
                    .insert(key.to_ascii_uppercase(), Value::String(content));
            } else if let Some(key) = name.as_str().strip_prefix(SECURE_PREFIX) {
                match SecretKey::from_name(&key.to_ascii_uppercase()) {
                    Some(secret) => {
                        hints.secure.insert(secret, content);
                    }
                    None => debug!(tag = name.as_str(), "ignoring unknown secure hint"),
                }
            }
        }

        hints
    }

    pub fn public(&self) -> &RawConfig {
        &self.public
    }

    pub fn secure(&self) -> &BTreeMap<SecretKey, String> {
        &self.secure
    }

    pub fn is_empty(&self) -> bool {
        self.public.is_empty() && self.secure.is_empty()
    }

    /// Layers `other` over `self`; hints in `other` win.
    pub fn merge(mut self, other: MarkupHints) -> Self {
        self.public.extend(other.public);
        self.secure.extend(other.secure);
        self
    }
}

fn unescape(s: &str) -> String {
    s.replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

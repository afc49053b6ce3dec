//! File-based markup hints.
//!
//! Lets a deployment keep its hints in TOML instead of rendering them into
//! a page:
//!
//! ```toml
//! [public]
//! APP_NAME = "Spring Gala"
//! QR_CODE_SIZE = "300"
//!
//! [secure]
//! GOOGLE_APPS_SCRIPT_URL = "https://script.google.com/macros/s/abc/exec"
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::hints::MarkupHints;
use super::schema::SecretKey;
use super::ConfigError;

#[derive(Debug, Default, Deserialize)]
struct HintsFile {
    #[serde(default)]
    public: BTreeMap<String, Value>,
    #[serde(default)]
    secure: BTreeMap<String, String>,
}

impl From<HintsFile> for MarkupHints {
    fn from(file: HintsFile) -> Self {
        let hints = file
            .public
            .into_iter()
            .fold(MarkupHints::new(), |hints, (key, value)| {
                hints.with_public(key, value)
            });
        file.secure
            .into_iter()
            .fold(hints, |hints, (name, value)| match SecretKey::from_name(&name) {
                Some(key) => hints.with_secure(key, value),
                None => {
                    debug!(key = %name, "ignoring unknown secure hint");
                    hints
                }
            })
    }
}

/// Loads hints from a TOML file.
///
/// Returns `Ok(None)` if the file doesn't exist and `required` is false.
pub fn load_hints_file(path: &Path, required: bool) -> Result<Option<MarkupHints>, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(contents) => {
            let file: HintsFile = toml::from_str(&contents).map_err(|e| ConfigError::ParseError {
                path: path.to_path_buf(),
                source: e,
            })?;
            Ok(Some(file.into()))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            if required {
                Err(ConfigError::FileNotFound(path.to_path_buf()))
            } else {
                Ok(None)
            }
        }
        Err(e) => Err(ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

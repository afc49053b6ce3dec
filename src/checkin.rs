//! Check-in form rules and the QR payload.
//!
//! QR encoding itself is left to whatever library renders the code; this
//! module decides what goes into it and with which options.

use std::sync::OnceLock;

use regex_lite::Regex;
use thiserror::Error;

use crate::config::{ConfigSnapshot, Key};

fn email_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern is valid")
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CheckInError {
    #[error("please enter a valid name (minimum {min} characters)")]
    NameTooShort { min: usize },

    #[error("name is too long (maximum {max} characters)")]
    NameTooLong { max: usize },

    #[error("please fill in the email address")]
    MissingEmail,

    #[error("please enter a valid email address")]
    InvalidEmail,

    #[error("email address is too long (maximum {max} characters)")]
    EmailTooLong { max: usize },

    #[error("QR code generation is disabled")]
    QrGenerationDisabled,
}

/// A validated check-in submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckIn {
    name: String,
    email: String,
    event: Option<String>,
}

impl CheckIn {
    /// Validates the form fields against the configured rules.
    ///
    /// Inputs are trimmed; an empty event name counts as none.
    pub fn validate(
        config: &ConfigSnapshot,
        name: &str,
        email: &str,
        event: Option<&str>,
    ) -> Result<Self, CheckInError> {
        if !config.flag(Key::EnableQrGeneration) {
            return Err(CheckInError::QrGenerationDisabled);
        }

        let name = name.trim();
        let email = email.trim();

        if config.flag(Key::EnableNameValidation) {
            let min = limit(config, Key::MinNameLength);
            let max = limit(config, Key::MaxNameLength);
            let length = name.chars().count();
            if name.is_empty() || length < min {
                return Err(CheckInError::NameTooShort { min });
            }
            if length > max {
                return Err(CheckInError::NameTooLong { max });
            }
        }

        if email.is_empty() {
            return Err(CheckInError::MissingEmail);
        }
        if config.flag(Key::EnableEmailValidation) {
            if !email_pattern().is_match(email) {
                return Err(CheckInError::InvalidEmail);
            }
            let max = limit(config, Key::MaxEmailLength);
            if email.chars().count() > max {
                return Err(CheckInError::EmailTooLong { max });
            }
        }

        let event = event
            .map(str::trim)
            .filter(|event| !event.is_empty())
            .map(str::to_string);

        Ok(Self {
            name: name.to_string(),
            email: email.to_string(),
            event,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    /// The event typed into the form, or the configured default.
    pub fn event_name<'a>(&'a self, config: &'a ConfigSnapshot) -> &'a str {
        self.event
            .as_deref()
            .or_else(|| config.text(Key::DefaultEventName))
            .unwrap_or_default()
    }

    /// Text encoded into the QR code.
    pub fn qr_payload(&self) -> String {
        format!("Name: {}\nEmail: {}", self.name, self.email)
    }
}

/// A numeric limit from the configuration, falling back to its default
/// when the configured value is not a non-negative integer.
fn limit(config: &ConfigSnapshot, key: Key) -> usize {
    config
        .integer(key)
        .or_else(|| key.default_value(config.host()).as_i64())
        .and_then(|n| usize::try_from(n).ok())
        .unwrap_or(0)
}

/// QR error-correction level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CorrectionLevel {
    L,
    #[default]
    M,
    Q,
    H,
}

impl CorrectionLevel {
    /// Parses `L`, `M`, `Q` or `H`; anything else is `M`.
    pub fn from_config(config: &ConfigSnapshot) -> Self {
        match config.text(Key::QrCodeCorrectionLevel).map(str::trim) {
            Some("L") => Self::L,
            Some("Q") => Self::Q,
            Some("H") => Self::H,
            _ => Self::M,
        }
    }
}

/// Everything a QR renderer needs for one check-in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QrOptions {
    pub text: String,
    pub size: u32,
    pub color_dark: String,
    pub color_light: String,
    pub correction: CorrectionLevel,
}

impl QrOptions {
    pub fn for_check_in(config: &ConfigSnapshot, check_in: &CheckIn) -> Self {
        let color = |key: Key| {
            config
                .text(key)
                .map(str::to_string)
                .or_else(|| key.default_value(config.host()).as_str().map(str::to_string))
                .unwrap_or_default()
        };

        Self {
            text: check_in.qr_payload(),
            size: u32::try_from(limit(config, Key::QrCodeSize)).unwrap_or(256),
            color_dark: color(Key::QrCodeColorDark),
            color_light: color(Key::QrCodeColorLight),
            correction: CorrectionLevel::from_config(config),
        }
    }
}

//! The declared configuration schema.
//!
//! Every public key has a fixed [`Kind`] that drives coercion during the
//! merge; the value's runtime shape is never used to guess a type.
//! Sensitive keys live in their own enum so they cannot reach the public
//! allow-list by accident.

use serde_json::{json, Value};

use super::host::Host;

/// Declared type of a configuration key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Boolean,
    Integer,
    Float,
    String,
    Color,
}

macro_rules! public_keys {
    ($( $variant:ident => $name:literal : $kind:ident ),* $(,)?) => {
        /// An allow-listed, non-sensitive configuration key.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub enum Key {
            $($variant),*
        }

        impl Key {
            /// Every allow-listed key, in declaration order.
            pub const ALL: &'static [Key] = &[$(Key::$variant),*];

            pub const fn name(self) -> &'static str {
                match self {
                    $(Key::$variant => $name),*
                }
            }

            pub const fn kind(self) -> Kind {
                match self {
                    $(Key::$variant => Kind::$kind),*
                }
            }
        }
    };
}

public_keys! {
    NodeEnv => "NODE_ENV": String,
    AppName => "APP_NAME": String,
    AppVersion => "APP_VERSION": String,
    DefaultEventName => "DEFAULT_EVENT_NAME": String,
    EnableQrGeneration => "ENABLE_QR_GENERATION": Boolean,
    EnableAttendanceTracking => "ENABLE_ATTENDANCE_TRACKING": Boolean,
    FeatureEventNameField => "FEATURE_EVENT_NAME_FIELD": Boolean,
    FeatureGoogleSheets => "FEATURE_GOOGLE_SHEETS": Boolean,
    ShowAttendanceMessages => "SHOW_ATTENDANCE_MESSAGES": Boolean,
    ShowAttendanceCounter => "SHOW_ATTENDANCE_COUNTER": Boolean,
    ShowDebugInfo => "SHOW_DEBUG_INFO": Boolean,
    EnableKeyboardShortcuts => "ENABLE_KEYBOARD_SHORTCUTS": Boolean,
    PrimaryColor => "PRIMARY_COLOR": Color,
    SecondaryColor => "SECONDARY_COLOR": Color,
    BackgroundColor => "BACKGROUND_COLOR": Color,
    ContainerBackground => "CONTAINER_BACKGROUND": Color,
    TextColor => "TEXT_COLOR": Color,
    QrCodeSize => "QR_CODE_SIZE": Integer,
    QrCodeColorDark => "QR_CODE_COLOR_DARK": Color,
    QrCodeColorLight => "QR_CODE_COLOR_LIGHT": Color,
    QrCodeCorrectionLevel => "QR_CODE_CORRECTION_LEVEL": String,
    EnableEmailValidation => "ENABLE_EMAIL_VALIDATION": Boolean,
    EnableNameValidation => "ENABLE_NAME_VALIDATION": Boolean,
    MinNameLength => "MIN_NAME_LENGTH": Integer,
    MaxNameLength => "MAX_NAME_LENGTH": Integer,
    MaxEmailLength => "MAX_EMAIL_LENGTH": Integer,
    EnableConsoleLogging => "ENABLE_CONSOLE_LOGGING": Boolean,
    EnableErrorLogging => "ENABLE_ERROR_LOGGING": Boolean,
    LogLevel => "LOG_LEVEL": String,
    GoogleSheetName => "GOOGLE_SHEET_NAME": String,
    GoogleRequestTimeout => "GOOGLE_REQUEST_TIMEOUT": Integer,
    GoogleMaxRetries => "GOOGLE_MAX_RETRIES": Integer,
}

impl Key {
    /// Looks up an allow-listed key by its exact name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|key| key.name() == name)
    }

    /// The compiled-in safe default for this key on `host`.
    pub fn default_value(self, host: &Host) -> Value {
        let dev = host.is_development();
        match self {
            Key::NodeEnv => json!(if dev { "development" } else { "production" }),
            Key::AppName => json!("MTC Event Check-In QR Tool"),
            Key::AppVersion => json!("2.0.0"),
            Key::DefaultEventName => json!("MTC Event"),
            Key::EnableQrGeneration => json!(true),
            Key::EnableAttendanceTracking => json!(false),
            Key::FeatureEventNameField => json!(true),
            Key::FeatureGoogleSheets => json!(false),
            Key::ShowAttendanceMessages => json!(true),
            Key::ShowAttendanceCounter => json!(false),
            Key::ShowDebugInfo => json!(dev),
            Key::EnableKeyboardShortcuts => json!(true),
            Key::PrimaryColor => json!("#0078D4"),
            Key::SecondaryColor => json!("#106ebe"),
            Key::BackgroundColor => json!("#f0f2f5"),
            Key::ContainerBackground => json!("#ffffff"),
            Key::TextColor => json!("#333333"),
            Key::QrCodeSize => json!(256),
            Key::QrCodeColorDark => json!("#000000"),
            Key::QrCodeColorLight => json!("#ffffff"),
            Key::QrCodeCorrectionLevel => json!("M"),
            Key::EnableEmailValidation => json!(true),
            Key::EnableNameValidation => json!(true),
            Key::MinNameLength => json!(2),
            Key::MaxNameLength => json!(100),
            Key::MaxEmailLength => json!(254),
            Key::EnableConsoleLogging => json!(dev),
            Key::EnableErrorLogging => json!(true),
            Key::LogLevel => json!(if dev { "debug" } else { "error" }),
            Key::GoogleSheetName => json!("Attendance"),
            Key::GoogleRequestTimeout => json!(10_000),
            Key::GoogleMaxRetries => json!(3),
        }
    }
}

/// A configuration key whose value must never reach logs or the public view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SecretKey {
    GoogleAppsScriptUrl,
    GoogleSheetId,
    ApiKey,
    Secret,
    DatabaseUrl,
    PrivateKey,
}

impl SecretKey {
    pub const ALL: &'static [SecretKey] = &[
        SecretKey::GoogleAppsScriptUrl,
        SecretKey::GoogleSheetId,
        SecretKey::ApiKey,
        SecretKey::Secret,
        SecretKey::DatabaseUrl,
        SecretKey::PrivateKey,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            SecretKey::GoogleAppsScriptUrl => "GOOGLE_APPS_SCRIPT_URL",
            SecretKey::GoogleSheetId => "GOOGLE_SHEET_ID",
            SecretKey::ApiKey => "API_KEY",
            SecretKey::Secret => "SECRET_KEY",
            SecretKey::DatabaseUrl => "DATABASE_URL",
            SecretKey::PrivateKey => "PRIVATE_KEY",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|key| key.name() == name)
    }
}

/// One row of the schema: a key, its declared kind and its default.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigEntry {
    pub key: Key,
    pub kind: Kind,
    pub default: Value,
}

impl ConfigEntry {
    pub fn new(key: Key, host: &Host) -> Self {
        Self {
            key,
            kind: key.kind(),
            default: key.default_value(host),
        }
    }
}

/// The full schema as it applies to `host`.
pub fn schema(host: &Host) -> Vec<ConfigEntry> {
    Key::ALL.iter().map(|&key| ConfigEntry::new(key, host)).collect()
}

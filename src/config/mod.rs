//! Configuration resolution.
//!
//! A [`Resolver`] turns several partially-trusted sources into one
//! [`ConfigSnapshot`]. See the resolver docs for source precedence.

mod builder;
mod cache;
mod coerce;
mod endpoint;
mod error;
mod file;
mod hints;
mod host;
mod schema;
mod secrets;
mod snapshot;
mod source;
mod validate;

pub use builder::{Resolver, ResolverBuilder, DEFAULT_PROBE_TIMEOUT, DEFAULT_RESOLVE_DEADLINE};
pub use cache::{save_local_config, LocalCacheSource, CACHE_KEY};
pub use coerce::{coerce, FALLBACK_COLOR};
pub use endpoint::{EndpointSource, CONFIG_ENDPOINTS, STATIC_ASSETS};
pub use error::ConfigError;
pub use file::load_hints_file;
pub use hints::MarkupHints;
pub use host::Host;
pub use schema::{schema, ConfigEntry, Key, Kind, SecretKey};
pub use secrets::{
    deobfuscate, is_placeholder, obfuscate, Secret, SecureStore, Secrets, PLACEHOLDER_MARKERS,
    SECURE_CONFIG_ENDPOINT,
};
pub use snapshot::ConfigSnapshot;
pub use source::{ConfigSource, DefaultsSource, MarkupSource, RawConfig};
pub use validate::{Warning, RANGES, REQUIRED_KEYS};

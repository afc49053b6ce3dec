//! Host classification.
//!
//! Which sources the resolver may consult depends on where the page is
//! served from: development hosts get the local cache and the operator
//! prompt, static-hosting domains get static JSON assets instead of the
//! configuration endpoint.

use std::fmt;

/// The hostname the page was loaded from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Host {
    name: String,
}

impl Host {
    /// Creates a host from a hostname or `host:port` string.
    ///
    /// The port is dropped and the name is lower-cased.
    pub fn new(name: impl AsRef<str>) -> Self {
        let trimmed = name.as_ref().trim();
        let without_port = match trimmed.rsplit_once(':') {
            Some((host, port)) if port.chars().all(|c| c.is_ascii_digit()) => host,
            _ => trimmed,
        };
        Self {
            name: without_port.to_ascii_lowercase(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Local and LAN hosts used while developing.
    pub fn is_development(&self) -> bool {
        let name = self.name.as_str();
        name == "localhost"
            || name == "127.0.0.1"
            || name.starts_with("192.168.")
            || name.ends_with(".local")
    }

    /// Static hosting on GitHub Pages.
    pub fn is_static_hosting(&self) -> bool {
        self.name.contains("github.io") || self.name.contains("github.com")
    }

    /// Anything that is not a development host.
    pub fn is_production_like(&self) -> bool {
        !self.is_development()
    }
}

impl From<&str> for Host {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for Host {
    fn from(name: String) -> Self {
        Self::new(name)
    }
}

impl fmt::Display for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

//! Application context holding the resolved configuration.

use std::sync::OnceLock;
use std::time::Duration;

use serde_json::Value;
use tracing::warn;

use crate::checkin::CheckIn;
use crate::config::{ConfigSnapshot, Host, Key, Resolver};
use crate::Error;

/// Central application context for one page load.
///
/// Starts out unresolved, receives exactly one [`ConfigSnapshot`], and is
/// read-only from then on. Consumers hold a reference to the context
/// instead of reaching for a global.
///
/// ## Example
///
/// ```no_run
/// use checkin_config::config::Resolver;
/// use checkin_config::AppContext;
///
/// # async fn run() -> Result<(), checkin_config::Error> {
/// let resolver = Resolver::builder("localhost").build();
/// let ctx = AppContext::new(resolver.host().clone());
///
/// // Safe to call before resolution: answers with the compiled-in default.
/// let size = ctx.get("QR_CODE_SIZE", 256.into());
///
/// ctx.initialize(&resolver).await?;
/// let snapshot = ctx.snapshot().expect("resolved");
/// # let _ = (size, snapshot);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct AppContext {
    host: Host,
    snapshot: OnceLock<ConfigSnapshot>,
}

impl AppContext {
    /// Creates an unresolved context for pages served from `host`.
    pub fn new(host: Host) -> Self {
        Self {
            host,
            snapshot: OnceLock::new(),
        }
    }

    /// Creates a context that is already resolved.
    pub fn resolved(snapshot: ConfigSnapshot) -> Self {
        let ctx = Self::new(snapshot.host().clone());
        let _ = ctx.snapshot.set(snapshot);
        ctx
    }

    /// Resolves with the default deadline and installs the result.
    pub async fn initialize(&self, resolver: &Resolver) -> Result<&ConfigSnapshot, Error> {
        self.initialize_within(resolver, crate::config::DEFAULT_RESOLVE_DEADLINE)
            .await
    }

    pub async fn initialize_within(
        &self,
        resolver: &Resolver,
        deadline: Duration,
    ) -> Result<&ConfigSnapshot, Error> {
        if self.is_resolved() {
            return Err(Error::AlreadyResolved);
        }
        let snapshot = resolver.resolve_within(deadline).await;
        self.install(snapshot)
    }

    /// Installs the snapshot. A context accepts exactly one.
    pub fn install(&self, snapshot: ConfigSnapshot) -> Result<&ConfigSnapshot, Error> {
        self.snapshot
            .set(snapshot)
            .map_err(|_| Error::AlreadyResolved)?;
        self.snapshot.get().ok_or(Error::AlreadyResolved)
    }

    pub fn is_resolved(&self) -> bool {
        self.snapshot.get().is_some()
    }

    pub fn snapshot(&self) -> Option<&ConfigSnapshot> {
        self.snapshot.get()
    }

    pub fn host(&self) -> &Host {
        &self.host
    }

    /// Reads a value by name. Never blocks and never fails.
    ///
    /// Before resolution this answers with the compiled-in default for
    /// allow-listed keys and with `fallback` for anything else.
    pub fn get(&self, name: &str, fallback: Value) -> Value {
        if let Some(snapshot) = self.snapshot.get() {
            return snapshot.get_or(name, fallback);
        }
        warn!(key = %name, "configuration read before it was resolved");
        match Key::from_name(name) {
            Some(key) => key.default_value(&self.host),
            None => fallback,
        }
    }

    /// Validates a check-in form against the resolved configuration.
    ///
    /// Before resolution the compiled-in defaults apply.
    pub fn check_in(&self, name: &str, email: &str, event: Option<&str>) -> Result<CheckIn, Error> {
        let check_in = match self.snapshot.get() {
            Some(snapshot) => CheckIn::validate(snapshot, name, email, event)?,
            None => {
                warn!("check-in validated before configuration was resolved");
                let defaults = ConfigSnapshot::defaults(&self.host);
                CheckIn::validate(&defaults, name, email, event)?
            }
        };
        Ok(check_in)
    }
}

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use super::cache::LocalCacheSource;
use super::coerce::sanitize;
use super::endpoint::EndpointSource;
use super::hints::MarkupHints;
use super::host::Host;
use super::secrets::{SecureStore, SensitivePath};
use super::snapshot::ConfigSnapshot;
use super::source::{probe_chain, ConfigSource, DefaultsSource, MarkupSource, RawConfig};
use super::validate::validate;
use crate::net::Fetcher;
use crate::prompt::SecretPrompt;
use crate::storage::KeyValueStore;

/// Upper bound on each network probe.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_millis(10_000);

/// Upper bound on source loading before falling back to markup hints and defaults.
pub const DEFAULT_RESOLVE_DEADLINE: Duration = Duration::from_millis(5_000);

/// Produces the [`ConfigSnapshot`] for one page load.
///
/// Sources are probed strictly in order and the first one that yields a
/// non-empty mapping wins; later sources are not consulted:
///
/// 1. markup hints
/// 2. the configuration endpoint, or the static JSON assets on static hosting
/// 3. the local cache (development hosts only)
/// 4. compiled-in defaults
///
/// The winning mapping is filtered to the allow-list, coerced by declared
/// kind and overlaid on the defaults. Sensitive keys are then resolved on
/// their own path and the result is validated.
///
/// ## Example
///
/// ```no_run
/// use std::sync::Arc;
/// use checkin_config::config::{MarkupHints, Resolver};
/// use checkin_config::net::StaticDirFetcher;
///
/// # async fn run() {
/// let html = std::fs::read_to_string("site/index.html").unwrap_or_default();
/// let resolver = Resolver::builder("localhost")
///     .with_hints(MarkupHints::parse_html(&html))
///     .with_fetcher(Arc::new(StaticDirFetcher::new("site")))
///     .build();
///
/// let snapshot = resolver.resolve().await;
/// println!("QR size: {}", snapshot.get_or("QR_CODE_SIZE", 256.into()));
/// # }
/// ```
pub struct Resolver {
    host: Host,
    hints: Arc<MarkupHints>,
    sources: Vec<Box<dyn ConfigSource>>,
    fetcher: Option<Arc<dyn Fetcher>>,
    store: Option<Arc<dyn KeyValueStore>>,
    prompt: Option<Arc<dyn SecretPrompt>>,
    timeout: Duration,
}

impl Resolver {
    /// Creates a new resolver builder for pages served from `host`.
    pub fn builder(host: impl Into<Host>) -> ResolverBuilder {
        ResolverBuilder {
            host: host.into(),
            hints: MarkupHints::default(),
            fetcher: None,
            store: None,
            prompt: None,
            timeout: DEFAULT_PROBE_TIMEOUT,
            extra_sources: Vec::new(),
        }
    }

    pub fn host(&self) -> &Host {
        &self.host
    }

    /// Names of the public sources in probe order.
    pub fn source_names(&self) -> Vec<&'static str> {
        self.sources.iter().map(|source| source.name()).collect()
    }

    /// Resolves the configuration. Never fails.
    pub async fn resolve(&self) -> ConfigSnapshot {
        self.run(None).await
    }

    /// Resolves the configuration, bounding source loading by `deadline`.
    ///
    /// The deadline covers the public source chain and the secure endpoint.
    /// If the chain stalls, the markup hints (or the compiled-in defaults)
    /// are used so the page can carry on. The operator prompt is not
    /// subject to the deadline.
    pub async fn resolve_within(&self, deadline: Duration) -> ConfigSnapshot {
        self.run(Some(deadline)).await
    }

    async fn run(&self, deadline: Option<Duration>) -> ConfigSnapshot {
        let started = Instant::now();
        let found = match deadline {
            Some(limit) => match tokio::time::timeout(limit, probe_chain(&self.sources)).await {
                Ok(found) => found,
                Err(_) => {
                    warn!(
                        deadline_ms = limit.as_millis() as u64,
                        "configuration loading stalled; using markup hints and defaults"
                    );
                    Some(self.stalled_fallback())
                }
            },
            None => probe_chain(&self.sources).await,
        };
        let (origin, raw) = found.unwrap_or_else(|| {
            warn!("all configuration sources failed; using compiled-in defaults");
            ("defaults", RawConfig::new())
        });

        let remaining = deadline.map(|limit| limit.saturating_sub(started.elapsed()));
        let mut values = sanitize(&raw, &self.host);
        let secrets = self.sensitive_path(remaining).resolve(&mut values).await;
        let warnings = validate(&values, &secrets);
        for warning in &warnings {
            warn!(%warning, "configuration warning");
        }

        let snapshot = ConfigSnapshot::new(self.host.clone(), origin, values, secrets, warnings);
        debug!(
            host = %self.host,
            source = origin,
            config = ?snapshot.public_view(),
            "configuration resolved"
        );
        snapshot
    }

    /// The public mapping used when the source chain misses its deadline.
    fn stalled_fallback(&self) -> (&'static str, RawConfig) {
        let public = self.hints.public();
        if public.is_empty() {
            ("defaults", RawConfig::new())
        } else {
            ("markup", public.clone())
        }
    }

    fn sensitive_path(&self, io_deadline: Option<Duration>) -> SensitivePath<'_> {
        let cache = self
            .store
            .as_ref()
            .filter(|_| self.host.is_development())
            .map(|store| SecureStore::new(store.clone()));

        SensitivePath {
            host: &self.host,
            hints: &self.hints,
            fetcher: self.fetcher.as_deref(),
            cache,
            prompt: self.prompt.as_deref(),
            timeout: self.timeout,
            io_deadline,
        }
    }
}

impl fmt::Debug for Resolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolver")
            .field("host", &self.host)
            .field("sources", &self.sources)
            .field("prompt", &self.prompt.is_some())
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

/// Builder for a [`Resolver`].
///
/// Only the host is required. Without a fetcher the network sources are
/// skipped; without a store the local cache is skipped; without a prompt
/// the operator is never asked for the webhook.
#[must_use = "builders do nothing until .build() is called"]
pub struct ResolverBuilder {
    host: Host,
    hints: MarkupHints,
    fetcher: Option<Arc<dyn Fetcher>>,
    store: Option<Arc<dyn KeyValueStore>>,
    prompt: Option<Arc<dyn SecretPrompt>>,
    timeout: Duration,
    extra_sources: Vec<Box<dyn ConfigSource>>,
}

impl ResolverBuilder {
    /// Adds markup hints. Hints added later win on conflicting keys.
    pub fn with_hints(mut self, hints: MarkupHints) -> Self {
        self.hints = std::mem::take(&mut self.hints).merge(hints);
        self
    }

    pub fn with_fetcher(mut self, fetcher: Arc<dyn Fetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    /// Client-local storage, consulted only on development hosts.
    pub fn with_store(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_prompt(mut self, prompt: Arc<dyn SecretPrompt>) -> Self {
        self.prompt = Some(prompt);
        self
    }

    /// Timeout applied to each network request.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Adds a source probed after the built-in ones and before the defaults.
    pub fn with_source(mut self, source: Box<dyn ConfigSource>) -> Self {
        self.extra_sources.push(source);
        self
    }

    pub fn build(self) -> Resolver {
        let hints = Arc::new(self.hints);
        let mut sources: Vec<Box<dyn ConfigSource>> =
            vec![Box::new(MarkupSource::new(hints.clone()))];

        if let Some(fetcher) = &self.fetcher {
            let endpoint = if self.host.is_static_hosting() {
                EndpointSource::static_assets(fetcher.clone(), self.timeout)
            } else {
                EndpointSource::same_origin(fetcher.clone(), self.timeout)
            };
            sources.push(Box::new(endpoint));
        }
        if let Some(store) = &self.store {
            sources.push(Box::new(LocalCacheSource::new(store.clone(), self.host.clone())));
        }
        sources.extend(self.extra_sources);
        sources.push(Box::new(DefaultsSource::new(self.host.clone())));

        Resolver {
            host: self.host,
            hints,
            sources,
            fetcher: self.fetcher,
            store: self.store,
            prompt: self.prompt,
            timeout: self.timeout,
        }
    }
}

use std::collections::HashMap;
use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tempfile::TempDir;

use checkin_config::config::{
    ConfigError, Key, MarkupHints, Resolver, SecretKey, SecureStore, Warning, CACHE_KEY,
};
use checkin_config::net::{Credentials, Fetcher, Request, Response, StaticDirFetcher};
use checkin_config::prompt::SecretPrompt;
use checkin_config::storage::{KeyValueStore, MemoryStore};
use checkin_config::{AppContext, AttendanceReporter, CheckIn, Submission};

const WEBHOOK: &str = "https://script.google.com/macros/s/AKfycbx/exec";
const PLACEHOLDER_WEBHOOK: &str = "https://script.google.com/macros/s/YOUR_SCRIPT_ID/exec";

#[derive(Default)]
struct Routes {
    responses: HashMap<String, Response>,
    seen: Mutex<Vec<Request>>,
}

impl Routes {
    fn with(mut self, path: &str, body: Value) -> Self {
        self.responses
            .insert(path.to_string(), Response::new(200, body.to_string()));
        self
    }

    fn requested(&self, path: &str) -> Option<Request> {
        self.seen
            .lock()
            .unwrap()
            .iter()
            .find(|request| request.url == path)
            .cloned()
    }
}

#[async_trait]
impl Fetcher for Routes {
    async fn fetch(&self, request: Request) -> Result<Response, ConfigError> {
        self.seen.lock().unwrap().push(request.clone());
        Ok(self
            .responses
            .get(&request.url)
            .cloned()
            .unwrap_or_else(|| Response::new(404, "")))
    }
}

/// Never answers.
struct Stalled;

#[async_trait]
impl Fetcher for Stalled {
    async fn fetch(&self, _request: Request) -> Result<Response, ConfigError> {
        tokio::time::sleep(Duration::from_secs(60)).await;
        Ok(Response::new(200, "{}"))
    }
}

struct CountingPrompt {
    answer: Option<String>,
    calls: AtomicUsize,
}

impl CountingPrompt {
    fn answering(answer: Option<&str>) -> Arc<Self> {
        Arc::new(Self {
            answer: answer.map(str::to_string),
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SecretPrompt for CountingPrompt {
    async fn prompt_for_secret(&self, _key: SecretKey, _message: &str) -> Option<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.answer.clone()
    }
}

#[tokio::test]
async fn every_key_is_defined_and_unknown_keys_are_dropped() {
    let snapshot = Resolver::builder("events.example.org")
        .with_hints(
            MarkupHints::new()
                .with_public("APP_NAME", "Spring Gala Check-in")
                .with_public("NOT_A_REAL_KEY", "ignored"),
        )
        .build()
        .resolve()
        .await;

    let public = snapshot.public_view();
    assert_eq!(public.len(), Key::ALL.len());
    for key in Key::ALL {
        assert!(!snapshot.get(*key).is_null(), "{} has no value", key.name());
    }
    assert!(!public.contains_key("NOT_A_REAL_KEY"));
    assert_eq!(snapshot.source(), "markup");
    assert_eq!(public["APP_NAME"], json!("Spring Gala Check-in"));
}

#[tokio::test]
async fn values_are_coerced_by_declared_kind() {
    let snapshot = Resolver::builder("events.example.org")
        .with_hints(
            MarkupHints::new()
                .with_public("QR_CODE_SIZE", "256")
                .with_public("PRIMARY_COLOR", "red")
                .with_public("ENABLE_QR_GENERATION", "FALSE"),
        )
        .build()
        .resolve()
        .await;

    assert_eq!(snapshot.get(Key::QrCodeSize), &json!(256));
    assert_eq!(snapshot.get(Key::PrimaryColor), &json!("#000000"));
    assert_eq!(snapshot.get(Key::EnableQrGeneration), &json!(false));
}

#[tokio::test]
async fn qr_size_range_boundaries() {
    for (size, warned) in [(127, true), (128, false), (1024, false), (1025, true)] {
        let snapshot = Resolver::builder("events.example.org")
            .with_hints(MarkupHints::new().with_public("QR_CODE_SIZE", size))
            .build()
            .resolve()
            .await;

        let out_of_range = snapshot
            .warnings()
            .iter()
            .any(|w| matches!(w, Warning::OutOfRange { key: Key::QrCodeSize, .. }));
        assert_eq!(out_of_range, warned, "QR_CODE_SIZE = {size}");
        assert_eq!(snapshot.get(Key::QrCodeSize), &json!(size));
    }
}

#[tokio::test]
async fn resolution_is_deterministic() {
    let resolver = Resolver::builder("events.example.org")
        .with_hints(
            MarkupHints::new()
                .with_public("LOG_LEVEL", "warn")
                .with_secure(SecretKey::GoogleSheetId, "1AbC"),
        )
        .build();

    let first = resolver.resolve().await;
    let second = resolver.resolve().await;

    assert_eq!(first, second);
}

#[tokio::test]
async fn placeholder_webhook_triggers_prompt_on_development_host() {
    let prompt = CountingPrompt::answering(Some(WEBHOOK));
    let snapshot = Resolver::builder("localhost")
        .with_hints(
            MarkupHints::new()
                .with_public("FEATURE_GOOGLE_SHEETS", "true")
                .with_secure(SecretKey::GoogleAppsScriptUrl, PLACEHOLDER_WEBHOOK),
        )
        .with_prompt(prompt.clone())
        .build()
        .resolve()
        .await;

    assert_eq!(prompt.calls(), 1);
    assert_eq!(snapshot.webhook_url(), Some(WEBHOOK));
    assert!(snapshot.flag(Key::EnableAttendanceTracking));
    assert!(snapshot.attendance_enabled());
    assert!(!snapshot.warnings().contains(&Warning::WebhookNotConfigured));
}

#[tokio::test]
async fn development_host_without_sheets_feature_is_not_prompted() {
    let prompt = CountingPrompt::answering(Some(WEBHOOK));
    let snapshot = Resolver::builder("localhost")
        .with_prompt(prompt.clone())
        .build()
        .resolve()
        .await;

    assert_eq!(prompt.calls(), 0);
    assert_eq!(snapshot.webhook_url(), None);
}

#[tokio::test]
async fn declined_prompt_disables_attendance_on_static_host() {
    let prompt = CountingPrompt::answering(None);
    let snapshot = Resolver::builder("someone.github.io")
        .with_hints(
            MarkupHints::new()
                .with_public("ENABLE_ATTENDANCE_TRACKING", "true")
                .with_public("FEATURE_GOOGLE_SHEETS", "true"),
        )
        .with_prompt(prompt.clone())
        .build()
        .resolve()
        .await;

    assert_eq!(prompt.calls(), 1);
    assert!(!snapshot.flag(Key::EnableAttendanceTracking));
    assert!(!snapshot.flag(Key::FeatureGoogleSheets));
    assert!(snapshot.warnings().is_empty());
}

#[tokio::test]
async fn missing_webhook_warns_once_and_submission_is_a_no_op() {
    let snapshot = Resolver::builder("events.example.org")
        .with_hints(
            MarkupHints::new()
                .with_public("ENABLE_ATTENDANCE_TRACKING", "true")
                .with_public("FEATURE_GOOGLE_SHEETS", "true")
                .with_secure(SecretKey::GoogleAppsScriptUrl, PLACEHOLDER_WEBHOOK),
        )
        .build()
        .resolve()
        .await;

    let webhook_warnings = snapshot
        .warnings()
        .iter()
        .filter(|w| **w == Warning::WebhookNotConfigured)
        .count();
    assert_eq!(webhook_warnings, 1);

    let fetcher = Arc::new(Routes::default());
    let reporter = AttendanceReporter::new(fetcher.clone(), "tests");
    let check_in = CheckIn::validate(&snapshot, "Grace Hopper", "grace@example.org", None).unwrap();

    assert_eq!(reporter.record(&snapshot, &check_in).await, Submission::NotConfigured);
    assert!(fetcher.seen.lock().unwrap().is_empty());
}

#[tokio::test]
async fn markup_hints_win_over_endpoint() {
    let routes = Arc::new(Routes::default().with("/api/config", json!({ "APP_NAME": "Live" })));

    let snapshot = Resolver::builder("events.example.org")
        .with_hints(MarkupHints::new().with_public("APP_NAME", "From markup"))
        .with_fetcher(routes.clone())
        .build()
        .resolve()
        .await;

    assert_eq!(snapshot.source(), "markup");
    assert_eq!(snapshot.text(Key::AppName), Some("From markup"));
    assert!(routes.requested("/api/config").is_none());
}

#[tokio::test]
async fn endpoint_wins_over_cache() {
    let store = Arc::new(MemoryStore::new());
    store
        .set(CACHE_KEY, &json!({ "APP_NAME": "Cached" }).to_string())
        .unwrap();
    let routes = Arc::new(Routes::default().with("/api/config", json!({ "APP_NAME": "Live" })));

    let snapshot = Resolver::builder("localhost")
        .with_fetcher(routes)
        .with_store(store)
        .build()
        .resolve()
        .await;

    assert_eq!(snapshot.source(), "endpoint");
    assert_eq!(snapshot.text(Key::AppName), Some("Live"));
}

#[tokio::test]
async fn static_host_reads_published_assets() {
    let routes = Arc::new(
        Routes::default()
            .with("/api/config", json!({ "APP_NAME": "Not on static hosting" }))
            .with("/config.production.json", json!({ "APP_NAME": "Published" })),
    );

    let snapshot = Resolver::builder("someone.github.io")
        .with_fetcher(routes.clone())
        .build()
        .resolve()
        .await;

    assert_eq!(snapshot.source(), "static-assets");
    assert_eq!(snapshot.text(Key::AppName), Some("Published"));
    assert!(routes.requested("/api/config").is_none());
}

#[tokio::test]
async fn local_cache_is_only_used_on_development_hosts() {
    let store = Arc::new(MemoryStore::new());
    store
        .set(CACHE_KEY, &json!({ "APP_NAME": "Cached" }).to_string())
        .unwrap();

    let dev = Resolver::builder("localhost")
        .with_store(store.clone())
        .build()
        .resolve()
        .await;
    let prod = Resolver::builder("events.example.org")
        .with_store(store)
        .build()
        .resolve()
        .await;

    assert_eq!(dev.source(), "local-cache");
    assert_eq!(dev.text(Key::AppName), Some("Cached"));
    assert_eq!(prod.source(), "defaults");
    assert_eq!(prod.text(Key::AppName), Some("MTC Event Check-In QR Tool"));
}

#[tokio::test]
async fn cached_secrets_are_restored_on_development_hosts() {
    let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
    SecureStore::new(store.clone()).set(SecretKey::GoogleAppsScriptUrl, WEBHOOK);

    let snapshot = Resolver::builder("192.168.1.20:8080")
        .with_store(store)
        .build()
        .resolve()
        .await;

    assert_eq!(snapshot.webhook_url(), Some(WEBHOOK));
}

#[tokio::test]
async fn production_host_fetches_secure_config_with_credentials() {
    let routes = Arc::new(
        Routes::default()
            .with("/api/config", json!({ "APP_NAME": "Live" }))
            .with(
                "/api/secure-config",
                json!({ "GOOGLE_APPS_SCRIPT_URL": WEBHOOK, "SOMETHING_ELSE": "x" }),
            ),
    );

    let snapshot = Resolver::builder("events.example.org")
        .with_fetcher(routes.clone())
        .build()
        .resolve()
        .await;

    assert_eq!(snapshot.webhook_url(), Some(WEBHOOK));
    assert!(snapshot.has_sensitive_config());
    let request = routes.requested("/api/secure-config").unwrap();
    assert_eq!(request.credentials, Credentials::SameOrigin);
}

#[tokio::test]
async fn stalled_sources_fall_back_to_defaults() {
    let resolver = Resolver::builder("events.example.org")
        .with_hints(MarkupHints::new().with_secure(SecretKey::GoogleAppsScriptUrl, WEBHOOK))
        .with_fetcher(Arc::new(Stalled))
        .build();

    let snapshot = resolver.resolve_within(Duration::from_millis(50)).await;

    assert_eq!(snapshot.source(), "defaults");
    assert_eq!(snapshot.get(Key::QrCodeSize), &json!(256));
    assert_eq!(snapshot.webhook_url(), Some(WEBHOOK));
}

/// Answers only after the operator has taken their time.
struct SlowPrompt;

#[async_trait]
impl SecretPrompt for SlowPrompt {
    async fn prompt_for_secret(&self, _key: SecretKey, _message: &str) -> Option<String> {
        tokio::time::sleep(Duration::from_millis(200)).await;
        Some(WEBHOOK.to_string())
    }
}

#[tokio::test]
async fn resolution_deadline_does_not_cut_the_prompt_short() {
    let resolver = Resolver::builder("someone.github.io")
        .with_hints(
            MarkupHints::new()
                .with_public("APP_NAME", "Gala")
                .with_public("ENABLE_ATTENDANCE_TRACKING", "true")
                .with_public("FEATURE_GOOGLE_SHEETS", "true"),
        )
        .with_prompt(Arc::new(SlowPrompt))
        .build();
    let ctx = AppContext::new(resolver.host().clone());

    let snapshot = ctx
        .initialize_within(&resolver, Duration::from_millis(50))
        .await
        .unwrap();

    assert_eq!(snapshot.source(), "markup");
    assert_eq!(snapshot.text(Key::AppName), Some("Gala"));
    assert_eq!(snapshot.webhook_url(), Some(WEBHOOK));
    assert!(snapshot.flag(Key::EnableAttendanceTracking));
    assert!(snapshot.attendance_enabled());
}

#[tokio::test]
async fn secrets_never_leak_into_public_output() {
    let snapshot = Resolver::builder("events.example.org")
        .with_hints(
            MarkupHints::new()
                .with_secure(SecretKey::GoogleAppsScriptUrl, WEBHOOK)
                .with_secure(SecretKey::ApiKey, "sk-live-123"),
        )
        .build()
        .resolve()
        .await;

    let public = serde_json::to_string(&snapshot.public_view()).unwrap();
    let debug = format!("{snapshot:?}");
    for secret in [WEBHOOK, "sk-live-123"] {
        assert!(!public.contains(secret));
        assert!(!debug.contains(secret));
    }
    assert_eq!(snapshot.get_or("API_KEY", json!("")), json!("sk-live-123"));
}

#[tokio::test]
async fn deployed_site_directory() {
    let site = TempDir::new().unwrap();
    fs::write(
        site.path().join("config.json"),
        r#"{ "APP_NAME": "From disk", "QR_CODE_SIZE": "300" }"#,
    )
    .unwrap();
    let page = format!(
        r#"<html><head>
<meta name="secure-google_apps_script_url" content="{WEBHOOK}">
</head></html>"#
    );

    let snapshot = Resolver::builder("events.example.org")
        .with_hints(MarkupHints::parse_html(&page))
        .with_fetcher(Arc::new(StaticDirFetcher::new(site.path())))
        .build()
        .resolve()
        .await;

    assert_eq!(snapshot.source(), "endpoint");
    assert_eq!(snapshot.text(Key::AppName), Some("From disk"));
    assert_eq!(snapshot.integer(Key::QrCodeSize), Some(300));
    assert_eq!(snapshot.webhook_url(), Some(WEBHOOK));
}

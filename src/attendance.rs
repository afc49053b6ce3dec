//! Attendance submission to the spreadsheet webhook.
//!
//! Records are posted fire-and-forget: the request is opaque, its response
//! is never read, and it counts as delivered once dispatched without a
//! transport error. There are no retries.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::checkin::CheckIn;
use crate::config::{ConfigSnapshot, Key, DEFAULT_PROBE_TIMEOUT};
use crate::net::{fetch_with_timeout, Fetcher, Mode, Request};

/// Public service used for the best-effort client IP lookup.
pub const IP_LOOKUP_URL: &str = "https://api.ipify.org?format=json";

pub const IP_LOOKUP_TIMEOUT: Duration = Duration::from_secs(3);

/// The flat record sent to the webhook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecord {
    pub name: String,
    pub email: String,
    pub event: String,
    pub qr_generated: bool,
    /// ISO 8601, UTC, millisecond precision.
    pub timestamp: String,
    pub user_agent: String,
    pub ip_address: String,
}

impl AttendanceRecord {
    pub fn new(
        config: &ConfigSnapshot,
        check_in: &CheckIn,
        user_agent: &str,
        ip_address: &str,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            name: check_in.name().to_string(),
            email: check_in.email().to_string(),
            event: check_in.event_name(config).to_string(),
            qr_generated: true,
            timestamp: at.to_rfc3339_opts(SecondsFormat::Millis, true),
            user_agent: user_agent.to_string(),
            ip_address: ip_address.to_string(),
        }
    }
}

/// What happened to one submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    /// Attendance tracking or the sheets feature is off.
    Disabled,
    /// Tracking is on but no real webhook URL is configured.
    NotConfigured,
    /// Another submission is still being sent.
    InFlight,
    Dispatched(AttendanceRecord),
    Failed(String),
}

#[derive(Deserialize)]
struct IpLookup {
    #[serde(default)]
    ip: String,
}

/// Sends attendance records for a page.
pub struct AttendanceReporter {
    fetcher: Arc<dyn Fetcher>,
    user_agent: String,
    lookup_ip: bool,
    in_flight: AtomicBool,
    dispatched: AtomicU64,
}

impl AttendanceReporter {
    pub fn new(fetcher: Arc<dyn Fetcher>, user_agent: impl Into<String>) -> Self {
        Self {
            fetcher,
            user_agent: user_agent.into(),
            lookup_ip: true,
            in_flight: AtomicBool::new(false),
            dispatched: AtomicU64::new(0),
        }
    }

    /// Turns the best-effort IP lookup on or off.
    pub fn with_ip_lookup(mut self, enabled: bool) -> Self {
        self.lookup_ip = enabled;
        self
    }

    /// Number of records dispatched so far.
    pub fn dispatched_count(&self) -> u64 {
        self.dispatched.load(Ordering::Relaxed)
    }

    /// Records attendance for `check_in` if the configuration allows it.
    pub async fn record(&self, config: &ConfigSnapshot, check_in: &CheckIn) -> Submission {
        if !config.flag(Key::EnableAttendanceTracking) || !config.flag(Key::FeatureGoogleSheets) {
            debug!("attendance tracking is disabled in configuration");
            return Submission::Disabled;
        }
        let Some(url) = config.webhook_url() else {
            warn!("attendance webhook not configured; skipping submission");
            return Submission::NotConfigured;
        };

        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("attendance already being recorded; skipping duplicate");
            return Submission::InFlight;
        }
        let _guard = InFlightGuard(&self.in_flight);

        let ip_address = if self.lookup_ip {
            self.lookup_ip_address().await
        } else {
            String::new()
        };
        let record =
            AttendanceRecord::new(config, check_in, &self.user_agent, &ip_address, Utc::now());

        let body = match serde_json::to_string(&record) {
            Ok(body) => body,
            Err(e) => return Submission::Failed(e.to_string()),
        };
        let request = Request::post_json(url, body).with_mode(Mode::NoCors);
        let timeout = config
            .integer(Key::GoogleRequestTimeout)
            .and_then(|ms| u64::try_from(ms).ok())
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_PROBE_TIMEOUT);

        debug!(event = %record.event, "recording attendance");
        match fetch_with_timeout(self.fetcher.as_ref(), request, timeout).await {
            Ok(_) => {
                self.dispatched.fetch_add(1, Ordering::Relaxed);
                info!(event = %record.event, "attendance recorded");
                Submission::Dispatched(record)
            }
            Err(e) => {
                warn!(error = %e, "failed to record attendance");
                Submission::Failed(e.to_string())
            }
        }
    }

    async fn lookup_ip_address(&self) -> String {
        let request = Request::get(IP_LOOKUP_URL);
        let lookup = fetch_with_timeout(self.fetcher.as_ref(), request, IP_LOOKUP_TIMEOUT).await;
        let response = match lookup {
            Ok(response) if response.is_success() => response,
            Ok(response) => {
                debug!(status = response.status, "IP lookup unavailable");
                return String::new();
            }
            Err(e) => {
                debug!(error = %e, "IP lookup failed");
                return String::new();
            }
        };
        response
            .json::<IpLookup>(IP_LOOKUP_URL)
            .map(|lookup| lookup.ip)
            .unwrap_or_default()
    }
}

struct InFlightGuard<'a>(&'a AtomicBool);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

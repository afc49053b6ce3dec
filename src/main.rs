//! Command-line front end for the check-in configuration resolver.
//!
//! Resolves the configuration a deployed site would see for a given host,
//! and dry-runs a check-in against it.

use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use serde_json::{json, Value};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use checkin_config::config::{
    load_hints_file, save_local_config, schema, Host, MarkupHints, Resolver, SecretKey,
    DEFAULT_RESOLVE_DEADLINE,
};
use checkin_config::net::StaticDirFetcher;
use checkin_config::prompt::SecretPrompt;
use checkin_config::storage::FileStore;
use checkin_config::{AppContext, AttendanceRecord, ConfigSnapshot, QrOptions};

/// Event check-in configuration tool
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Resolve and print the effective configuration
    Resolve(ResolveArgs),

    /// Validate a check-in and print what would be encoded and recorded
    Checkin {
        #[command(flatten)]
        resolve: ResolveArgs,

        /// Attendee name
        #[arg(long)]
        name: String,

        /// Attendee email
        #[arg(long)]
        email: String,

        /// Event name (defaults to DEFAULT_EVENT_NAME)
        #[arg(long)]
        event: Option<String>,
    },

    /// List the recognised public keys with their kinds and defaults
    Keys {
        /// Host the defaults are computed for
        #[arg(long, default_value = "localhost")]
        host: String,
    },
}

#[derive(Args, Debug)]
struct ResolveArgs {
    /// Host name the page is served from
    #[arg(long, default_value = "localhost")]
    host: String,

    /// Deployed site directory served for the endpoint probes
    #[arg(long)]
    site: Option<PathBuf>,

    /// Page inside the site whose meta tags carry hints
    #[arg(long, default_value = "index.html")]
    page: String,

    /// TOML file with additional hints
    #[arg(long)]
    hints: Option<PathBuf>,

    /// JSON file used as client-local storage
    #[arg(long)]
    cache: Option<PathBuf>,

    /// Write the resolved public configuration into the cache
    #[arg(long, requires = "cache")]
    save_cache: bool,

    /// Ask on the terminal for the webhook when it is missing
    #[arg(short, long)]
    interactive: bool,

    /// Overall resolution deadline in milliseconds
    #[arg(long)]
    deadline_ms: Option<u64>,
}

/// Reads secrets from standard input.
///
/// The line is read on a blocking thread and awaited without a deadline.
struct StdinPrompt;

#[async_trait]
impl SecretPrompt for StdinPrompt {
    async fn prompt_for_secret(&self, key: SecretKey, message: &str) -> Option<String> {
        let mut stderr = tokio::io::stderr();
        let banner = format!("{message}\n{}> ", key.name());
        stderr.write_all(banner.as_bytes()).await.ok()?;
        stderr.flush().await.ok()?;

        let (read, line) = tokio::task::spawn_blocking(|| {
            let mut line = String::new();
            std::io::stdin()
                .lock()
                .read_line(&mut line)
                .map(|read| (read, line))
        })
        .await
        .ok()?
        .ok()?;
        (read > 0).then(|| line.trim().to_string())
    }
}

async fn resolve(args: &ResolveArgs) -> Result<AppContext> {
    let host = Host::new(&args.host);
    let mut builder = Resolver::builder(host.clone());

    if let Some(site) = &args.site {
        let page = site.join(&args.page);
        match tokio::fs::read_to_string(&page).await {
            Ok(html) => builder = builder.with_hints(MarkupHints::parse_html(&html)),
            Err(e) => debug!(page = %page.display(), error = %e, "no page to read hints from"),
        }
        builder = builder.with_fetcher(Arc::new(StaticDirFetcher::new(site)));
    }
    if let Some(path) = &args.hints {
        if let Some(hints) = load_hints_file(path, true)? {
            builder = builder.with_hints(hints);
        }
    }
    let store = args.cache.as_ref().map(|path| Arc::new(FileStore::new(path)));
    if let Some(store) = &store {
        builder = builder.with_store(store.clone());
    }
    if args.interactive {
        builder = builder.with_prompt(Arc::new(StdinPrompt));
    }

    let resolver = builder.build();
    info!(host = %host, sources = ?resolver.source_names(), "resolving configuration");

    let deadline = args
        .deadline_ms
        .map(Duration::from_millis)
        .unwrap_or(DEFAULT_RESOLVE_DEADLINE);
    let ctx = AppContext::new(host.clone());
    let snapshot = ctx.initialize_within(&resolver, deadline).await?;

    if args.save_cache {
        if let Some(store) = &store {
            save_local_config(&**store, &host, &snapshot.public_view())
                .context("failed to save configuration cache")?;
            info!(path = %store.path().display(), "configuration cached");
        }
    }
    Ok(ctx)
}

fn resolved(ctx: &AppContext) -> Result<&ConfigSnapshot> {
    ctx.snapshot().context("configuration was not resolved")
}

fn snapshot_report(snapshot: &ConfigSnapshot) -> Value {
    let warnings: Vec<String> = snapshot.warnings().iter().map(ToString::to_string).collect();
    json!({
        "host": snapshot.host().name(),
        "source": snapshot.source(),
        "config": snapshot.public_view(),
        "sensitive_config": snapshot.has_sensitive_config(),
        "attendance_enabled": snapshot.attendance_enabled(),
        "warnings": warnings,
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Resolve(args) => {
            let ctx = resolve(&args).await?;
            let snapshot = resolved(&ctx)?;
            println!("{}", serde_json::to_string_pretty(&snapshot_report(snapshot))?);
        }
        Command::Checkin {
            resolve: args,
            name,
            email,
            event,
        } => {
            let ctx = resolve(&args).await?;
            let snapshot = resolved(&ctx)?;
            let check_in = ctx.check_in(&name, &email, event.as_deref())?;
            let qr = QrOptions::for_check_in(snapshot, &check_in);

            let attendance = snapshot.attendance_enabled().then(|| {
                let user_agent = concat!("qr-checkin/", env!("CARGO_PKG_VERSION"));
                AttendanceRecord::new(snapshot, &check_in, user_agent, "", Utc::now())
            });

            let report = json!({
                "qr": {
                    "text": qr.text,
                    "size": qr.size,
                    "color_dark": qr.color_dark,
                    "color_light": qr.color_light,
                    "correction_level": format!("{:?}", qr.correction),
                },
                "event": check_in.event_name(snapshot),
                "attendance": attendance,
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Keys { host } => {
            let host = Host::new(host);
            for entry in schema(&host) {
                let kind = format!("{:?}", entry.kind);
                println!("{:<32} {:<8} {}", entry.key.name(), kind, entry.default);
            }
        }
    }

    Ok(())
}

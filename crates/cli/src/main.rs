//! notifeed command line entry point.
//!
//! Loads the notification window once, prints it as JSON lines and, when a
//! poll interval is configured, keeps refreshing until interrupted.

mod render;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use notifeed_client::XrpcEventStore;
use notifeed_common::{AppResult, Config, FileSeenStore, LogFormat, get_metrics};
use notifeed_core::{NotificationSession, OperationOutcome, SessionConfig, SessionPhase};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::render::render_snapshot;

/// Print the notification window as JSON lines.
///
/// Configuration is read from `config/` and `NOTIFEED__*` environment
/// variables unless `--config` names a file.
#[derive(Parser, Debug)]
#[command(name = "notifeed", version, about)]
struct Cli {
    /// Configuration file to load instead of `config/`
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// Mark notifications as seen after each pass
    #[arg(long)]
    mark_seen: bool,

    /// Exit after the first pass even when a poll interval is configured
    #[arg(long)]
    once: bool,
}

fn init_tracing(format: LogFormat) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| "notifeed=debug".into());
    let registry = tracing_subscriber::registry().with(filter);

    // Logs go to stderr; stdout carries the JSON lines.
    match format {
        LogFormat::Pretty => registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init(),
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init(),
    }
}

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received SIGINT, shutting down...");
        },
        () = terminate => {
            info!("Received SIGTERM, shutting down...");
        },
    }
}

fn print_groups(session: &NotificationSession, preview_authors: usize) {
    let snapshot = session.snapshot();
    match render_snapshot(&snapshot, preview_authors) {
        Ok(lines) => {
            for line in lines {
                println!("{line}");
            }
        }
        Err(e) => error!(error = %e, "Failed to render notification groups"),
    }
    info!(
        groups = snapshot.groups.len(),
        unread = snapshot.unread_count,
        has_more = snapshot.has_more_notifications,
        "Notification window"
    );
}

async fn mark_seen(session: &NotificationSession) {
    if let Err(e) = session.mark_notifications_as_seen().await {
        warn!(error = %e, "Mark seen failed; will retry on the next pass");
    }
}

/// One polling pass: retry the initial load while nothing is loaded,
/// refresh otherwise.
async fn sync_window(session: &NotificationSession) -> AppResult<OperationOutcome> {
    if session.snapshot().phase == SessionPhase::Empty {
        session.load_notifications().await
    } else {
        session.refresh_notifications().await
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::load()?,
    };

    init_tracing(config.logging.format);
    info!(service = %config.event_store.service_url, "Starting notifeed...");

    let store = Arc::new(XrpcEventStore::new(&config.event_store)?);
    let seen_store = Arc::new(FileSeenStore::new(config.state.last_seen_path.clone()));
    let session_config = SessionConfig {
        prefetch_threshold: config.feed.prefetch_threshold,
    };
    let session = NotificationSession::restore(store, seen_store, session_config).await?;
    let preview_authors = config.feed.follow_preview_authors;
    let poll_interval = config.feed.poll_interval_secs.filter(|_| !cli.once);

    match session.load_notifications().await {
        Ok(_) => {
            print_groups(&session, preview_authors);
            if cli.mark_seen {
                mark_seen(&session).await;
            }
        }
        // Polling retries the initial load on the next tick
        Err(e) if poll_interval.is_some() => {
            warn!(error = %e, "Initial load failed; retrying on the next poll");
        }
        Err(e) => return Err(e.into()),
    }

    let Some(interval_secs) = poll_interval else {
        info!(metrics = ?get_metrics().snapshot(), "Done");
        return Ok(());
    };

    info!(interval_secs, "Polling for notifications");
    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs.max(1)));
    // The first tick completes immediately
    interval.tick().await;

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                match sync_window(&session).await {
                    Ok(OperationOutcome::Applied) => {
                        print_groups(&session, preview_authors);
                        if cli.mark_seen {
                            mark_seen(&session).await;
                        }
                    }
                    Ok(_) => {}
                    Err(e) => warn!(error = %e, "Poll failed; keeping previous window"),
                }
            }
            () = &mut shutdown => break,
        }
    }

    info!(metrics = ?get_metrics().snapshot(), "Shutdown complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use notifeed_common::AppError;
    use notifeed_core::{Cursor, EventStore, NotificationPage, Post};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Fails the first page request, then serves empty pages.
    #[derive(Default)]
    struct FlakyStore {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl EventStore for FlakyStore {
        async fn fetch_notifications(&self, _: Option<&Cursor>) -> AppResult<NotificationPage> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                return Err(AppError::Timeout);
            }
            Ok(NotificationPage::default())
        }

        async fn resolve_post(&self, uri: &str) -> AppResult<Post> {
            Err(AppError::NotFound(uri.to_string()))
        }

        async fn mark_seen(&self, _: DateTime<Utc>) -> AppResult<()> {
            Ok(())
        }
    }

    #[test]
    fn test_cli_flags() {
        let cli = Cli::try_parse_from(["notifeed", "--mark-seen", "--config", "feed.toml"]).unwrap();
        assert!(cli.mark_seen);
        assert!(!cli.once);
        assert_eq!(cli.config, Some(PathBuf::from("feed.toml")));

        assert!(Cli::try_parse_from(["notifeed", "--bogus"]).is_err());
    }

    #[tokio::test]
    async fn test_sync_retries_failed_initial_load() {
        let store = Arc::new(FlakyStore::default());
        let session = NotificationSession::new(store.clone(), None);

        assert_eq!(session.load_notifications().await, Err(AppError::Timeout));
        assert_eq!(session.snapshot().phase, SessionPhase::Empty);

        assert_eq!(sync_window(&session).await, Ok(OperationOutcome::Applied));
        assert_eq!(session.snapshot().phase, SessionPhase::Ready);

        // Once ready, a pass refreshes
        assert_eq!(sync_window(&session).await, Ok(OperationOutcome::Applied));
        assert_eq!(store.calls.load(Ordering::SeqCst), 3);
    }
}

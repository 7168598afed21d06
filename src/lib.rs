//! # catalog-dl
//!
//! Concurrent acquisition orchestrator for hierarchical music catalog content.
//!
//! A catalog URL (artist, album, song, playlist, station or music video) is
//! expanded into tracks, each track's best stream variant is chosen from its
//! HLS master playlist, and the tracks are fetched, decrypted, tagged and
//! optionally converted by external tools on a bounded worker pool.
//!
//! ## Design
//!
//! - **Resumable** - an in-memory ledger remembers finished and failed catalog
//!   positions, and files already on disk are never fetched again
//! - **Retry on request** - failed tracks are re-run by a failed-only pass when
//!   the operator agrees
//! - **Pluggable** - the catalog client and every external tool sit behind
//!   traits, so tests and embedders can swap them
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use catalog_dl::{Config, NeverRetry, Orchestrator, RunOptions, SelectAll, Services};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::default();
//!     let services = Services::from_config(&config, Arc::new(SelectAll))?;
//!     let orchestrator = Orchestrator::new(config, services, RunOptions::default());
//!
//!     let urls = vec!["https://music.apple.com/us/album/blue/1440932150".to_string()];
//!     let summary = orchestrator.run_urls(&urls, &NeverRetry).await?;
//!     println!("{summary}");
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Cover art download
pub mod artwork;
/// Catalog API client and URL parsing
pub mod catalog;
/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// Done and failed track positions
pub mod ledger;
/// HLS master playlist parsing
pub mod manifest;
/// Folder and file naming
pub mod naming;
/// Entity procedures and the retry loop
pub mod orchestrator;
/// Counters, issue lists and the run summary
pub mod progress;
/// Stream variant selection
pub mod resolver;
/// Retry logic with exponential backoff
pub mod retry;
/// Bounded worker pool
pub mod scheduler;
/// External tool integration (decrypt, tag, convert)
pub mod tools;
/// Core catalog types
pub mod types;

// Re-export commonly used types
pub use catalog::{CatalogClient, HttpCatalogClient, parse_catalog_url};
pub use config::Config;
pub use error::{Error, Result, Severity, TrackError};
pub use ledger::Ledger;
pub use orchestrator::{
    NeverRetry, Orchestrator, RetryPrompt, RunOptions, SelectAll, Selector, Services,
    parse_selection,
};
pub use progress::{Counters, Issues, RunStats, RunSummary};
pub use tools::{Converter, Decryptor, Tagger, ToolSet};
pub use types::{EntityKind, EntityRef, QualityRequest, RetryMode};

/// Run `work` until it finishes or a termination signal arrives.
///
/// Returns `None` when a signal interrupted the work. Tracks already written
/// stay on disk and are recognised by the next run.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
pub async fn run_until_shutdown<F>(work: F) -> Option<F::Output>
where
    F: std::future::Future,
{
    tokio::select! {
        output = work => Some(output),
        _ = wait_for_signal() => None,
    }
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Signal registration may fail in restricted environments (containers, tests)
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C)");
                }
            }
        }
        (Err(e), _) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for SIGINT only");
            if let Ok(mut sigint) = signal(SignalKind::interrupt()) {
                sigint.recv().await;
                tracing::info!("Received SIGINT signal (Ctrl+C)");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
        (_, Err(e)) => {
            tracing::warn!(error = %e, "Could not register SIGINT handler, waiting for SIGTERM only");
            if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                sigterm.recv().await;
                tracing::info!("Received SIGTERM signal");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}

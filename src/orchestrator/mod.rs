//! Run orchestration split into focused submodules.
//!
//! The [`Orchestrator`] turns catalog URLs into finished files:
//! - [`album`] - Albums and single songs (resolved through their album)
//! - [`playlist`] - Playlists
//! - [`station`] - Stations, both track lists and live streams
//! - [`artist`] - Artist fan-out into albums and music videos
//! - [`music_video`] - Music videos, standalone or inside a collection
//! - [`track`] - The per-track state machine run by the worker pool
//! - [`codec`] - Per-entity codec planning
//! - [`prompt`] - Selection and retry interaction points

mod album;
mod artist;
mod codec;
mod music_video;
mod playlist;
mod prompt;
mod station;
mod track;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;

pub use prompt::{NeverRetry, RetryPrompt, SelectAll, Selector, parse_selection};

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::artwork::write_cover;
use crate::catalog::{CatalogClient, DeviceManifestAgent, HttpCatalogClient, parse_catalog_url};
use crate::config::Config;
use crate::error::Result;
use crate::ledger::Ledger;
use crate::naming::ArtistNames;
use crate::progress::{RunStats, RunSummary};
use crate::scheduler::{BatchJob, run_batch};
use crate::tools::ToolSet;
use crate::types::{EntityKind, EntityRef, QualityRequest, RetryMode, Selection, TrackInfo};
use codec::CodecPlan;
use track::{TagSource, TrackContext, TrackJob};

/// Collaborators of a run
#[derive(Clone)]
pub struct Services {
    /// Catalog metadata and stream lookups
    pub catalog: Arc<dyn CatalogClient>,
    /// Decryptor, tagger and converter
    pub tools: ToolSet,
    /// Track and release selection
    pub selector: Arc<dyn Selector>,
    /// Optional device agent for full-quality manifests
    pub device: Option<DeviceManifestAgent>,
}

impl Services {
    /// Production services: HTTP catalog, discovered tools, configured device agent
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be created
    pub fn from_config(config: &Config, selector: Arc<dyn Selector>) -> Result<Self> {
        Ok(Self {
            catalog: Arc::new(HttpCatalogClient::new(config)?),
            tools: ToolSet::discover(config),
            selector,
            device: DeviceManifestAgent::from_config(&config.catalog),
        })
    }
}

/// Run-scoped state shared with every worker
#[derive(Debug, Default)]
pub struct RunContext {
    /// Counters and issue lists
    pub stats: RunStats,
    /// Done and failed positions
    pub ledger: Ledger,
}

/// Command line choices that steer a run
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RunOptions {
    /// Requested quality
    pub quality: QualityRequest,
    /// An album URL with `?i=` downloads only that song
    pub song_only: bool,
    /// Ask which tracks of each album or playlist to download
    pub select: bool,
    /// Take every release of an artist without asking
    pub artist_all: bool,
}

/// Artist a whole-artist run was started from, passed down to its releases
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct ArtistBinding {
    pub(crate) name: String,
    pub(crate) id: String,
}

/// Drives entity procedures and the retry loop
pub struct Orchestrator {
    config: Arc<Config>,
    services: Services,
    run: Arc<RunContext>,
    options: RunOptions,
}

impl Orchestrator {
    /// Orchestrator with fresh run statistics
    pub fn new(config: Config, services: Services, options: RunOptions) -> Self {
        Self::with_stats(config, services, options, RunStats::new())
    }

    /// Orchestrator reporting into `stats`, e.g. one created with a progress channel
    pub fn with_stats(
        config: Config,
        services: Services,
        options: RunOptions,
        stats: RunStats,
    ) -> Self {
        Self {
            config: Arc::new(config),
            services,
            run: Arc::new(RunContext {
                stats,
                ledger: Ledger::new(),
            }),
            options,
        }
    }

    /// Run statistics
    pub fn stats(&self) -> &RunStats {
        &self.run.stats
    }

    /// Done and failed positions
    pub fn ledger(&self) -> &Ledger {
        &self.run.ledger
    }

    /// Process every URL, then keep retrying failures while `prompt` agrees
    ///
    /// Another pass is offered when the last one raised the error counter or
    /// left an entity failed. Retry passes only revisit failed positions.
    /// Failed sets are cleared when the run ends.
    ///
    /// # Errors
    /// Returns the first error that invalidates the whole run (rejected
    /// authorization); every other failure is recorded and skipped.
    pub async fn run_urls(&self, urls: &[String], prompt: &dyn RetryPrompt) -> Result<RunSummary> {
        let stats = &self.run.stats;
        let mut mode = RetryMode::Full;
        loop {
            let errors_before = stats.counters().error;
            stats.clear_issues();

            for url in urls {
                if let Err(e) = self.handle_url(url, mode).await {
                    if e.aborts_run() {
                        tracing::error!(error = %e, "aborting run");
                        self.run.ledger.clear_all_failed();
                        return Err(e);
                    }
                }
            }

            let errors_grew = stats.counters().error > errors_before;
            if !errors_grew && !self.run.ledger.has_failed_entities() {
                break;
            }
            if !prompt.confirm_retry(&stats.summary(), &stats.issues()).await {
                break;
            }
            tracing::info!("retrying failed tracks");
            mode = RetryMode::FailedOnly;
        }

        self.run.ledger.clear_all_failed();
        let summary = stats.summary();
        tracing::info!(
            total = summary.counters.total,
            success = summary.counters.success,
            errors = summary.counters.error,
            warnings = summary.counters.warnings(),
            "run finished"
        );
        Ok(summary)
    }

    /// Process one catalog URL
    ///
    /// An entity failure is recorded (error line, failed entity) before it is
    /// returned.
    pub async fn handle_url(&self, url: &str, mode: RetryMode) -> Result<()> {
        let entity = match parse_catalog_url(url) {
            Ok(entity) => entity,
            Err(e) => {
                tracing::warn!(url, error = %e, "skipping URL");
                self.run.stats.add_error(e.to_string());
                return Err(e);
            }
        };
        tracing::info!(kind = %entity.kind, id = %entity.id, storefront = %entity.storefront, "processing");

        let result = match entity.kind {
            EntityKind::Artist => self.rip_artist(&entity, mode).await,
            EntityKind::Album => {
                let single = entity.song_id.as_deref().filter(|_| self.options.song_only);
                self.rip_album(&entity.storefront, &entity.id, single, None, mode)
                    .await
            }
            EntityKind::Song => self.rip_song(&entity, None, mode).await,
            EntityKind::Playlist => self.rip_playlist(&entity, mode).await,
            EntityKind::Station => self.rip_station(&entity, mode).await,
            EntityKind::MusicVideo => self.rip_music_video(&entity, None).await,
        };
        self.record_entity_result(&entity, result)
    }

    /// Dispatch a release of an artist; other kinds are ignored
    async fn handle_child(
        &self,
        entity: &EntityRef,
        binding: &ArtistBinding,
        mode: RetryMode,
    ) -> Result<()> {
        let result = match entity.kind {
            EntityKind::Album => {
                self.rip_album(&entity.storefront, &entity.id, None, Some(binding), mode)
                    .await
            }
            EntityKind::MusicVideo => self.rip_music_video(entity, Some(binding)).await,
            other => {
                tracing::debug!(kind = %other, id = %entity.id, "ignoring artist release");
                Ok(())
            }
        };
        self.record_entity_result(entity, result)
    }

    fn record_entity_result(&self, entity: &EntityRef, result: Result<()>) -> Result<()> {
        match result {
            Ok(()) => {
                self.run.ledger.clear_entity_failed(&entity.id);
                Ok(())
            }
            Err(e) => {
                tracing::error!(
                    kind = %entity.kind,
                    id = %entity.id,
                    error = %e,
                    error_code = e.error_code(),
                    "entity failed"
                );
                self.run
                    .stats
                    .add_error(format!("{} {} failed: {e}", entity.kind, entity.id));
                self.run.ledger.mark_entity_failed(&entity.id);
                Err(e)
            }
        }
    }

    fn artist_names(
        &self,
        binding: Option<&ArtistBinding>,
        artist_name: &str,
        artist_id: &str,
    ) -> ArtistNames {
        match binding {
            Some(binding) => ArtistNames {
                artist_name: artist_name.to_string(),
                url_artist_name: binding.name.clone(),
                artist_id: binding.id.clone(),
            },
            None => ArtistNames::single(artist_name, artist_id),
        }
    }

    /// Write a cover into `dir`; failures are logged and yield None
    async fn save_cover(&self, dir: &Path, name: &str, url: &str) -> Option<PathBuf> {
        if url.is_empty() {
            return None;
        }
        match write_cover(
            self.services.catalog.as_ref(),
            dir,
            name,
            url,
            &self.config.artwork,
        )
        .await
        {
            Ok(path) => Some(path),
            Err(e) => {
                tracing::warn!(dir = %dir.display(), name, error = %e, "cover download failed");
                None
            }
        }
    }

    /// Work out which tracks of an entity the operator wants
    async fn choose_tracks(
        &self,
        title: &str,
        tracks: &[TrackInfo],
        single: Option<&str>,
        mode: RetryMode,
    ) -> Result<Selection> {
        if let Some(song_id) = single {
            return Ok(Selection::Single(song_id.to_string()));
        }
        if self.options.select && mode == RetryMode::Full && !tracks.is_empty() {
            let items: Vec<String> = tracks
                .iter()
                .enumerate()
                .map(|(i, t)| format!("{:02}. {} - {}", i + 1, t.name, t.artist_name))
                .collect();
            let positions = self.services.selector.select(title, &items).await?;
            return Ok(Selection::Positions(positions));
        }
        Ok(Selection::All)
    }

    /// Positions to submit, counting already-done ones as immediate successes
    fn candidates(
        &self,
        entity_id: &str,
        tracks: &[TrackInfo],
        selection: &Selection,
        mode: RetryMode,
    ) -> Vec<usize> {
        let count = tracks.len();
        if let Selection::Single(song_id) = selection {
            return match tracks.iter().position(|t| &t.id == song_id) {
                Some(index) => vec![index + 1],
                None => {
                    self.run
                        .stats
                        .add_warning(format!("song {song_id} is not part of {entity_id}"));
                    Vec::new()
                }
            };
        }

        let wanted: BTreeSet<usize> = match (mode, selection) {
            (RetryMode::FailedOnly, _) => {
                let failed = self.run.ledger.failed_positions(entity_id);
                if failed.is_empty() {
                    (1..=count).collect()
                } else {
                    failed.into_iter().collect()
                }
            }
            (RetryMode::Full, Selection::Positions(positions)) => positions
                .iter()
                .copied()
                .filter(|p| (1..=count).contains(p))
                .collect(),
            _ => (1..=count).collect(),
        };

        let mut positions = Vec::new();
        for position in 1..=count {
            if self.run.ledger.is_done(entity_id, position) {
                self.run.stats.inc_total();
                self.run.stats.inc_success();
            } else if wanted.contains(&position) {
                positions.push(position);
            }
        }
        positions
    }

    fn track_context(
        &self,
        entity_id: &str,
        storefront: &str,
        save_dir: PathBuf,
        cover: Option<PathBuf>,
        plan: CodecPlan,
        source: TagSource,
    ) -> TrackContext {
        TrackContext {
            config: Arc::clone(&self.config),
            services: self.services.clone(),
            run: Arc::clone(&self.run),
            entity_id: entity_id.to_string(),
            storefront: storefront.to_string(),
            save_dir,
            cover,
            plan,
            source,
        }
    }

    /// Submit the candidate tracks of an entity to the worker pool and wait
    async fn run_tracks(
        &self,
        ctx: TrackContext,
        tracks: &[TrackInfo],
        selection: &Selection,
        mode: RetryMode,
    ) {
        let positions = self.candidates(&ctx.entity_id, tracks, selection, mode);
        if positions.is_empty() {
            tracing::info!(entity_id = %ctx.entity_id, "nothing left to download");
            return;
        }
        let items: Vec<(usize, TrackInfo)> = positions
            .into_iter()
            .filter_map(|p| tracks.get(p - 1).map(|t| (p, t.clone())))
            .collect();
        tracing::info!(entity_id = %ctx.entity_id, tracks = items.len(), "submitting tracks");

        let ctx = Arc::new(ctx);
        run_batch(
            items,
            self.config.download.concurrency,
            move |job: BatchJob<(usize, TrackInfo)>| {
                let ctx = Arc::clone(&ctx);
                async move {
                    let (position, track) = job.item;
                    track::process_track(
                        &ctx,
                        TrackJob {
                            track,
                            position,
                            sequence: job.sequence,
                            total: job.total,
                        },
                    )
                    .await;
                }
            },
        )
        .await;
    }
}

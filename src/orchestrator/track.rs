//! Per-track state machine
//!
//! A track moves through: existence check, stream resolution, fetch and
//! decrypt, tagging, optional conversion. Whatever happens, the job ends by
//! incrementing exactly one of the success, error, unavailable or not-song
//! counters and updating the ledger for its catalog position.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::codec::{CodecPlan, master_url, resolve_manifest};
use super::{RunContext, Services, music_video};
use crate::artwork::write_cover;
use crate::config::{Config, ConversionConfig};
use crate::error::{Error, Result, Severity, TrackError};
use crate::naming::{song_file_stem, tag_string};
use crate::tools::{ConversionPlan, FetchRequest, StreamKind, TagSet, plan_conversion};
use crate::types::{AlbumInfo, QualityRequest, TrackInfo, TrackKind};

/// Where a track's album-level tags come from
#[derive(Clone, Debug)]
pub(crate) enum TagSource {
    /// Tracks of an album
    Album(Arc<AlbumInfo>),
    /// Tracks of a playlist or station, tagged as a compilation
    Collection {
        /// Playlist or station name
        name: String,
        /// Curator written as album artist
        curator: String,
    },
    /// A music video outside any collection
    Standalone,
}

/// State shared by every track of one entity
pub(crate) struct TrackContext {
    pub(crate) config: Arc<Config>,
    pub(crate) services: Services,
    pub(crate) run: Arc<RunContext>,
    /// Ledger key of the entity
    pub(crate) entity_id: String,
    pub(crate) storefront: String,
    pub(crate) save_dir: PathBuf,
    /// Entity cover, embedded unless a per-track cover replaces it
    pub(crate) cover: Option<PathBuf>,
    pub(crate) plan: CodecPlan,
    pub(crate) source: TagSource,
}

/// One track as handed to a worker
pub(crate) struct TrackJob {
    pub(crate) track: TrackInfo,
    /// 1-based place in the entity's catalog order
    pub(crate) position: usize,
    /// 1-based place in this batch
    pub(crate) sequence: usize,
    /// Jobs in this batch
    pub(crate) total: usize,
}

/// Warning lines collected by a successful job
pub(crate) type Warnings = Vec<String>;

/// Run one track to a terminal outcome
pub(crate) async fn process_track(ctx: &TrackContext, job: TrackJob) {
    let stats = &ctx.run.stats;
    stats.inc_total();

    let track = &job.track;
    let label = format!("[{} - {}]", track.artist_name, track.name);
    let outcome = match track.kind {
        TrackKind::MusicVideo => music_video::download_video(ctx, &job).await,
        TrackKind::Song => download_song(ctx, &job).await,
    };

    match outcome {
        Ok(warnings) => {
            for warning in warnings {
                stats.add_warning(format!("{label} {warning}"));
            }
            stats.inc_success();
            ctx.run.ledger.mark_done(&ctx.entity_id, job.position);
            tracing::info!(track_id = %track.id, position = job.position, "track finished");
        }
        Err(e) => {
            let severity = match &e {
                Error::Track(track_error) => track_error.severity(),
                _ => Severity::Error,
            };
            tracing::warn!(
                track_id = %track.id,
                position = job.position,
                error = %e,
                error_code = e.error_code(),
                "track failed"
            );
            stats.record_failure(severity);
            match severity {
                Severity::Error => stats.add_error(format!("{label} {e}")),
                Severity::Unavailable | Severity::NotSong => {
                    stats.add_warning(format!("{label} {e}"))
                }
            }
            ctx.run.ledger.mark_failed(&ctx.entity_id, job.position);
        }
    }
}

pub(crate) fn download_error(track: &TrackInfo, err: Error) -> Error {
    match err {
        Error::Track(e) => e.into(),
        other => TrackError::Download {
            track_id: track.id.clone(),
            reason: other.to_string(),
        }
        .into(),
    }
}

fn unavailable(track: &TrackInfo, reason: impl Into<String>) -> Error {
    TrackError::VariantUnavailable {
        track_id: track.id.clone(),
        reason: reason.into(),
    }
    .into()
}

/// Whether the track file, or the file conversion replaces it with, exists
pub(crate) async fn already_present(path: &Path, conversion: &ConversionConfig) -> bool {
    if tokio::fs::try_exists(path).await.unwrap_or(false) {
        return true;
    }
    match conversion.replacing_extension() {
        Some(extension) => tokio::fs::try_exists(path.with_extension(extension))
            .await
            .unwrap_or(false),
        None => false,
    }
}

async fn download_song(ctx: &TrackContext, job: &TrackJob) -> Result<Warnings> {
    let config = &ctx.config;
    let track = &job.track;

    let mut legacy = ctx.plan.legacy(&config.download);
    if !legacy && track.enhanced_hls.is_none() {
        if ctx.plan.request == QualityRequest::Atmos {
            return Err(unavailable(track, "Atmos unavailable, fallback not possible"));
        }
        legacy = true;
    }

    let quality = if legacy {
        "256Kbps".to_string()
    } else {
        ctx.plan.quality.clone()
    };
    let tag = tag_string(&config.naming, track.is_master, track.content_rating);
    let stem = song_file_stem(
        &config.naming,
        track,
        job.sequence,
        &quality,
        ctx.plan.label(),
        &tag,
    );
    let path = ctx.save_dir.join(format!("{stem}.m4a"));
    if already_present(&path, &config.conversion).await {
        tracing::info!(track_id = %track.id, path = %path.display(), "already downloaded");
        return Ok(Warnings::new());
    }

    let request = if legacy {
        legacy_request(ctx, track, &path).await?
    } else {
        enhanced_request(ctx, track, &path).await?
    };
    tracing::debug!(track_id = %track.id, kind = request.kind.as_arg(), "fetching");
    ctx.services
        .tools
        .decryptor
        .fetch(&request)
        .await
        .map_err(|e| download_error(track, e))?;

    let mut warnings = Warnings::new();
    tag_song(ctx, job, &path, &mut warnings).await?;
    convert(ctx, &path, &mut warnings).await;
    Ok(warnings)
}

async fn legacy_request(ctx: &TrackContext, track: &TrackInfo, path: &Path) -> Result<FetchRequest> {
    if ctx.config.catalog.media_user_token().is_none() {
        return Err(TrackError::Download {
            track_id: track.id.clone(),
            reason: "AAC-LC download requires a media user token".into(),
        }
        .into());
    }
    let stream_url = ctx
        .services
        .catalog
        .webplayback(&track.id)
        .await
        .map_err(|e| download_error(track, e))?;
    Ok(FetchRequest {
        track_id: track.id.clone(),
        stream_url,
        kind: StreamKind::Legacy,
        destination: path.to_path_buf(),
    })
}

async fn enhanced_request(
    ctx: &TrackContext,
    track: &TrackInfo,
    path: &Path,
) -> Result<FetchRequest> {
    let download = &ctx.config.download;
    let Some(master) = master_url(&ctx.services, track).await else {
        return Err(unavailable(track, "no enhanced manifest"));
    };
    let priority = ctx.plan.priority(download);
    let resolution =
        match resolve_manifest(ctx.services.catalog.as_ref(), &master, download, &priority).await
        {
            Ok(Some(resolution)) => resolution,
            Ok(None) => {
                return Err(unavailable(
                    track,
                    format!("no codec from {} offered", priority.join(", ")),
                ));
            }
            Err(e) => return Err(unavailable(track, format!("manifest extract failed: {e}"))),
        };
    tracing::debug!(
        track_id = %track.id,
        codec = %resolution.variant.codec,
        group = ?resolution.variant.audio_group,
        "variant resolved"
    );
    Ok(FetchRequest {
        track_id: track.id.clone(),
        stream_url: resolution.variant.uri,
        kind: StreamKind::Enhanced,
        destination: path.to_path_buf(),
    })
}

/// Embed cover and artist, then the full metadata
///
/// A failure of the first step counts as an error, of the second as unavailable.
async fn tag_song(
    ctx: &TrackContext,
    job: &TrackJob,
    path: &Path,
    warnings: &mut Warnings,
) -> Result<()> {
    let track = &job.track;
    let artwork = &ctx.config.artwork;
    let tagger = &ctx.services.tools.tagger;

    let per_track_cover = artwork.embed_cover
        && artwork.dl_albumcover_for_playlist
        && matches!(ctx.source, TagSource::Collection { .. })
        && !track.artwork_url.is_empty();
    let own_cover = if per_track_cover {
        match write_cover(
            ctx.services.catalog.as_ref(),
            &ctx.save_dir,
            &track.id,
            &track.artwork_url,
            artwork,
        )
        .await
        {
            Ok(path) => Some(path),
            Err(e) => {
                warnings.push(format!("track cover unavailable: {e}"));
                None
            }
        }
    } else {
        None
    };

    let mut first = TagSet::new();
    first.push("artist", track.artist_name.as_str());
    if artwork.embed_cover {
        if let Some(cover) = own_cover.as_ref().or(ctx.cover.as_ref()) {
            first.push("cover", cover.display().to_string());
        }
    }
    let embedded = tagger.embed_tags(path, &first).await;

    if let Some(own) = &own_cover {
        tokio::fs::remove_file(own)
            .await
            .map_err(|e| TrackError::FileSystem {
                path: own.clone(),
                reason: e.to_string(),
                severity: Severity::Error,
            })?;
    }

    match embedded {
        Ok(()) => {}
        Err(Error::NotSupported(reason)) => {
            warnings.push(format!("tags not written: {reason}"));
            return Ok(());
        }
        Err(e) => {
            return Err(TrackError::TagEmbed {
                track_id: track.id.clone(),
                reason: e.to_string(),
                severity: Severity::Error,
            }
            .into());
        }
    }

    let album = tag_album(ctx, track, warnings).await;
    let tags = song_tags(ctx, job, album.as_deref());
    tagger
        .embed_tags(path, &tags)
        .await
        .map_err(|e| TrackError::TagEmbed {
            track_id: track.id.clone(),
            reason: e.to_string(),
            severity: Severity::Unavailable,
        })?;
    Ok(())
}

/// Album metadata used for tags, if any
async fn tag_album(
    ctx: &TrackContext,
    track: &TrackInfo,
    warnings: &mut Warnings,
) -> Option<Arc<AlbumInfo>> {
    match &ctx.source {
        TagSource::Album(album) => Some(Arc::clone(album)),
        TagSource::Collection { .. } if ctx.config.download.use_song_info_for_playlist => {
            let album_id = track.album_id.as_deref()?;
            match ctx.services.catalog.album(&ctx.storefront, album_id).await {
                Ok(album) => Some(Arc::new(album)),
                Err(e) => {
                    warnings.push(format!("album tags unavailable: {e}"));
                    None
                }
            }
        }
        _ => None,
    }
}

/// Full metadata tag set of a song
pub(crate) fn song_tags(ctx: &TrackContext, job: &TrackJob, album: Option<&AlbumInfo>) -> TagSet {
    let track = &job.track;
    let mut tags = TagSet::new();
    tags.push("title", track.name.as_str())
        .push("artist", track.artist_name.as_str())
        .push("composer", track.composer.as_str())
        .push("genre", track.genre.as_str())
        .push("created", track.release_date.as_str())
        .push("ISRC", track.isrc.as_str())
        .push("rating", track.content_rating.advisory_code().to_string());

    match (album, &ctx.source) {
        (Some(album), _) => {
            tags.push("album", album.name.as_str())
                .push("album_artist", album.artist_name.as_str())
                .push("disk", track.disc_number.to_string())
                .push("track", track.track_number.to_string())
                .push(
                    "tracknum",
                    format!("{}/{}", track.track_number, album.tracks.len()),
                )
                .push("copyright", album.copyright.as_str())
                .push("UPC", album.upc.as_str());
        }
        (None, TagSource::Collection { name, curator }) => {
            tags.push("album", name.as_str())
                .push("album_artist", curator.as_str())
                .push("performer", track.artist_name.as_str())
                .push("disk", "1/1")
                .push("track", job.sequence.to_string())
                .push("tracknum", format!("{}/{}", job.sequence, job.total));
        }
        (None, _) => {
            tags.push("album", track.album_name.as_str())
                .push("disk", track.disc_number.to_string())
                .push("track", track.track_number.to_string());
        }
    }
    tags
}

async fn convert(ctx: &TrackContext, path: &Path, warnings: &mut Warnings) {
    let conversion = &ctx.config.conversion;
    let (format, lossy_to_lossless) = match plan_conversion(conversion, path, ctx.plan.label()) {
        ConversionPlan::Skip(reason) => {
            tracing::debug!(path = %path.display(), reason, "conversion skipped");
            return;
        }
        ConversionPlan::Convert {
            format,
            lossy_to_lossless,
        } => (format, lossy_to_lossless),
    };
    if lossy_to_lossless {
        tracing::warn!(path = %path.display(), format = %format, "converting a lossy source to a lossless format");
    }

    let converter = &ctx.services.tools.converter;
    match converter
        .convert(path, &format, &conversion.extra_args)
        .await
    {
        Ok(output) => {
            tracing::info!(output = %output.display(), converter = converter.name(), "converted");
            if !conversion.keep_original {
                if let Err(e) = tokio::fs::remove_file(path).await {
                    warnings.push(format!("could not remove {}: {e}", path.display()));
                }
            }
        }
        Err(Error::NotSupported(_)) => {
            warnings.push(format!("conversion to {format} skipped: ffmpeg not found"));
        }
        Err(e) => warnings.push(format!("conversion to {format} failed: {e}")),
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::test_helpers::{HarnessBuilder, MockCatalog, song};
    use crate::orchestrator::{Orchestrator, RunOptions};
    use crate::types::ContentRating;

    fn context(orchestrator: &Orchestrator, dir: &Path, source: TagSource) -> TrackContext {
        let plan = CodecPlan::for_request(QualityRequest::Best, &orchestrator.config.download);
        orchestrator.track_context("e1", "us", dir.to_path_buf(), None, plan, source)
    }

    fn job(track: TrackInfo, sequence: usize) -> TrackJob {
        TrackJob {
            track,
            position: sequence,
            sequence,
            total: 3,
        }
    }

    #[tokio::test]
    async fn downloaded_song_is_tagged_and_marked_done() {
        let catalog = MockCatalog::default();
        let track = song(&catalog, "1", "One", 1);
        let h = HarnessBuilder::new().catalog(catalog).build();
        let ctx = context(&h.orchestrator, &h.root, TagSource::Standalone);

        process_track(&ctx, job(track, 1)).await;

        let counters = h.orchestrator.stats().counters();
        assert_eq!((counters.total, counters.success), (1, 1));
        assert!(h.orchestrator.ledger().is_done("e1", 1));
        assert!(h.root.join("01. One.m4a").exists());

        let requests = h.decryptor.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].kind, StreamKind::Enhanced);
        assert_eq!(
            requests[0].stream_url, "https://hls.test/1/alac/prog_index.m3u8",
            "ALAC wins under the default priority"
        );

        let tags = h.tagger.tags_for("01. One.m4a").unwrap();
        assert_eq!(tags.get("title"), Some("One"));
        assert_eq!(tags.get("ISRC"), Some("ISRC1"));
    }

    #[tokio::test]
    async fn existing_file_short_circuits_without_fetching() {
        let catalog = MockCatalog::default();
        let track = song(&catalog, "1", "One", 1);
        let h = HarnessBuilder::new().catalog(catalog).build();
        std::fs::write(h.root.join("02. One.m4a"), b"x").unwrap();
        let ctx = context(&h.orchestrator, &h.root, TagSource::Standalone);

        process_track(&ctx, job(track, 2)).await;

        assert_eq!(h.orchestrator.stats().counters().success, 1);
        assert!(h.decryptor.requests().is_empty());
        assert!(h.tagger.embedded().is_empty());
        assert!(h.orchestrator.ledger().is_done("e1", 2));
    }

    #[tokio::test]
    async fn converted_file_counts_as_present() {
        let catalog = MockCatalog::default();
        let track = song(&catalog, "1", "One", 1);
        let h = HarnessBuilder::new()
            .catalog(catalog)
            .config(|c| c.conversion.enabled = true)
            .build();
        std::fs::write(h.root.join("01. One.flac"), b"x").unwrap();
        let ctx = context(&h.orchestrator, &h.root, TagSource::Standalone);

        process_track(&ctx, job(track, 1)).await;

        assert!(h.decryptor.requests().is_empty());
        assert_eq!(h.orchestrator.stats().counters().success, 1);
    }

    #[tokio::test]
    async fn atmos_request_without_enhanced_manifest_is_unavailable() {
        let h = HarnessBuilder::new()
            .options(RunOptions {
                quality: QualityRequest::Atmos,
                ..RunOptions::default()
            })
            .build();
        let plan = CodecPlan::for_request(QualityRequest::Atmos, &h.orchestrator.config.download);
        let ctx = h.orchestrator.track_context(
            "e1",
            "us",
            h.root.clone(),
            None,
            plan,
            TagSource::Standalone,
        );
        let track = TrackInfo {
            id: "9".into(),
            name: "Old".into(),
            artist_name: "A".into(),
            ..TrackInfo::default()
        };

        process_track(&ctx, job(track, 1)).await;

        let counters = h.orchestrator.stats().counters();
        assert_eq!((counters.total, counters.unavailable, counters.success), (1, 1, 0));
        assert_eq!(h.orchestrator.ledger().failed_positions("e1"), vec![1]);
        let issues = h.orchestrator.stats().issues();
        assert!(issues.warnings[0].starts_with("[A - Old]"));
        assert!(issues.warnings[0].contains("Atmos unavailable"));
    }

    #[tokio::test]
    async fn missing_enhanced_manifest_falls_back_to_legacy_stream() {
        let catalog = MockCatalog::default();
        catalog.add_playback("9", "https://legacy.test/9.m3u8");
        let h = HarnessBuilder::new().catalog(catalog).build();
        let ctx = context(&h.orchestrator, &h.root, TagSource::Standalone);
        let track = TrackInfo {
            id: "9".into(),
            name: "Old".into(),
            ..TrackInfo::default()
        };

        process_track(&ctx, job(track, 1)).await;

        let requests = h.decryptor.requests();
        assert_eq!(requests[0].kind, StreamKind::Legacy);
        assert_eq!(requests[0].stream_url, "https://legacy.test/9.m3u8");
        assert_eq!(h.orchestrator.stats().counters().success, 1);
    }

    #[tokio::test]
    async fn legacy_stream_without_media_user_token_is_an_error() {
        let h = HarnessBuilder::new()
            .config(|c| c.catalog.media_user_token = None)
            .build();
        let ctx = context(&h.orchestrator, &h.root, TagSource::Standalone);
        let track = TrackInfo {
            id: "9".into(),
            ..TrackInfo::default()
        };

        process_track(&ctx, job(track, 1)).await;

        assert_eq!(h.orchestrator.stats().counters().error, 1);
        assert!(h.decryptor.requests().is_empty());
    }

    #[tokio::test]
    async fn refused_stream_is_unavailable_and_other_failures_are_errors() {
        let catalog = MockCatalog::default();
        let refused = song(&catalog, "1", "One", 1);
        let flaky = song(&catalog, "2", "Two", 2);
        let decryptor = crate::orchestrator::test_helpers::MockDecryptor::default();
        decryptor.mark_unavailable("1");
        decryptor.fail("2", 1);
        let h = HarnessBuilder::new()
            .catalog(catalog)
            .decryptor(decryptor)
            .build();
        let ctx = context(&h.orchestrator, &h.root, TagSource::Standalone);

        process_track(&ctx, job(refused, 1)).await;
        process_track(&ctx, job(flaky, 2)).await;

        let counters = h.orchestrator.stats().counters();
        assert_eq!(counters.unavailable, 1);
        assert_eq!(counters.error, 1);
        assert_eq!(counters.success, 0);
        assert_eq!(h.orchestrator.ledger().failed_positions("e1"), vec![1, 2]);
    }

    #[tokio::test]
    async fn tag_failure_after_fetch_is_an_error() {
        let catalog = MockCatalog::default();
        let track = song(&catalog, "1", "One", 1);
        let h = HarnessBuilder::new()
            .catalog(catalog)
            .tagger(crate::orchestrator::test_helpers::MockTagger::failing())
            .build();
        let ctx = context(&h.orchestrator, &h.root, TagSource::Standalone);

        process_track(&ctx, job(track, 1)).await;

        assert_eq!(h.orchestrator.stats().counters().error, 1);
        assert_eq!(h.tagger.embedded().len(), 1, "metadata step is not reached");
    }

    #[tokio::test]
    async fn collection_tracks_are_tagged_as_compilation() {
        let catalog = MockCatalog::default();
        let mut track = song(&catalog, "1", "One", 7);
        track.content_rating = ContentRating::Explicit;
        let h = HarnessBuilder::new().catalog(catalog).build();
        let ctx = context(
            &h.orchestrator,
            &h.root,
            TagSource::Collection {
                name: "Mix".into(),
                curator: "Curator".into(),
            },
        );

        process_track(&ctx, job(track, 2)).await;

        let tags = h.tagger.tags_for("02. One.m4a").unwrap();
        assert_eq!(tags.get("album"), Some("Mix"));
        assert_eq!(tags.get("album_artist"), Some("Curator"));
        assert_eq!(tags.get("tracknum"), Some("2/3"));
        assert_eq!(tags.get("disk"), Some("1/1"));
        assert_eq!(tags.get("rating"), Some("1"));
    }

    #[tokio::test]
    async fn conversion_replaces_source_unless_kept() {
        let catalog = MockCatalog::default();
        let track = song(&catalog, "1", "One", 1);
        let h = HarnessBuilder::new()
            .catalog(catalog)
            .config(|c| c.conversion.enabled = true)
            .build();
        let ctx = context(&h.orchestrator, &h.root, TagSource::Standalone);

        process_track(&ctx, job(track, 1)).await;

        assert_eq!(h.converter.converted(), vec![h.root.join("01. One.flac")]);
        assert!(h.root.join("01. One.flac").exists());
        assert!(!h.root.join("01. One.m4a").exists());
        assert_eq!(h.orchestrator.stats().counters().success, 1);
    }
}

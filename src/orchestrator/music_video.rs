//! Music videos
//!
//! Video and audio are fetched as separate streams, then muxed and tagged in
//! one step. The intermediate files and the thumbnail are removed afterwards.

use std::path::PathBuf;
use url::Url;

use super::codec::CodecPlan;
use super::track::{self, TagSource, TrackContext, TrackJob, Warnings, download_error};
use super::{ArtistBinding, Orchestrator, Services};
use crate::artwork::write_cover;
use crate::config::Config;
use crate::error::{Error, Result, Severity, TrackError};
use crate::manifest::{select_mv_audio_uri, select_video_uri};
use crate::naming::{ArtistNames, artist_folder, limit, sanitize};
use crate::tools::{FetchRequest, StreamKind, TagSet};
use crate::types::{EntityRef, QualityRequest};

/// Why music videos cannot be fetched in this run, if they cannot
pub(crate) fn skip_reason(config: &Config, services: &Services) -> Option<&'static str> {
    if config.catalog.media_user_token().is_none() {
        Some("MV skipped: media-user-token not set")
    } else if !services.tools.decryptor.capabilities().music_video {
        Some("MV skipped: mp4decrypt not found")
    } else {
        None
    }
}

pub(crate) async fn download_video(ctx: &TrackContext, job: &TrackJob) -> Result<Warnings> {
    if let Some(reason) = skip_reason(&ctx.config, &ctx.services) {
        return Ok(vec![reason.to_string()]);
    }

    let config = &ctx.config;
    let catalog = ctx.services.catalog.as_ref();
    let video = &job.track;
    let name = match ctx.source {
        TagSource::Standalone => format!("{} ({})", video.name, video.id),
        _ => format!("{:02}. {}", job.sequence, video.name),
    };
    let save_name = sanitize(&limit(&name, config.naming.limit_max));
    let output = ctx.save_dir.join(format!("{save_name}.mp4"));
    if tokio::fs::try_exists(&output).await.unwrap_or(false) {
        tracing::info!(video_id = %video.id, path = %output.display(), "already downloaded");
        return Ok(Warnings::new());
    }
    tokio::fs::create_dir_all(&ctx.save_dir)
        .await
        .map_err(|e| TrackError::FileSystem {
            path: ctx.save_dir.clone(),
            reason: e.to_string(),
            severity: Severity::Error,
        })?;

    let master = catalog
        .webplayback(&video.id)
        .await
        .map_err(|e| download_error(video, e))?;
    let base = Url::parse(&master)
        .map_err(|e| download_error(video, Error::ManifestParse(e.to_string())))?;
    let text = catalog
        .fetch_text(&master)
        .await
        .map_err(|e| download_error(video, e))?;
    let video_uri = select_video_uri(text.as_bytes(), &base, config.download.mv_max)
        .map_err(|e| download_error(video, e))?;
    let audio_uri = select_mv_audio_uri(
        &text,
        &base,
        config.download.mv_audio_type.group_priority(),
    )
    .map_err(|e| download_error(video, e))?;

    let video_path = ctx.save_dir.join(format!("{}_vid.mp4", video.id));
    let audio_path = ctx.save_dir.join(format!("{}_aud.mp4", video.id));
    for (stream_url, destination) in [(video_uri, &video_path), (audio_uri, &audio_path)] {
        let request = FetchRequest {
            track_id: video.id.clone(),
            stream_url,
            kind: StreamKind::MusicVideo,
            destination: destination.clone(),
        };
        if let Err(e) = ctx.services.tools.decryptor.fetch(&request).await {
            remove_intermediates([&video_path, &audio_path]).await;
            return Err(download_error(video, e));
        }
    }

    let mut warnings = Warnings::new();
    let thumbnail = if video.artwork_url.is_empty() {
        None
    } else {
        match write_cover(
            catalog,
            &ctx.save_dir,
            &format!("{save_name}_thumbnail"),
            &video.artwork_url,
            &config.artwork,
        )
        .await
        {
            Ok(path) => Some(path),
            Err(e) => {
                warnings.push(format!("thumbnail unavailable: {e}"));
                None
            }
        }
    };

    let tags = video_tags(ctx, job, thumbnail.as_deref());
    let muxed = ctx
        .services
        .tools
        .tagger
        .mux(&video_path, &audio_path, &tags, &output)
        .await;

    remove_intermediates(
        [Some(&video_path), Some(&audio_path), thumbnail.as_ref()]
            .into_iter()
            .flatten(),
    )
    .await;

    muxed.map_err(|e| TrackError::TagEmbed {
        track_id: video.id.clone(),
        reason: e.to_string(),
        severity: Severity::Error,
    })?;
    Ok(warnings)
}

/// Remove stream and thumbnail files left next to the output; missing files are skipped
async fn remove_intermediates<'a>(paths: impl IntoIterator<Item = &'a PathBuf>) {
    for path in paths {
        if !tokio::fs::try_exists(path).await.unwrap_or(false) {
            continue;
        }
        if let Err(e) = tokio::fs::remove_file(path).await {
            tracing::debug!(path = %path.display(), error = %e, "could not remove intermediate file");
        }
    }
}

fn video_tags(ctx: &TrackContext, job: &TrackJob, thumbnail: Option<&std::path::Path>) -> TagSet {
    let video = &job.track;
    let mut tags = TagSet::new();
    tags.push("title", video.name.as_str())
        .push("artist", video.artist_name.as_str())
        .push("genre", video.genre.as_str())
        .push("created", video.release_date.as_str())
        .push("ISRC", video.isrc.as_str())
        .push("rating", video.content_rating.advisory_code().to_string());

    match &ctx.source {
        TagSource::Album(album) => {
            tags.push("album", album.name.as_str())
                .push("album_artist", album.artist_name.as_str())
                .push("disk", video.disc_number.to_string())
                .push("track", video.track_number.to_string())
                .push(
                    "tracknum",
                    format!("{}/{}", video.track_number, album.tracks.len()),
                )
                .push("copyright", album.copyright.as_str())
                .push("UPC", album.upc.as_str());
        }
        TagSource::Collection { name, curator } => {
            tags.push("album", name.as_str())
                .push("album_artist", curator.as_str())
                .push("performer", video.artist_name.as_str())
                .push("track", job.sequence.to_string())
                .push("tracknum", format!("{}/{}", job.sequence, job.total));
        }
        TagSource::Standalone => {
            tags.push("album", video.album_name.as_str())
                .push("album_artist", video.artist_name.as_str())
                .push("disk", video.disc_number.to_string())
                .push("track", video.track_number.to_string());
        }
    }
    if let Some(thumbnail) = thumbnail {
        tags.push("cover", thumbnail.display().to_string());
    }
    tags
}

impl Orchestrator {
    /// Download a music video given by its own URL
    pub(super) async fn rip_music_video(
        &self,
        entity: &EntityRef,
        binding: Option<&ArtistBinding>,
    ) -> Result<()> {
        let stats = &self.run.stats;
        if let Some(reason) = skip_reason(&self.config, &self.services) {
            stats.inc_total();
            stats.inc_success();
            stats.add_warning(format!("[{}] {reason}", entity.id));
            return Ok(());
        }
        if self.run.ledger.is_done(&entity.id, 1) {
            stats.inc_total();
            stats.inc_success();
            return Ok(());
        }

        let video = self
            .services
            .catalog
            .music_video(&entity.storefront, &entity.id)
            .await?;
        tracing::info!(video_id = %video.id, name = %video.name, "music video resolved");

        let names = ArtistNames {
            artist_name: String::new(),
            url_artist_name: binding.map(|b| b.name.clone()).unwrap_or_default(),
            artist_id: binding.map(|b| b.id.clone()).unwrap_or_default(),
        };
        let save_dir = artist_folder(
            &self.config.download.output_folder,
            &self.config.naming,
            &names,
        );
        let plan = CodecPlan::for_request(QualityRequest::Best, &self.config.download);
        let ctx = self.track_context(
            &entity.id,
            &entity.storefront,
            save_dir,
            None,
            plan,
            TagSource::Standalone,
        );
        track::process_track(
            &ctx,
            TrackJob {
                track: video,
                position: 1,
                sequence: 1,
                total: 1,
            },
        )
        .await;
        Ok(())
    }
}

//! Stations
//!
//! A station is either a list of tracks, handled like a playlist, or a live
//! stream that is captured as a single AAC file.

use std::path::{Path, PathBuf};

use super::codec::CodecPlan;
use super::track::{TagSource, already_present};
use super::Orchestrator;
use crate::error::Result;
use crate::naming::{ArtistNames, artist_folder, playlist_folder, song_file_stem};
use crate::tools::{FetchRequest, StreamKind, TagSet};
use crate::types::{EntityRef, RetryMode, StationInfo, TrackInfo};

/// Artist name used for station folders and stream tags
pub(crate) const STATION_ARTIST: &str = "Apple Music Station";

impl Orchestrator {
    pub(super) async fn rip_station(&self, entity: &EntityRef, mode: RetryMode) -> Result<()> {
        if self.config.catalog.media_user_token().is_none() {
            self.run.stats.add_warning(format!(
                "Station {} skipped: media-user-token not set",
                entity.id
            ));
            return Ok(());
        }

        let station = self
            .services
            .catalog
            .station(&entity.storefront, &entity.id)
            .await?;
        tracing::info!(
            station_id = %station.id,
            name = %station.name,
            live = station.is_stream,
            "station resolved"
        );

        let plan = CodecPlan::for_request(self.options.quality, &self.config.download);
        let naming = &self.config.naming;
        let names = ArtistNames {
            artist_name: STATION_ARTIST.into(),
            url_artist_name: STATION_ARTIST.into(),
            artist_id: String::new(),
        };
        let dir = artist_folder(&self.config.download.output_folder, naming, &names).join(
            playlist_folder(
                naming,
                &station.id,
                &station.name,
                STATION_ARTIST,
                &plan.quality,
                plan.label(),
                "",
            ),
        );
        tokio::fs::create_dir_all(&dir).await?;
        let cover = self.save_cover(&dir, "cover", &station.artwork_url).await;

        if station.is_stream {
            return self
                .rip_station_stream(&entity.storefront, &station, &dir, cover)
                .await;
        }

        let selection = self
            .choose_tracks(&station.name, &station.tracks, None, mode)
            .await?;
        let source = TagSource::Collection {
            name: station.name.clone(),
            curator: STATION_ARTIST.into(),
        };
        let ctx = self.track_context(&station.id, &entity.storefront, dir, cover, plan, source);
        self.run_tracks(ctx, &station.tracks, &selection, mode).await;
        Ok(())
    }

    /// Capture the 256 kbps AAC rendition of a live station
    ///
    /// Counts as one track at position 1. A failed tag step is only logged.
    async fn rip_station_stream(
        &self,
        storefront: &str,
        station: &StationInfo,
        dir: &Path,
        cover: Option<PathBuf>,
    ) -> Result<()> {
        let stats = &self.run.stats;
        let ledger = &self.run.ledger;
        stats.inc_total();
        if ledger.is_done(&station.id, 1) {
            stats.inc_success();
            return Ok(());
        }

        let as_track = TrackInfo {
            id: station.id.clone(),
            name: station.name.clone(),
            disc_number: 1,
            track_number: 1,
            ..TrackInfo::default()
        };
        let stem = song_file_stem(&self.config.naming, &as_track, 1, "256Kbps", "AAC", "");
        let path = dir.join(format!("{stem}.m4a"));
        if already_present(&path, &self.config.conversion).await {
            tracing::info!(path = %path.display(), "station already captured");
            stats.inc_success();
            ledger.mark_done(&station.id, 1);
            return Ok(());
        }

        let fetched = async {
            let stream = self
                .services
                .catalog
                .station_stream(storefront, &station.id)
                .await?;
            let request = FetchRequest {
                track_id: station.id.clone(),
                stream_url: stream.aac_256_url(),
                kind: StreamKind::Legacy,
                destination: path.clone(),
            };
            self.services.tools.decryptor.fetch(&request).await
        }
        .await;
        if let Err(e) = fetched {
            if e.aborts_run() {
                return Err(e);
            }
            tracing::warn!(
                station_id = %station.id,
                error = %e,
                error_code = e.error_code(),
                "station capture failed"
            );
            stats.inc_error();
            stats.add_error(format!("[{STATION_ARTIST} - {}] {e}", station.name));
            ledger.mark_failed(&station.id, 1);
            return Ok(());
        }

        let mut tags = TagSet::new();
        tags.push("disk", "1/1")
            .push("track", "1")
            .push("tracknum", "1/1")
            .push("artist", STATION_ARTIST)
            .push("performer", STATION_ARTIST)
            .push("album_artist", STATION_ARTIST)
            .push("album", station.name.as_str())
            .push("title", station.name.as_str());
        if self.config.artwork.embed_cover {
            if let Some(cover) = &cover {
                tags.push("cover", cover.display().to_string());
            }
        }
        if let Err(e) = self.services.tools.tagger.embed_tags(&path, &tags).await {
            tracing::warn!(station_id = %station.id, error = %e, "station tags not written");
        }

        stats.inc_success();
        ledger.mark_done(&station.id, 1);
        Ok(())
    }
}

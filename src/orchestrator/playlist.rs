//! Playlists

use super::Orchestrator;
use super::track::TagSource;
use crate::error::Result;
use crate::naming::{ArtistNames, artist_folder, playlist_folder, tag_string};
use crate::types::{EntityRef, RetryMode};

/// Artist name used for the folders of playlists
pub(crate) const PLAYLIST_ARTIST: &str = "Apple Music";

impl Orchestrator {
    pub(super) async fn rip_playlist(&self, entity: &EntityRef, mode: RetryMode) -> Result<()> {
        let playlist = self
            .services
            .catalog
            .playlist(&entity.storefront, &entity.id)
            .await?;
        tracing::info!(
            playlist_id = %playlist.id,
            name = %playlist.name,
            tracks = playlist.tracks.len(),
            "playlist resolved"
        );

        let plan = self.plan_codec(playlist.tracks.first()).await;
        let naming = &self.config.naming;
        let names = ArtistNames {
            artist_name: PLAYLIST_ARTIST.into(),
            url_artist_name: PLAYLIST_ARTIST.into(),
            artist_id: String::new(),
        };
        let dir = artist_folder(&self.config.download.output_folder, naming, &names).join(
            playlist_folder(
                naming,
                &playlist.id,
                &playlist.name,
                PLAYLIST_ARTIST,
                &plan.quality,
                plan.label(),
                &tag_string(naming, playlist.is_master, playlist.content_rating),
            ),
        );
        tokio::fs::create_dir_all(&dir).await?;
        let cover = self.save_cover(&dir, "cover", &playlist.artwork_url).await;

        let selection = self
            .choose_tracks(&playlist.name, &playlist.tracks, None, mode)
            .await?;
        let source = TagSource::Collection {
            name: playlist.name.clone(),
            curator: playlist.curator_name.clone(),
        };
        let ctx = self.track_context(&playlist.id, &entity.storefront, dir, cover, plan, source);
        self.run_tracks(ctx, &playlist.tracks, &selection, mode).await;
        Ok(())
    }
}

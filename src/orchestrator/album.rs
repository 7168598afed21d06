//! Albums and songs

use std::sync::Arc;

use super::track::TagSource;
use super::{ArtistBinding, Orchestrator};
use crate::error::{Error, Result};
use crate::naming::{album_folder, artist_folder, tag_string};
use crate::types::{EntityRef, RetryMode};

impl Orchestrator {
    /// Download an album, or the one track `single` of it
    pub(super) async fn rip_album(
        &self,
        storefront: &str,
        album_id: &str,
        single: Option<&str>,
        binding: Option<&ArtistBinding>,
        mode: RetryMode,
    ) -> Result<()> {
        let album = self.services.catalog.album(storefront, album_id).await?;
        tracing::info!(
            album_id,
            name = %album.name,
            tracks = album.tracks.len(),
            "album resolved"
        );

        let plan = self.plan_codec(album.tracks.first()).await;
        let naming = &self.config.naming;
        let names = self.artist_names(
            binding,
            &album.artist_name,
            album.artist_id.as_deref().unwrap_or_default(),
        );
        let artist_dir = artist_folder(&self.config.download.output_folder, naming, &names);
        let tag = tag_string(naming, album.is_master, album.content_rating);
        let album_dir = artist_dir.join(album_folder(
            naming,
            &album,
            &plan.quality,
            plan.label(),
            &tag,
        ));
        tokio::fs::create_dir_all(&album_dir).await?;

        if self.config.artwork.save_artist_cover {
            if let Some(url) = album.artist_artwork_url.as_deref() {
                self.save_cover(&artist_dir, "folder", url).await;
            }
        }
        let cover = self.save_cover(&album_dir, "cover", &album.artwork_url).await;

        let selection = self
            .choose_tracks(&album.name, &album.tracks, single, mode)
            .await?;
        let album = Arc::new(album);
        let ctx = self.track_context(
            &album.id,
            storefront,
            album_dir,
            cover,
            plan,
            TagSource::Album(Arc::clone(&album)),
        );
        self.run_tracks(ctx, &album.tracks, &selection, mode).await;
        Ok(())
    }

    /// Download one song through its parent album
    ///
    /// A song whose metadata cannot be fetched counts as not-a-song.
    pub(super) async fn rip_song(
        &self,
        entity: &EntityRef,
        binding: Option<&ArtistBinding>,
        mode: RetryMode,
    ) -> Result<()> {
        let song = match self
            .services
            .catalog
            .song(&entity.storefront, &entity.id)
            .await
        {
            Ok(song) => song,
            Err(e) => {
                if !e.aborts_run() {
                    self.run.stats.inc_not_song();
                }
                return Err(e);
            }
        };
        let album_id = song.album_id.clone().ok_or_else(|| Error::MetadataFetch {
            kind: "songs".into(),
            id: song.id.clone(),
            reason: "song has no parent album".into(),
        })?;
        self.rip_album(&entity.storefront, &album_id, Some(&song.id), binding, mode)
            .await
    }
}

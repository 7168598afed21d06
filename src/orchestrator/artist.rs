//! Artist fan-out
//!
//! An artist URL expands into the artist's albums and music videos. Each
//! release is processed as its own entity with the artist bound for folder
//! naming; a failed release does not stop the others.

use super::{ArtistBinding, Orchestrator};
use crate::catalog::parse_catalog_url;
use crate::error::Result;
use crate::naming::{ArtistNames, artist_folder};
use crate::types::{ArtistRelation, EntityRef, ReleaseItem, RetryMode};

impl Orchestrator {
    pub(super) async fn rip_artist(&self, entity: &EntityRef, mode: RetryMode) -> Result<()> {
        let catalog = &self.services.catalog;
        let artist = catalog.artist(&entity.storefront, &entity.id).await?;
        tracing::info!(artist_id = %artist.id, name = %artist.name, "artist resolved");

        if self.config.artwork.save_artist_cover {
            if let Some(url) = artist.artwork_url.as_deref() {
                let dir = artist_folder(
                    &self.config.download.output_folder,
                    &self.config.naming,
                    &ArtistNames::single(&artist.name, &artist.id),
                );
                tokio::fs::create_dir_all(&dir).await?;
                self.save_cover(&dir, "folder", url).await;
            }
        }

        let albums = catalog
            .artist_releases(&entity.storefront, &entity.id, ArtistRelation::Albums)
            .await?;
        let videos = match catalog
            .artist_releases(&entity.storefront, &entity.id, ArtistRelation::MusicVideos)
            .await
        {
            Ok(videos) => videos,
            Err(e) if e.aborts_run() => return Err(e),
            Err(e) => {
                tracing::warn!(artist_id = %artist.id, error = %e, "music video list unavailable");
                self.run
                    .stats
                    .add_warning(format!("[{}] music videos skipped: {e}", artist.name));
                Vec::new()
            }
        };

        let albums = self
            .choose_releases(&format!("{} - albums", artist.name), albums, mode)
            .await?;
        let videos = self
            .choose_releases(&format!("{} - music videos", artist.name), videos, mode)
            .await?;

        let binding = ArtistBinding {
            name: artist.name.clone(),
            id: artist.id.clone(),
        };
        for release in albums.iter().chain(videos.iter()) {
            let child = match parse_catalog_url(&release.url) {
                Ok(child) => child,
                Err(e) => {
                    self.run
                        .stats
                        .add_warning(format!("[{}] {} skipped: {e}", artist.name, release.name));
                    continue;
                }
            };
            if let Err(e) = self.handle_child(&child, &binding, mode).await {
                if e.aborts_run() {
                    return Err(e);
                }
            }
        }
        Ok(())
    }

    /// Releases to process
    ///
    /// Retry passes revisit only releases with recorded failures; otherwise
    /// the operator picks unless every release was requested up front.
    async fn choose_releases(
        &self,
        title: &str,
        releases: Vec<ReleaseItem>,
        mode: RetryMode,
    ) -> Result<Vec<ReleaseItem>> {
        if mode == RetryMode::FailedOnly {
            return Ok(releases
                .into_iter()
                .filter(|r| self.run.ledger.has_failures_for(&r.id))
                .collect());
        }
        if releases.is_empty() || self.options.artist_all {
            return Ok(releases);
        }
        let items: Vec<String> = releases
            .iter()
            .map(|r| format!("{} | {} | {}", r.name, r.release_date, r.id))
            .collect();
        let chosen = self.services.selector.select(title, &items).await?;
        Ok(chosen
            .into_iter()
            .filter_map(|position| releases.get(position.checked_sub(1)?).cloned())
            .collect())
    }
}

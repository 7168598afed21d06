//! Catalog service access
//!
//! The orchestrator talks to the catalog only through [`CatalogClient`].
//! [`HttpCatalogClient`] is the production implementation; tests substitute
//! in-memory doubles.

mod device;
mod http;
pub(crate) mod models;
mod urls;

use async_trait::async_trait;

pub use device::DeviceManifestAgent;
pub use http::HttpCatalogClient;
pub use urls::parse_catalog_url;

use crate::error::Result;
use crate::types::{
    AlbumInfo, ArtistInfo, ArtistRelation, PlaylistInfo, ReleaseItem, StationInfo, StationStream,
    TrackInfo,
};

/// Metadata and stream lookups against the catalog service
///
/// Implementations return [`Error::Auth`](crate::Error::Auth) when the service
/// rejects the configured tokens, so the run can stop early.
#[async_trait]
pub trait CatalogClient: Send + Sync {
    /// Album with its full ordered track list
    async fn album(&self, storefront: &str, id: &str) -> Result<AlbumInfo>;

    /// Playlist with its full ordered track list
    async fn playlist(&self, storefront: &str, id: &str) -> Result<PlaylistInfo>;

    /// Station metadata; tracks are filled in for non-live stations
    async fn station(&self, storefront: &str, id: &str) -> Result<StationInfo>;

    /// Single song, including its parent album ID and enhanced manifest URL
    async fn song(&self, storefront: &str, id: &str) -> Result<TrackInfo>;

    /// Single music video
    async fn music_video(&self, storefront: &str, id: &str) -> Result<TrackInfo>;

    /// Artist name and picture
    async fn artist(&self, storefront: &str, id: &str) -> Result<ArtistInfo>;

    /// Every release of an artist in one relation, oldest first
    async fn artist_releases(
        &self,
        storefront: &str,
        id: &str,
        relation: ArtistRelation,
    ) -> Result<Vec<ReleaseItem>>;

    /// GET a text resource such as a master playlist
    async fn fetch_text(&self, url: &str) -> Result<String>;

    /// GET a binary resource such as cover art
    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>>;

    /// HLS master playlist URL from the playback endpoint
    ///
    /// Used for music videos and legacy AAC-LC streams; requires a media user token.
    async fn webplayback(&self, id: &str) -> Result<String>;

    /// Live stream asset of a station
    async fn station_stream(&self, storefront: &str, id: &str) -> Result<StationStream>;
}

/// Sort releases by release date, oldest first
///
/// Releases without a parseable date sort first, in their original order.
pub fn sort_releases(releases: &mut [ReleaseItem]) {
    releases.sort_by_key(|item| {
        chrono::NaiveDate::parse_from_str(&item.release_date, "%Y-%m-%d").ok()
    });
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn release(id: &str, date: &str) -> ReleaseItem {
        ReleaseItem {
            id: id.into(),
            release_date: date.into(),
            ..ReleaseItem::default()
        }
    }

    #[test]
    fn releases_sort_oldest_first_with_undated_leading() {
        let mut releases = vec![
            release("c", "2020-01-01"),
            release("a", "1971-06-22"),
            release("x", ""),
            release("b", "1994-10-25"),
        ];
        sort_releases(&mut releases);
        let ids: Vec<_> = releases.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["x", "a", "b", "c"]);
    }
}

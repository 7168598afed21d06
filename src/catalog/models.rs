//! Wire format of catalog responses and conversion into domain types
//!
//! Resources follow the catalog's `{ data: [ { id, attributes, relationships } ] }`
//! shape. Every attribute is optional on the wire; missing values become
//! empty strings or zero in the domain types.

use serde::Deserialize;

use crate::types::{
    AlbumInfo, ArtistInfo, ContentRating, PlaylistInfo, ReleaseItem, StationInfo, TrackInfo,
    TrackKind,
};

/// Top-level document holding a list of resources
#[derive(Debug, Deserialize)]
pub(crate) struct Document<T> {
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
    #[serde(default)]
    pub next: Option<String>,
}

/// A relationship: related resources plus an optional next-page path
#[derive(Debug, Deserialize)]
pub(crate) struct Relationship<T> {
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
    #[serde(default)]
    pub next: Option<String>,
}

impl<T> Default for Relationship<T> {
    fn default() -> Self {
        Self {
            data: Vec::new(),
            next: None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct Artwork {
    #[serde(default)]
    pub url: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ExtendedAssetUrls {
    #[serde(default)]
    pub enhanced_hls: Option<String>,
}

/// Bare reference to a related resource
#[derive(Debug, Deserialize)]
pub(crate) struct ResourceRef {
    pub id: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TrackAttributes {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub artist_name: String,
    #[serde(default)]
    pub album_name: String,
    #[serde(default)]
    pub disc_number: u32,
    #[serde(default)]
    pub track_number: u32,
    #[serde(default)]
    pub release_date: String,
    #[serde(default)]
    pub isrc: String,
    #[serde(default)]
    pub composer_name: String,
    #[serde(default)]
    pub genre_names: Vec<String>,
    #[serde(default)]
    pub content_rating: Option<String>,
    #[serde(default)]
    pub is_apple_digital_master: bool,
    #[serde(default)]
    pub audio_traits: Vec<String>,
    #[serde(default)]
    pub artwork: Artwork,
    #[serde(default)]
    pub extended_asset_urls: ExtendedAssetUrls,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct TrackRelationships {
    #[serde(default)]
    pub artists: Relationship<ResourceRef>,
    #[serde(default)]
    pub albums: Relationship<ResourceRef>,
}

/// Song or music video resource
#[derive(Debug, Deserialize)]
pub(crate) struct TrackResource {
    pub id: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub attributes: TrackAttributes,
    #[serde(default)]
    pub relationships: TrackRelationships,
}

impl From<TrackResource> for TrackInfo {
    fn from(resource: TrackResource) -> Self {
        let attrs = resource.attributes;
        let kind = if resource.kind == "music-videos" {
            TrackKind::MusicVideo
        } else {
            TrackKind::Song
        };
        TrackInfo {
            id: resource.id,
            kind,
            hires: attrs.audio_traits.iter().any(|t| t == "hi-res-lossless"),
            name: attrs.name,
            artist_name: attrs.artist_name,
            artist_id: resource
                .relationships
                .artists
                .data
                .into_iter()
                .next()
                .map(|a| a.id),
            album_name: attrs.album_name,
            album_id: resource
                .relationships
                .albums
                .data
                .into_iter()
                .next()
                .map(|a| a.id),
            disc_number: attrs.disc_number,
            track_number: attrs.track_number,
            release_date: attrs.release_date,
            isrc: attrs.isrc,
            composer: attrs.composer_name,
            genre: attrs.genre_names.into_iter().next().unwrap_or_default(),
            content_rating: ContentRating::from_attribute(attrs.content_rating.as_deref()),
            is_master: attrs.is_apple_digital_master,
            artwork_url: attrs.artwork.url,
            enhanced_hls: attrs
                .extended_asset_urls
                .enhanced_hls
                .filter(|url| !url.is_empty()),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AlbumAttributes {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub artist_name: String,
    #[serde(default)]
    pub release_date: String,
    #[serde(default)]
    pub upc: String,
    #[serde(default)]
    pub record_label: String,
    #[serde(default)]
    pub copyright: String,
    #[serde(default)]
    pub is_apple_digital_master: bool,
    #[serde(default)]
    pub is_mastered_for_itunes: bool,
    #[serde(default)]
    pub content_rating: Option<String>,
    #[serde(default)]
    pub artwork: Artwork,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ArtistRefAttributes {
    #[serde(default)]
    pub artwork: Option<Artwork>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ArtistRef {
    pub id: String,
    #[serde(default)]
    pub attributes: ArtistRefAttributes,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct CollectionRelationships {
    #[serde(default)]
    pub tracks: Relationship<TrackResource>,
    #[serde(default)]
    pub artists: Relationship<ArtistRef>,
}

/// Album resource
#[derive(Debug, Deserialize)]
pub(crate) struct AlbumResource {
    pub id: String,
    #[serde(default)]
    pub attributes: AlbumAttributes,
    #[serde(default)]
    pub relationships: CollectionRelationships,
}

impl AlbumResource {
    /// Path of the next page of tracks, if the album has more
    pub fn take_tracks_next(&mut self) -> Option<String> {
        self.relationships.tracks.next.take()
    }
}

impl From<AlbumResource> for AlbumInfo {
    fn from(resource: AlbumResource) -> Self {
        let attrs = resource.attributes;
        let artist = resource.relationships.artists.data.into_iter().next();
        AlbumInfo {
            id: resource.id,
            name: attrs.name,
            artist_name: attrs.artist_name,
            artist_id: artist.as_ref().map(|a| a.id.clone()),
            artist_artwork_url: artist
                .and_then(|a| a.attributes.artwork)
                .map(|a| a.url)
                .filter(|url| !url.is_empty()),
            release_date: attrs.release_date,
            upc: attrs.upc,
            record_label: attrs.record_label,
            copyright: attrs.copyright,
            is_master: attrs.is_apple_digital_master || attrs.is_mastered_for_itunes,
            content_rating: ContentRating::from_attribute(attrs.content_rating.as_deref()),
            artwork_url: attrs.artwork.url,
            tracks: resource
                .relationships
                .tracks
                .data
                .into_iter()
                .map(TrackInfo::from)
                .collect(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PlaylistAttributes {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub curator_name: String,
    #[serde(default)]
    pub is_apple_digital_master: bool,
    #[serde(default)]
    pub is_mastered_for_itunes: bool,
    #[serde(default)]
    pub content_rating: Option<String>,
    #[serde(default)]
    pub artwork: Artwork,
}

/// Playlist resource
#[derive(Debug, Deserialize)]
pub(crate) struct PlaylistResource {
    pub id: String,
    #[serde(default)]
    pub attributes: PlaylistAttributes,
    #[serde(default)]
    pub relationships: CollectionRelationships,
}

impl PlaylistResource {
    /// Path of the next page of tracks, if the playlist has more
    pub fn take_tracks_next(&mut self) -> Option<String> {
        self.relationships.tracks.next.take()
    }
}

impl From<PlaylistResource> for PlaylistInfo {
    fn from(resource: PlaylistResource) -> Self {
        PlaylistInfo {
            id: resource.id,
            name: resource.attributes.name,
            curator_name: resource.attributes.curator_name,
            artwork_url: resource.attributes.artwork.url,
            is_master: resource.attributes.is_apple_digital_master
                || resource.attributes.is_mastered_for_itunes,
            content_rating: ContentRating::from_attribute(
                resource.attributes.content_rating.as_deref(),
            ),
            tracks: resource
                .relationships
                .tracks
                .data
                .into_iter()
                .map(TrackInfo::from)
                .collect(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct StationAttributes {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub is_live: bool,
    #[serde(default)]
    pub artwork: Artwork,
}

/// Station resource
#[derive(Debug, Deserialize)]
pub(crate) struct StationResource {
    pub id: String,
    #[serde(default)]
    pub attributes: StationAttributes,
}

impl StationResource {
    /// Station metadata with the given track list
    pub fn into_info(self, tracks: Vec<TrackInfo>) -> StationInfo {
        StationInfo {
            id: self.id,
            name: self.attributes.name,
            artwork_url: self.attributes.artwork.url,
            is_stream: self.attributes.is_live,
            tracks,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ArtistAttributes {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub artwork: Option<Artwork>,
}

/// Artist resource
#[derive(Debug, Deserialize)]
pub(crate) struct ArtistResource {
    pub id: String,
    #[serde(default)]
    pub attributes: ArtistAttributes,
}

impl From<ArtistResource> for ArtistInfo {
    fn from(resource: ArtistResource) -> Self {
        ArtistInfo {
            id: resource.id,
            name: resource.attributes.name,
            artwork_url: resource
                .attributes
                .artwork
                .map(|a| a.url)
                .filter(|url| !url.is_empty()),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ReleaseAttributes {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub release_date: String,
    #[serde(default)]
    pub url: String,
}

/// Entry of an artist's albums or music videos
#[derive(Debug, Deserialize)]
pub(crate) struct ReleaseResource {
    pub id: String,
    #[serde(default)]
    pub attributes: ReleaseAttributes,
}

impl From<ReleaseResource> for ReleaseItem {
    fn from(resource: ReleaseResource) -> Self {
        ReleaseItem {
            id: resource.id,
            name: resource.attributes.name,
            release_date: resource.attributes.release_date,
            url: resource.attributes.url,
        }
    }
}

/// Playback endpoint response
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WebPlayback {
    #[serde(default)]
    pub song_list: Vec<WebPlaybackSong>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WebPlaybackSong {
    #[serde(rename = "hls-playlist-url", default)]
    pub hls_playlist_url: Option<String>,
}

/// Station playback assets response
#[derive(Debug, Deserialize)]
pub(crate) struct StationAssets {
    pub results: StationAssetResults,
}

#[derive(Debug, Deserialize)]
pub(crate) struct StationAssetResults {
    #[serde(default)]
    pub assets: Vec<StationAsset>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct StationAsset {
    pub url: String,
}

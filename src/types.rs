//! Core types for catalog-dl

use serde::{Deserialize, Serialize};

/// Kind of catalog entity a URL points at
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EntityKind {
    /// Artist page (fans out into albums and music videos)
    Artist,
    /// Album
    Album,
    /// Playlist
    Playlist,
    /// Radio station
    Station,
    /// Single song (resolved through its parent album)
    Song,
    /// Standalone music video
    MusicVideo,
}

impl EntityKind {
    /// Path segment used by the catalog API for this kind
    pub fn catalog_path(&self) -> &'static str {
        match self {
            EntityKind::Artist => "artists",
            EntityKind::Album => "albums",
            EntityKind::Playlist => "playlists",
            EntityKind::Station => "stations",
            EntityKind::Song => "songs",
            EntityKind::MusicVideo => "music-videos",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            EntityKind::Artist => "artist",
            EntityKind::Album => "album",
            EntityKind::Playlist => "playlist",
            EntityKind::Station => "station",
            EntityKind::Song => "song",
            EntityKind::MusicVideo => "music-video",
        };
        f.write_str(name)
    }
}

/// A catalog URL broken into its parts
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EntityRef {
    /// Entity kind
    pub kind: EntityKind,
    /// Two-letter storefront from the URL
    pub storefront: String,
    /// Catalog ID
    pub id: String,
    /// Song ID from an album URL's `?i=` parameter
    pub song_id: Option<String>,
}

/// Codec family a track is downloaded in
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CodecMode {
    /// Lossless ALAC
    Alac,
    /// Stereo AAC
    Aac,
    /// Dolby Atmos (E-AC-3 / AC-3)
    Atmos,
}

impl CodecMode {
    /// Mode implied by a codec string from a master playlist
    pub fn from_codec(codec: &str) -> Self {
        match codec {
            "ec-3" | "ac-3" => CodecMode::Atmos,
            "mp4a.40.2" => CodecMode::Aac,
            _ => CodecMode::Alac,
        }
    }

    /// Upper-case label used for `{Codec}`
    pub fn label(&self) -> &'static str {
        match self {
            CodecMode::Alac => "ALAC",
            CodecMode::Aac => "AAC",
            CodecMode::Atmos => "ATMOS",
        }
    }
}

/// Quality the operator asked for on the command line
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum QualityRequest {
    /// Pick the best codec from the priority list
    #[default]
    Best,
    /// Force Atmos; tracks without it are unavailable
    Atmos,
    /// Force AAC
    Aac,
}

/// Whether a batch re-runs everything or only previously failed positions
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RetryMode {
    /// Every selected position not yet done
    #[default]
    Full,
    /// Only positions in the entity's failed set (all positions if that set is empty)
    FailedOnly,
}

/// Which positions of an entity are candidates
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum Selection {
    /// Every position
    #[default]
    All,
    /// Explicit 1-based positions
    Positions(Vec<usize>),
    /// The single track with this ID, bypassing the done filter
    Single(String),
}

/// Content advisory of a release or track
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentRating {
    /// No advisory
    #[default]
    None,
    /// Explicit
    Explicit,
    /// Clean version of an explicit release
    Clean,
}

impl ContentRating {
    /// Parse the catalog's `contentRating` attribute
    pub fn from_attribute(value: Option<&str>) -> Self {
        match value {
            Some("explicit") => ContentRating::Explicit,
            Some("clean") => ContentRating::Clean,
            _ => ContentRating::None,
        }
    }

    /// iTunes advisory code written into tags
    pub fn advisory_code(&self) -> u8 {
        match self {
            ContentRating::None => 0,
            ContentRating::Explicit => 1,
            ContentRating::Clean => 2,
        }
    }
}

/// Whether a track is audio or video
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrackKind {
    /// Audio track
    #[default]
    Song,
    /// Music video
    MusicVideo,
}

/// Metadata for one track (song or music video)
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TrackInfo {
    /// Catalog ID
    pub id: String,
    /// Song or music video
    pub kind: TrackKind,
    /// Track title
    pub name: String,
    /// Performing artist as displayed
    pub artist_name: String,
    /// Catalog ID of the primary artist
    pub artist_id: Option<String>,
    /// Name of the parent album
    pub album_name: String,
    /// Catalog ID of the parent album
    pub album_id: Option<String>,
    /// Disc within the album, 1-based
    pub disc_number: u32,
    /// Track number within its disc
    pub track_number: u32,
    /// `YYYY-MM-DD`, possibly empty
    pub release_date: String,
    /// International Standard Recording Code
    pub isrc: String,
    /// Composer credit
    pub composer: String,
    /// First genre name
    pub genre: String,
    /// Explicit, clean or unrated
    pub content_rating: ContentRating,
    /// Mastered for lossless ("Apple Digital Master")
    pub is_master: bool,
    /// Advertises hi-res lossless
    pub hires: bool,
    /// Artwork template URL containing `{w}x{h}`
    pub artwork_url: String,
    /// Enhanced master playlist, absent for AAC-only tracks
    pub enhanced_hls: Option<String>,
}

/// Album metadata and its ordered track list
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AlbumInfo {
    /// Catalog ID
    pub id: String,
    /// Album title
    pub name: String,
    /// Album artist as displayed
    pub artist_name: String,
    /// Catalog ID of the album artist
    pub artist_id: Option<String>,
    /// Artwork template of the album artist
    pub artist_artwork_url: Option<String>,
    /// `YYYY-MM-DD`, possibly empty
    pub release_date: String,
    /// Universal Product Code
    pub upc: String,
    /// Record label
    pub record_label: String,
    /// Copyright line
    pub copyright: String,
    /// Mastered for lossless
    pub is_master: bool,
    /// Explicit, clean or unrated
    pub content_rating: ContentRating,
    /// Artwork template URL containing `{w}x{h}`
    pub artwork_url: String,
    /// Tracks in catalog order
    pub tracks: Vec<TrackInfo>,
}

impl AlbumInfo {
    /// First four characters of the release date
    pub fn release_year(&self) -> &str {
        self.release_date.get(..4).unwrap_or(&self.release_date)
    }
}

/// Playlist metadata and its ordered track list
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PlaylistInfo {
    /// Catalog ID (`pl.` prefix)
    pub id: String,
    /// Playlist title
    pub name: String,
    /// Curator, written as album artist
    pub curator_name: String,
    /// Artwork template URL
    pub artwork_url: String,
    /// Digital master or mastered-for-iTunes playlist
    pub is_master: bool,
    /// Content advisory
    pub content_rating: ContentRating,
    /// Tracks in playlist order
    pub tracks: Vec<TrackInfo>,
}

/// Station metadata
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StationInfo {
    /// Catalog ID (`ra.` prefix)
    pub id: String,
    /// Station name
    pub name: String,
    /// Artwork template URL
    pub artwork_url: String,
    /// Live stream rather than a track list
    pub is_stream: bool,
    /// Tracks of a non-live station
    pub tracks: Vec<TrackInfo>,
}

/// Artist name and picture
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ArtistInfo {
    /// Catalog ID
    pub id: String,
    /// Artist name
    pub name: String,
    /// Artwork template URL, if the artist has a picture
    pub artwork_url: Option<String>,
}

/// Which list of an artist's releases to page through
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ArtistRelation {
    /// Albums, singles and EPs
    Albums,
    /// Music videos
    MusicVideos,
}

impl ArtistRelation {
    /// Catalog relationship path segment
    pub fn catalog_path(&self) -> &'static str {
        match self {
            ArtistRelation::Albums => "albums",
            ArtistRelation::MusicVideos => "music-videos",
        }
    }
}

/// One entry of an artist's release list
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReleaseItem {
    /// Catalog ID
    pub id: String,
    /// Release title
    pub name: String,
    /// `YYYY-MM-DD`, possibly empty
    pub release_date: String,
    /// Public catalog URL of the release
    pub url: String,
}

/// Playback asset of a live station
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StationStream {
    /// Master playlist URL
    pub assets_url: String,
}

impl StationStream {
    /// The fixed 256 kbps AAC rendition of the stream
    pub fn aac_256_url(&self) -> String {
        self.assets_url.replace("index.m3u8", "256/prog_index.m3u8")
    }
}

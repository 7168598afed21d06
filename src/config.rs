//! Configuration types for catalog-dl
//!
//! A [`Config`] is normally loaded from a TOML file with [`Config::from_file`]. Every
//! field has a default, so an empty file (or [`Config::default()`]) is a working
//! configuration apart from the catalog tokens.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};

/// Tokens shorter than this are treated as "not set".
pub const MIN_MEDIA_USER_TOKEN_LEN: usize = 51;

/// Catalog service access (storefront, language, tokens, endpoints)
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Two-letter storefront code used when a URL does not carry one (default: "us")
    #[serde(default = "default_storefront")]
    pub storefront: String,

    /// Catalog language (`l` query parameter); empty means the storefront default
    #[serde(default)]
    pub language: String,

    /// Bearer token for the catalog API
    #[serde(default)]
    pub authorization_token: Option<String>,

    /// Media user token, required for stations, music videos and AAC-LC
    #[serde(default)]
    pub media_user_token: Option<String>,

    /// Catalog API base URL
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Playback endpoint used to resolve music video and AAC-LC streams
    #[serde(default = "default_webplayback_url")]
    pub webplayback_url: String,

    /// Per-request timeout (default: 30 seconds)
    #[serde(default = "default_request_timeout", with = "duration_serde")]
    pub request_timeout: Duration,

    /// Ask a device agent for the full-quality manifest URL
    #[serde(default)]
    pub get_m3u8_from_device: bool,

    /// Address of the device manifest agent
    #[serde(default = "default_m3u8_port")]
    pub get_m3u8_port: String,

    /// Which tracks use the device agent
    #[serde(default)]
    pub get_m3u8_mode: M3u8Mode,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            storefront: default_storefront(),
            language: String::new(),
            authorization_token: None,
            media_user_token: None,
            api_base_url: default_api_base_url(),
            webplayback_url: default_webplayback_url(),
            request_timeout: default_request_timeout(),
            get_m3u8_from_device: false,
            get_m3u8_port: default_m3u8_port(),
            get_m3u8_mode: M3u8Mode::default(),
        }
    }
}

impl CatalogConfig {
    /// Media user token, if one long enough to be real is configured
    pub fn media_user_token(&self) -> Option<&str> {
        self.media_user_token
            .as_deref()
            .filter(|t| t.len() >= MIN_MEDIA_USER_TOKEN_LEN)
    }

    /// Authorization token without any "Bearer " prefix
    pub fn bearer_token(&self) -> Option<String> {
        self.authorization_token
            .as_deref()
            .map(|t| t.trim().trim_start_matches("Bearer ").to_string())
            .filter(|t| !t.is_empty() && t != "your-authorization-token")
    }
}

/// When to consult the device manifest agent
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum M3u8Mode {
    /// Every track
    All,
    /// Only tracks advertising hi-res lossless
    #[default]
    Hires,
    /// Never
    None,
}

/// Download behavior (output root, concurrency, codec selection)
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Output root directory (default: "output")
    #[serde(default = "default_output_folder")]
    pub output_folder: PathBuf,

    /// Maximum concurrent track jobs per entity (default: 4)
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Codec preference list, most preferred first
    #[serde(default = "default_codec_priority")]
    pub codec_priority: Vec<String>,

    /// AAC flavour used in AAC mode
    #[serde(default)]
    pub aac_type: AacType,

    /// Highest ALAC sample rate to accept (default: 192000)
    #[serde(default = "default_alac_max")]
    pub alac_max: u32,

    /// Highest Atmos bitrate in kbps to accept (default: 2768)
    #[serde(default = "default_atmos_max")]
    pub atmos_max: u32,

    /// Highest music video height to accept (default: 2160)
    #[serde(default = "default_mv_max")]
    pub mv_max: u32,

    /// Music video audio preference
    #[serde(default)]
    pub mv_audio_type: MvAudioType,

    /// Tag playlist tracks with their album metadata instead of the playlist's
    #[serde(default)]
    pub use_song_info_for_playlist: bool,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            output_folder: default_output_folder(),
            concurrency: default_concurrency(),
            codec_priority: default_codec_priority(),
            aac_type: AacType::default(),
            alac_max: default_alac_max(),
            atmos_max: default_atmos_max(),
            mv_max: default_mv_max(),
            mv_audio_type: MvAudioType::default(),
            use_song_info_for_playlist: false,
        }
    }
}

impl DownloadConfig {
    /// Quality label used for Atmos downloads
    pub fn atmos_quality_label(&self) -> String {
        format!("{}Kbps", self.atmos_max.saturating_sub(2000))
    }
}

/// AAC flavour
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AacType {
    /// Stereo AAC from the enhanced manifest
    Aac,
    /// Binaural AAC
    AacBinaural,
    /// Downmixed AAC
    AacDownmix,
    /// Legacy AAC-LC stream fetched through the playback endpoint
    #[default]
    AacLc,
}

impl std::str::FromStr for AacType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "aac" => Ok(AacType::Aac),
            "aac-binaural" => Ok(AacType::AacBinaural),
            "aac-downmix" => Ok(AacType::AacDownmix),
            "aac-lc" => Ok(AacType::AacLc),
            other => Err(Error::Config {
                message: format!("unknown AAC type '{other}'"),
                key: Some("download.aac_type".into()),
            }),
        }
    }
}

/// Music video audio preference
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MvAudioType {
    /// Atmos, then AC-3, then stereo
    #[default]
    Atmos,
    /// AC-3, then stereo
    Ac3,
    /// Stereo only
    Aac,
}

impl MvAudioType {
    /// Audio group IDs acceptable for this preference, best first
    pub fn group_priority(&self) -> &'static [&'static str] {
        match self {
            MvAudioType::Atmos => &["audio-atmos", "audio-ac3", "audio-stereo-256"],
            MvAudioType::Ac3 => &["audio-ac3", "audio-stereo-256"],
            MvAudioType::Aac => &["audio-stereo-256"],
        }
    }
}

impl std::str::FromStr for MvAudioType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "atmos" => Ok(MvAudioType::Atmos),
            "ac3" => Ok(MvAudioType::Ac3),
            "aac" => Ok(MvAudioType::Aac),
            other => Err(Error::Config {
                message: format!("unknown music video audio type '{other}'"),
                key: Some("download.mv_audio_type".into()),
            }),
        }
    }
}

/// Folder and file name templates
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NamingConfig {
    /// Artist folder template; empty disables the artist level
    #[serde(default = "default_artist_folder_format")]
    pub artist_folder_format: String,

    /// Album folder template
    #[serde(default = "default_album_folder_format")]
    pub album_folder_format: String,

    /// Playlist and station folder template
    #[serde(default = "default_playlist_folder_format")]
    pub playlist_folder_format: String,

    /// Track file name template (extension is appended)
    #[serde(default = "default_song_file_format")]
    pub song_file_format: String,

    /// Maximum characters kept from catalog names (default: 200)
    #[serde(default = "default_limit_max")]
    pub limit_max: usize,

    /// `{Tag}` text for mastered-for-lossless releases
    #[serde(default)]
    pub apple_master_choice: String,

    /// `{Tag}` text for explicit releases
    #[serde(default = "default_explicit_choice")]
    pub explicit_choice: String,

    /// `{Tag}` text for clean releases
    #[serde(default)]
    pub clean_choice: String,
}

impl Default for NamingConfig {
    fn default() -> Self {
        Self {
            artist_folder_format: default_artist_folder_format(),
            album_folder_format: default_album_folder_format(),
            playlist_folder_format: default_playlist_folder_format(),
            song_file_format: default_song_file_format(),
            limit_max: default_limit_max(),
            apple_master_choice: String::new(),
            explicit_choice: default_explicit_choice(),
            clean_choice: String::new(),
        }
    }
}

/// Cover art handling
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ArtworkConfig {
    /// Image format to request
    #[serde(default)]
    pub cover_format: CoverFormat,

    /// `{w}x{h}` replacement (default: "5000x5000")
    #[serde(default = "default_cover_size")]
    pub cover_size: String,

    /// Embed the cover into each track
    #[serde(default = "default_true")]
    pub embed_cover: bool,

    /// Write the artist picture as `folder.<ext>` in the artist folder
    #[serde(default)]
    pub save_artist_cover: bool,

    /// Use each track's own album cover inside playlists and stations
    #[serde(default)]
    pub dl_albumcover_for_playlist: bool,
}

impl Default for ArtworkConfig {
    fn default() -> Self {
        Self {
            cover_format: CoverFormat::default(),
            cover_size: default_cover_size(),
            embed_cover: true,
            save_artist_cover: false,
            dl_albumcover_for_playlist: false,
        }
    }
}

/// Cover image format
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CoverFormat {
    /// JPEG
    #[default]
    Jpg,
    /// PNG
    Png,
    /// Untouched upload
    Original,
}

/// External tool paths
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Decryptor executable (auto-detected as `catalog-decrypt` if None)
    #[serde(default)]
    pub decryptor_path: Option<PathBuf>,

    /// MP4Box executable (auto-detected if None)
    #[serde(default)]
    pub mp4box_path: Option<PathBuf>,

    /// mp4decrypt executable (auto-detected if None)
    #[serde(default)]
    pub mp4decrypt_path: Option<PathBuf>,

    /// ffmpeg executable (auto-detected if None)
    #[serde(default)]
    pub ffmpeg_path: Option<PathBuf>,

    /// Whether to search PATH for external binaries if explicit paths not set (default: true)
    #[serde(default = "default_true")]
    pub search_path: bool,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            decryptor_path: None,
            mp4box_path: None,
            mp4decrypt_path: None,
            ffmpeg_path: None,
            search_path: true,
        }
    }
}

impl ToolsConfig {
    /// Resolve a tool from its explicit path or, if allowed, from PATH
    pub fn resolve(&self, explicit: Option<&PathBuf>, binary: &str) -> Option<PathBuf> {
        match explicit {
            Some(path) => Some(path.clone()),
            None if self.search_path => which::which(binary).ok(),
            None => None,
        }
    }
}

/// Post-download conversion
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConversionConfig {
    /// Convert after tagging
    #[serde(default)]
    pub enabled: bool,

    /// Target format: flac, mp3, opus, wav or copy
    #[serde(default = "default_convert_format")]
    pub format: String,

    /// Keep the source file next to the converted one
    #[serde(default)]
    pub keep_original: bool,

    /// Skip when the source already has the target extension
    #[serde(default = "default_true")]
    pub skip_if_source_match: bool,

    /// Warn when a lossy source is wrapped in a lossless container
    #[serde(default = "default_true")]
    pub warn_lossy_to_lossless: bool,

    /// Extra ffmpeg arguments, whitespace separated
    #[serde(default)]
    pub extra_args: String,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            format: default_convert_format(),
            keep_original: false,
            skip_if_source_match: true,
            warn_lossy_to_lossless: true,
            extra_args: String::new(),
        }
    }
}

impl ConversionConfig {
    /// Target extension when conversion will replace the source, else None
    ///
    /// This is the file whose existence marks a track as already downloaded.
    pub fn replacing_extension(&self) -> Option<String> {
        let format = self.format.trim().to_lowercase();
        if self.enabled && !format.is_empty() && format != "copy" && !self.keep_original {
            Some(format)
        } else {
            None
        }
    }
}

/// Retry configuration for transient catalog failures
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (default: 3)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Initial delay before first retry (default: 1 second)
    #[serde(default = "default_initial_delay", with = "duration_serde")]
    pub initial_delay: Duration,

    /// Maximum delay between retries (default: 30 seconds)
    #[serde(default = "default_max_delay", with = "duration_serde")]
    pub max_delay: Duration,

    /// Multiplier for exponential backoff (default: 2.0)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Add random jitter to delays (default: true)
    #[serde(default = "default_true")]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: true,
        }
    }
}

/// Main configuration for catalog-dl
///
/// Each sub-config maps to a TOML table of the same name:
///
/// ```toml
/// [catalog]
/// storefront = "us"
///
/// [download]
/// concurrency = 4
/// codec_priority = ["alac", "ec-3", "mp4a.40.2"]
/// ```
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Catalog service access
    #[serde(default)]
    pub catalog: CatalogConfig,

    /// Download behavior
    #[serde(default)]
    pub download: DownloadConfig,

    /// Folder and file naming
    #[serde(default)]
    pub naming: NamingConfig,

    /// Cover art
    #[serde(default)]
    pub artwork: ArtworkConfig,

    /// External tools
    #[serde(default)]
    pub tools: ToolsConfig,

    /// Post-download conversion
    #[serde(default)]
    pub conversion: ConversionConfig,

    /// Catalog request retries
    #[serde(default)]
    pub retry: RetryConfig,
}

impl Config {
    /// Load and validate a TOML configuration file
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| Error::Config {
            message: format!("cannot read {}: {e}", path.display()),
            key: None,
        })?;
        let config = Self::from_toml(&text)?;
        tracing::debug!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    /// Parse and validate a TOML document
    pub fn from_toml(text: &str) -> Result<Self> {
        let config: Config = toml::from_str(text).map_err(|e| Error::Config {
            message: e.to_string(),
            key: None,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the orchestrator cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.catalog.storefront.len() != 2 {
            return Err(Error::Config {
                message: format!(
                    "storefront must be a two-letter code, got '{}'",
                    self.catalog.storefront
                ),
                key: Some("catalog.storefront".into()),
            });
        }
        if self.download.concurrency == 0 {
            return Err(Error::Config {
                message: "concurrency must be at least 1".into(),
                key: Some("download.concurrency".into()),
            });
        }
        if self.download.codec_priority.is_empty() {
            return Err(Error::Config {
                message: "codec_priority must list at least one codec".into(),
                key: Some("download.codec_priority".into()),
            });
        }
        if self.naming.limit_max == 0 {
            return Err(Error::Config {
                message: "limit_max must be at least 1".into(),
                key: Some("naming.limit_max".into()),
            });
        }
        if self.conversion.enabled {
            let format = self.conversion.format.to_lowercase();
            if !matches!(format.as_str(), "flac" | "mp3" | "opus" | "wav" | "copy") {
                return Err(Error::Config {
                    message: format!("unsupported conversion format '{}'", self.conversion.format),
                    key: Some("conversion.format".into()),
                });
            }
        }
        Ok(())
    }
}

fn default_storefront() -> String {
    "us".into()
}

fn default_api_base_url() -> String {
    "https://amp-api.music.apple.com".into()
}

fn default_webplayback_url() -> String {
    "https://play.itunes.apple.com/WebObjects/MZPlay.woa/wa/webPlayback".into()
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_m3u8_port() -> String {
    "127.0.0.1:20020".into()
}

fn default_output_folder() -> PathBuf {
    PathBuf::from("output")
}

fn default_concurrency() -> usize {
    4
}

fn default_codec_priority() -> Vec<String> {
    vec![
        "alac".into(),
        "ec-3".into(),
        "ac-3".into(),
        "mp4a.40.2".into(),
    ]
}

fn default_alac_max() -> u32 {
    192_000
}

fn default_atmos_max() -> u32 {
    2768
}

fn default_mv_max() -> u32 {
    2160
}

fn default_artist_folder_format() -> String {
    "{UrlArtistName}".into()
}

fn default_album_folder_format() -> String {
    "{AlbumName}".into()
}

fn default_playlist_folder_format() -> String {
    "{PlaylistName}".into()
}

fn default_song_file_format() -> String {
    "{SongNumer}. {SongName}".into()
}

fn default_limit_max() -> usize {
    200
}

fn default_explicit_choice() -> String {
    "[E]".into()
}

fn default_cover_size() -> String {
    "5000x5000".into()
}

fn default_convert_format() -> String {
    "flac".into()
}

fn default_true() -> bool {
    true
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(30)
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

// Duration serialization helper
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

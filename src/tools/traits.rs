//! Traits and types for the external collaborators of a track job

use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Which kind of stream a fetch request points at
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreamKind {
    /// Media playlist from an enhanced (ALAC / Atmos / AAC) master playlist
    Enhanced,
    /// Legacy AAC-LC stream from the playback endpoint
    Legacy,
    /// Video or audio half of a music video
    MusicVideo,
}

impl StreamKind {
    /// Value passed to the decryptor's `--kind` flag
    pub fn as_arg(&self) -> &'static str {
        match self {
            StreamKind::Enhanced => "enhanced",
            StreamKind::Legacy => "legacy",
            StreamKind::MusicVideo => "music-video",
        }
    }
}

/// One fetch-and-decrypt request
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FetchRequest {
    /// Catalog ID of the track or music video
    pub track_id: String,
    /// Media playlist URL
    pub stream_url: String,
    /// Stream kind
    pub kind: StreamKind,
    /// Where the decrypted file is written
    pub destination: PathBuf,
}

/// What a decryptor implementation can do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecryptorCapabilities {
    /// Can fetch enhanced and legacy audio streams
    pub audio: bool,
    /// Can fetch music video streams (needs mp4decrypt)
    pub music_video: bool,
}

/// Fetches an encrypted stream and writes the decrypted media file
///
/// A stream the service refuses to deliver should be reported as
/// [`TrackError::VariantUnavailable`](crate::error::TrackError::VariantUnavailable);
/// every other failure counts as a download error.
#[async_trait]
pub trait Decryptor: Send + Sync {
    /// Fetch and decrypt `request.stream_url` into `request.destination`
    async fn fetch(&self, request: &FetchRequest) -> crate::Result<()>;

    /// Query capabilities of this implementation
    fn capabilities(&self) -> DecryptorCapabilities;

    /// Human-readable name for logging
    fn name(&self) -> &'static str;
}

/// Ordered `key=value` metadata for an MP4 file
///
/// Keys follow MP4Box `-itags` names (`title`, `artist`, `album`, `tracknum`,
/// `cover`, ...). Empty values are skipped.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TagSet {
    entries: Vec<(String, String)>,
}

impl TagSet {
    /// Tag set starting with an empty `tool` entry, which clears the encoder tag
    pub fn new() -> Self {
        Self {
            entries: vec![("tool".into(), String::new())],
        }
    }

    /// Append `key=value` unless the value is empty
    pub fn push(&mut self, key: &str, value: impl Into<String>) -> &mut Self {
        let value = value.into();
        if !value.is_empty() {
            self.entries.push((key.to_string(), value));
        }
        self
    }

    /// First value recorded for `key`
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Entries in insertion order
    pub fn entries(&self) -> &[(String, String)] {
        &self.entries
    }

    /// MP4Box `-itags` argument
    pub fn to_itags(&self) -> String {
        self.entries
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join(":")
    }
}

/// Writes metadata into MP4 files
#[async_trait]
pub trait Tagger: Send + Sync {
    /// Embed `tags` into the file at `path` in place
    async fn embed_tags(&self, path: &Path, tags: &TagSet) -> crate::Result<()>;

    /// Combine a video and an audio stream into `output`, tagging the result
    async fn mux(
        &self,
        video: &Path,
        audio: &Path,
        tags: &TagSet,
        output: &Path,
    ) -> crate::Result<()>;

    /// Human-readable name for logging
    fn name(&self) -> &'static str;
}

/// Transcodes finished tracks
#[async_trait]
pub trait Converter: Send + Sync {
    /// Convert `input` to `format` next to it and return the new path
    ///
    /// The source file is left in place; the caller decides whether to keep it.
    async fn convert(&self, input: &Path, format: &str, extra_args: &str)
    -> crate::Result<PathBuf>;

    /// Human-readable name for logging
    fn name(&self) -> &'static str;
}

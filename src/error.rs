//! Error types for catalog-dl
//!
//! Errors fall into two scopes:
//! - Entity-level errors ([`Error::MetadataFetch`], [`Error::Auth`], ...) are returned
//!   to the top-level caller and reported once.
//! - Track-level errors ([`TrackError`]) are recovered inside the worker that hit
//!   them and only surface through counters and the issue lists.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for catalog-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for catalog-dl
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "download.concurrency")
        key: Option<String>,
    },

    /// Entity metadata could not be fetched; aborts that entity only
    #[error("failed to fetch {kind} {id}: {reason}")]
    MetadataFetch {
        /// Entity kind as used in catalog paths ("albums", "playlists", ...)
        kind: String,
        /// Catalog ID of the entity
        id: String,
        /// Underlying failure
        reason: String,
    },

    /// Authorization rejected; invalidates every subsequent call in the run
    #[error("authorization failed: {0}")]
    Auth(String),

    /// Track-level failure
    #[error("track error: {0}")]
    Track(#[from] TrackError),

    /// Manifest could not be parsed as a master playlist
    #[error("manifest parse error: {0}")]
    ManifestParse(String),

    /// URL does not match any supported catalog URL shape
    #[error("invalid catalog URL: {0}")]
    InvalidUrl(String),

    /// Catalog answered with a non-success HTTP status
    #[error("catalog returned HTTP {status} for {url}")]
    CatalogStatus {
        /// HTTP status code
        status: u16,
        /// Request URL
        url: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Network error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// External tool execution failed (decryptor, MP4Box, ffmpeg)
    #[error("external tool error: {0}")]
    ExternalTool(String),

    /// Operation not supported (missing binary, missing token, ...)
    #[error("not supported: {0}")]
    NotSupported(String),

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// How a failed track is counted
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Severity {
    /// Counted as an error and eligible for retry
    Error,
    /// Counted as unavailable
    Unavailable,
    /// Counted as not-a-song
    NotSong,
}

/// Per-track failures, recovered locally by the worker
#[derive(Debug, Error)]
pub enum TrackError {
    /// No acceptable variant exists for the requested mode
    #[error("track {track_id} unavailable: {reason}")]
    VariantUnavailable {
        /// Catalog ID of the track
        track_id: String,
        /// Why no variant could be used
        reason: String,
    },

    /// Fetch/decrypt step failed
    #[error("download of track {track_id} failed: {reason}")]
    Download {
        /// Catalog ID of the track
        track_id: String,
        /// Underlying failure
        reason: String,
    },

    /// Tag embedding failed after a successful fetch
    #[error("tag embedding for track {track_id} failed: {reason}")]
    TagEmbed {
        /// Catalog ID of the track
        track_id: String,
        /// Underlying failure
        reason: String,
        /// Which counter the failure lands in
        severity: Severity,
    },

    /// Local filesystem operation failed
    #[error("filesystem error at {path}: {reason}")]
    FileSystem {
        /// Path involved in the failure
        path: PathBuf,
        /// Underlying failure
        reason: String,
        /// Which counter the failure lands in
        severity: Severity,
    },
}

impl TrackError {
    /// Counter this failure is reported against
    pub fn severity(&self) -> Severity {
        match self {
            TrackError::VariantUnavailable { .. } => Severity::Unavailable,
            TrackError::Download { .. } => Severity::Error,
            TrackError::TagEmbed { severity, .. } | TrackError::FileSystem { severity, .. } => {
                *severity
            }
        }
    }
}

impl Error {
    /// Machine-readable error code, used as a structured logging field
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::Config { .. } => "config_error",
            Error::MetadataFetch { .. } => "metadata_fetch",
            Error::Auth(_) => "auth_error",
            Error::Track(TrackError::VariantUnavailable { .. }) => "variant_unavailable",
            Error::Track(TrackError::Download { .. }) => "download_error",
            Error::Track(TrackError::TagEmbed { .. }) => "tag_embed_error",
            Error::Track(TrackError::FileSystem { .. }) => "filesystem_error",
            Error::ManifestParse(_) => "manifest_parse",
            Error::InvalidUrl(_) => "invalid_url",
            Error::CatalogStatus { .. } => "catalog_status",
            Error::Io(_) => "io_error",
            Error::Network(_) => "network_error",
            Error::Serialization(_) => "serialization_error",
            Error::ExternalTool(_) => "external_tool_error",
            Error::NotSupported(_) => "not_supported",
            Error::Other(_) => "internal_error",
        }
    }

    /// Whether this error must abort the whole run rather than a single entity
    pub fn aborts_run(&self) -> bool {
        matches!(self, Error::Auth(_))
    }

    pub(crate) fn metadata(kind: &str, id: &str, err: Error) -> Self {
        // Auth failures keep their identity so the run can stop on them.
        if err.aborts_run() {
            return err;
        }
        Error::MetadataFetch {
            kind: kind.to_string(),
            id: id.to_string(),
            reason: err.to_string(),
        }
    }
}

//! Cover art download
//!
//! Catalog artwork URLs are templates such as
//! `https://is1-ssl.mzstatic.com/image/thumb/Music/v4/aa/bb/source.jpg/{w}x{h}bb.jpg`.
//! The size placeholder is replaced by the configured size; PNG and
//! original-upload formats rewrite the URL further.

use std::path::{Path, PathBuf};

use crate::catalog::CatalogClient;
use crate::config::{ArtworkConfig, CoverFormat};
use crate::error::Result;

const SIZE_PLACEHOLDER: &str = "{w}x{h}";
const THUMB_HOST: &str = "is1-ssl.mzstatic.com/image/thumb";
const ORIGINAL_HOST: &str = "a5.mzstatic.com/us/r1000/0";

/// Extension of the written cover file
///
/// For the original format this is the extension of the uploaded source,
/// read from the second-to-last URL segment.
pub fn cover_extension(url: &str, config: &ArtworkConfig) -> String {
    match config.cover_format {
        CoverFormat::Jpg => "jpg".into(),
        CoverFormat::Png => "png".into(),
        CoverFormat::Original => {
            let source = url.rsplit('/').nth(1).unwrap_or_default();
            source
                .rsplit_once('.')
                .map(|(_, ext)| ext.to_string())
                .unwrap_or_else(|| "jpg".into())
        }
    }
}

/// Download URL for a cover template
pub fn cover_url(url: &str, config: &ArtworkConfig) -> String {
    let mut url = url.to_string();
    if config.cover_format == CoverFormat::Png {
        if let Some((head, tail)) = url.split_once(SIZE_PLACEHOLDER) {
            url = format!("{head}{SIZE_PLACEHOLDER}{}", tail.replacen(".jpg", ".png", 1));
        }
    }
    url = url.replacen(SIZE_PLACEHOLDER, &config.cover_size, 1);
    if config.cover_format == CoverFormat::Original {
        url = url.replacen(THUMB_HOST, ORIGINAL_HOST, 1);
        if let Some((head, _)) = url.rsplit_once('/') {
            url = head.to_string();
        }
    }
    url
}

/// Sized rendition in the source's own format, used when the original upload is refused
pub fn fallback_url(url: &str, extension: &str, config: &ArtworkConfig) -> String {
    let base = url.rsplit_once('.').map_or(url, |(head, _)| head);
    format!("{base}.{extension}").replacen(SIZE_PLACEHOLDER, &config.cover_size, 1)
}

/// Download a cover into `dir` as `<name>.<ext>` and return its path
///
/// An existing file with that name is replaced.
pub async fn write_cover(
    catalog: &dyn CatalogClient,
    dir: &Path,
    name: &str,
    url: &str,
    config: &ArtworkConfig,
) -> Result<PathBuf> {
    let extension = cover_extension(url, config);
    let path = dir.join(format!("{name}.{extension}"));
    if tokio::fs::try_exists(&path).await? {
        tokio::fs::remove_file(&path).await?;
    }

    let bytes = match catalog.fetch_bytes(&cover_url(url, config)).await {
        Ok(bytes) => bytes,
        Err(e) if config.cover_format == CoverFormat::Original => {
            let fallback = fallback_url(url, &extension, config);
            tracing::warn!(error = %e, fallback = %fallback, "original cover unavailable, using sized rendition");
            catalog.fetch_bytes(&fallback).await?
        }
        Err(e) => return Err(e),
    };

    tokio::fs::write(&path, bytes).await?;
    tracing::debug!(path = %path.display(), "cover written");
    Ok(path)
}

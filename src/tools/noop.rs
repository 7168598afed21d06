//! Stand-ins used when an external binary is unavailable

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use super::traits::{Converter, Decryptor, DecryptorCapabilities, FetchRequest, TagSet, Tagger};

/// Decryptor used when no decryptor binary is configured or found
///
/// Every fetch fails with `Error::NotSupported`, so tracks are counted as
/// errors and can be retried once the binary is installed.
pub struct NoOpDecryptor;

#[async_trait]
impl Decryptor for NoOpDecryptor {
    async fn fetch(&self, _request: &FetchRequest) -> crate::Result<()> {
        Err(crate::Error::NotSupported(
            "fetching requires the catalog-decrypt binary. \
             Configure tools.decryptor_path or ensure it is in PATH."
                .into(),
        ))
    }

    fn capabilities(&self) -> DecryptorCapabilities {
        DecryptorCapabilities {
            audio: false,
            music_video: false,
        }
    }

    fn name(&self) -> &'static str {
        "noop"
    }
}

/// Tagger used when MP4Box is unavailable
pub struct NoOpTagger;

#[async_trait]
impl Tagger for NoOpTagger {
    async fn embed_tags(&self, _path: &Path, _tags: &TagSet) -> crate::Result<()> {
        Err(crate::Error::NotSupported(
            "tag embedding requires MP4Box. \
             Configure tools.mp4box_path or ensure MP4Box is in PATH."
                .into(),
        ))
    }

    async fn mux(
        &self,
        _video: &Path,
        _audio: &Path,
        _tags: &TagSet,
        _output: &Path,
    ) -> crate::Result<()> {
        Err(crate::Error::NotSupported(
            "music video muxing requires MP4Box".into(),
        ))
    }

    fn name(&self) -> &'static str {
        "noop"
    }
}

/// Converter used when ffmpeg is unavailable; conversion is then skipped
pub struct NoOpConverter;

#[async_trait]
impl Converter for NoOpConverter {
    async fn convert(&self, _input: &Path, _format: &str, _extra_args: &str) -> crate::Result<PathBuf> {
        Err(crate::Error::NotSupported(
            "conversion requires ffmpeg. \
             Configure tools.ffmpeg_path or ensure ffmpeg is in PATH."
                .into(),
        ))
    }

    fn name(&self) -> &'static str {
        "noop"
    }
}

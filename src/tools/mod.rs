//! External collaborators of a track job
//!
//! Fetching and decrypting, tag embedding and conversion each sit behind a
//! trait so the orchestrator can be driven by real binaries or by test doubles:
//!
//! - [`Decryptor`]: [`CliDecryptor`] or [`NoOpDecryptor`]
//! - [`Tagger`]: [`Mp4BoxTagger`] or [`NoOpTagger`]
//! - [`Converter`]: [`FfmpegConverter`] or [`NoOpConverter`]
//!
//! [`ToolSet::discover`] picks the implementation for each from the
//! configuration, falling back to the no-op variant when a binary is missing.

mod cli;
mod ffmpeg;
mod noop;
mod traits;

use std::sync::Arc;

pub use cli::{CliDecryptor, Mp4BoxTagger};
pub use ffmpeg::{ConversionPlan, FfmpegConverter, build_ffmpeg_args, is_lossy_source, plan_conversion};
pub use noop::{NoOpConverter, NoOpDecryptor, NoOpTagger};
pub use traits::{
    Converter, Decryptor, DecryptorCapabilities, FetchRequest, StreamKind, TagSet, Tagger,
};

use crate::config::Config;

/// The three tool implementations used by a run
#[derive(Clone)]
pub struct ToolSet {
    /// Fetch and decrypt
    pub decryptor: Arc<dyn Decryptor>,
    /// Tag embedding and muxing
    pub tagger: Arc<dyn Tagger>,
    /// Optional conversion
    pub converter: Arc<dyn Converter>,
}

impl ToolSet {
    /// Resolve each tool from explicit paths or PATH, falling back to no-ops
    pub fn discover(config: &Config) -> Self {
        let tools = &config.tools;

        let decryptor: Arc<dyn Decryptor> =
            match tools.resolve(tools.decryptor_path.as_ref(), "catalog-decrypt") {
                Some(path) => Arc::new(
                    CliDecryptor::new(path)
                        .with_mp4decrypt(
                            tools.resolve(tools.mp4decrypt_path.as_ref(), "mp4decrypt"),
                        )
                        .with_tokens(
                            config.catalog.bearer_token(),
                            config.catalog.media_user_token().map(str::to_string),
                        ),
                ),
                None => Arc::new(NoOpDecryptor),
            };

        let tagger: Arc<dyn Tagger> = match tools.resolve(tools.mp4box_path.as_ref(), "MP4Box") {
            Some(path) => Arc::new(Mp4BoxTagger::new(path)),
            None => Arc::new(NoOpTagger),
        };

        let converter: Arc<dyn Converter> =
            match tools.resolve(tools.ffmpeg_path.as_ref(), "ffmpeg") {
                Some(path) => Arc::new(FfmpegConverter::new(path)),
                None => Arc::new(NoOpConverter),
            };

        tracing::info!(
            decryptor = decryptor.name(),
            tagger = tagger.name(),
            converter = converter.name(),
            "external tools resolved"
        );
        Self {
            decryptor,
            tagger,
            converter,
        }
    }
}

//! Post-download conversion through ffmpeg

use async_trait::async_trait;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tokio::process::Command;

use super::traits::Converter;
use crate::config::ConversionConfig;
use crate::error::{Error, Result};

/// Converter that shells out to ffmpeg
pub struct FfmpegConverter {
    binary_path: PathBuf,
}

impl FfmpegConverter {
    /// Create a converter with an explicit binary path
    pub fn new(binary_path: PathBuf) -> Self {
        Self { binary_path }
    }

    /// Attempt to find ffmpeg in PATH
    pub fn from_path() -> Option<Self> {
        which::which("ffmpeg").ok().map(Self::new)
    }
}

#[async_trait]
impl Converter for FfmpegConverter {
    async fn convert(&self, input: &Path, format: &str, extra_args: &str) -> Result<PathBuf> {
        let output_path = input.with_extension(format);
        let args = build_ffmpeg_args(input, &output_path, format, extra_args)?;

        let started = std::time::Instant::now();
        let output = Command::new(&self.binary_path)
            .args(&args)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| Error::ExternalTool(format!("Failed to execute ffmpeg: {}", e)))?;
        if !output.status.success() {
            return Err(Error::ExternalTool(format!(
                "ffmpeg exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        tracing::info!(
            output = %output_path.display(),
            elapsed_ms = started.elapsed().as_millis(),
            "conversion completed"
        );
        Ok(output_path)
    }

    fn name(&self) -> &'static str {
        "ffmpeg"
    }
}

/// Argument list for converting `input` to `output` in `format`
///
/// `extra_args` is split on whitespace and inserted before the output path.
pub fn build_ffmpeg_args(
    input: &Path,
    output: &Path,
    format: &str,
    extra_args: &str,
) -> Result<Vec<OsString>> {
    let codec_args: &[&str] = match format {
        "flac" => &["-c:a", "flac"],
        "mp3" => &["-c:a", "libmp3lame", "-qscale:a", "2"],
        "opus" => &["-c:a", "libopus", "-b:a", "192k", "-vbr", "on"],
        "wav" => &["-c:a", "pcm_s16le"],
        "copy" => &["-c", "copy"],
        other => {
            return Err(Error::Config {
                message: format!("unsupported conversion format '{other}'"),
                key: Some("conversion.format".into()),
            });
        }
    };

    let mut args: Vec<OsString> = vec!["-y".into(), "-i".into(), input.into(), "-vn".into()];
    args.extend(codec_args.iter().map(OsString::from));
    args.extend(extra_args.split_whitespace().map(OsString::from));
    args.push(output.into());
    Ok(args)
}

/// Whether a file with this extension and codec label holds lossy audio
pub fn is_lossy_source(extension: &str, codec_label: &str) -> bool {
    match extension.to_lowercase().as_str() {
        "m4a" => codec_label.contains("AAC") || codec_label.contains("ATMOS"),
        "mp3" | "opus" | "ogg" => true,
        _ => false,
    }
}

/// What the conversion step should do with a finished track
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConversionPlan {
    /// Leave the file as it is
    Skip(&'static str),
    /// Convert to `format`
    Convert {
        /// Target format
        format: String,
        /// Target is lossless but the source is lossy
        lossy_to_lossless: bool,
    },
}

/// Decide whether and how to convert `source`
pub fn plan_conversion(config: &ConversionConfig, source: &Path, codec_label: &str) -> ConversionPlan {
    let format = config.format.trim().to_lowercase();
    if !config.enabled || format.is_empty() {
        return ConversionPlan::Skip("conversion disabled");
    }
    if format == "copy" {
        return ConversionPlan::Skip("copy produces no new format");
    }
    let extension = source
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    if config.skip_if_source_match && extension == format {
        return ConversionPlan::Skip("source already has the target format");
    }
    let lossy_to_lossless = config.warn_lossy_to_lossless
        && matches!(format.as_str(), "flac" | "wav")
        && is_lossy_source(&extension, codec_label);
    ConversionPlan::Convert {
        format,
        lossy_to_lossless,
    }
}

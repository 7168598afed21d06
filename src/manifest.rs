//! Master playlist parsing
//!
//! Audio master playlists are parsed into [`VariantGroups`] for the resolver.
//! Music video master playlists additionally yield one video stream (bounded by
//! height) and one audio alternative (chosen by group and rank).

use hls_m3u8::{MasterPlaylist as HlsMasterPlaylist, tags::VariantStream as HlsVariantStreamTag};
use regex::Regex;
use std::sync::LazyLock;
use url::Url;

use crate::config::DownloadConfig;
use crate::error::{Error, Result};
use crate::resolver::{Variant, VariantGroups, group_by_codec};

#[allow(clippy::expect_used)]
static RESOLUTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"_(\d+)x(\d+)").expect("valid regex"));
#[allow(clippy::expect_used)]
static RANK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"_gr(\d+)_").expect("valid regex"));

/// Upper bounds applied to variants before resolution
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VariantLimits {
    /// Highest ALAC sample rate in Hz
    pub alac_max: u32,
    /// Highest Atmos bitrate in kbps
    pub atmos_max: u32,
}

impl VariantLimits {
    /// No filtering
    pub fn unlimited() -> Self {
        Self {
            alac_max: u32::MAX,
            atmos_max: u32::MAX,
        }
    }

    fn accepts(&self, variant: &Variant) -> bool {
        let Some(group) = variant.audio_group.as_deref() else {
            return true;
        };
        match variant.codec.as_str() {
            "alac" => alac_group_params(group).is_none_or(|(rate, _)| rate <= self.alac_max),
            "ec-3" if group.contains("atmos") => {
                trailing_number(group).is_none_or(|kbps| kbps <= self.atmos_max)
            }
            _ => true,
        }
    }
}

impl From<&DownloadConfig> for VariantLimits {
    fn from(config: &DownloadConfig) -> Self {
        Self {
            alac_max: config.alac_max,
            atmos_max: config.atmos_max,
        }
    }
}

/// Parse an audio master playlist into variants grouped by codec
///
/// Variant URIs are resolved against `base`. Variants over `limits` are dropped.
pub fn parse_master_playlist(
    data: &[u8],
    base: &Url,
    limits: &VariantLimits,
) -> Result<VariantGroups> {
    let variants = parse_variants(data, base)?
        .into_iter()
        .filter(|v| limits.accepts(v))
        .collect();
    Ok(group_by_codec(variants))
}

fn parse_variants(data: &[u8], base: &Url) -> Result<Vec<Variant>> {
    let input = std::str::from_utf8(data).map_err(|e| Error::ManifestParse(e.to_string()))?;
    let master = HlsMasterPlaylist::try_from(input)
        .map_err(|e| Error::ManifestParse(format!("not a master playlist: {e}")))?;

    let mut variants = Vec::new();
    for stream in &master.variant_streams {
        // I-frame streams carry no audio
        let HlsVariantStreamTag::ExtXStreamInf {
            uri,
            audio,
            stream_data,
            ..
        } = stream
        else {
            continue;
        };
        let codec = stream_data
            .codecs()
            .map(|c| c.to_string().trim_matches('"').to_string())
            .unwrap_or_default();
        let bandwidth = stream_data.bandwidth();
        variants.push(Variant {
            codec,
            audio_group: audio.as_ref().map(|a| a.to_string()),
            bandwidth,
            average_bandwidth: stream_data.average_bandwidth().unwrap_or(bandwidth),
            uri: resolve_uri(base, uri)?,
        });
    }
    Ok(variants)
}

/// Human-readable quality of a variant, derived from its audio group ID
///
/// `audio-alac-stereo-96000-24` gives `24B-96.0kHz`, `audio-atmos-2768` gives
/// `768Kbps`, `audio-stereo-256` gives `256Kbps`.
pub fn quality_label(variant: &Variant) -> Option<String> {
    let group = variant.audio_group.as_deref()?;
    match variant.codec.as_str() {
        "alac" => {
            let (rate, depth) = alac_group_params(group)?;
            Some(format!("{depth}B-{:.1}kHz", f64::from(rate) / 1000.0))
        }
        "ec-3" | "ac-3" => {
            let raw = group.rsplit('-').next()?;
            // Atmos groups encode the bitrate with a leading "2" (2768 -> 768)
            let digits = match raw.strip_prefix('2') {
                Some(rest) if raw.len() == 4 => rest,
                _ => raw,
            };
            let kbps: u32 = digits.parse().ok()?;
            Some(format!("{kbps}Kbps"))
        }
        _ => trailing_number(group).map(|kbps| format!("{kbps}Kbps")),
    }
}

/// Pick the highest-bandwidth video stream no taller than `max_height`
pub fn select_video_uri(data: &[u8], base: &Url, max_height: u32) -> Result<String> {
    let mut variants = parse_variants(data, base)?;
    variants.sort_by(|a, b| b.average_bandwidth.cmp(&a.average_bandwidth));

    variants
        .iter()
        .find(|v| {
            RESOLUTION_RE
                .captures(&v.uri)
                .and_then(|caps| caps[2].parse::<u32>().ok())
                .is_some_and(|height| height <= max_height)
        })
        .map(|v| v.uri.clone())
        .ok_or_else(|| Error::ManifestParse("no suitable video stream found".into()))
}

/// Pick the audio alternative with the highest rank among `groups`
///
/// Rank is the `_gr<N>_` number embedded in the alternative's URI; alternatives
/// without one are ignored.
pub fn select_mv_audio_uri(text: &str, base: &Url, groups: &[&str]) -> Result<String> {
    let master = HlsMasterPlaylist::try_from(text)
        .map_err(|e| Error::ManifestParse(format!("not a master playlist: {e}")))?;

    let mut best: Option<(u32, &str)> = None;
    for media in &master.media {
        let group_id: &str = media.group_id();
        if !groups.contains(&group_id) {
            continue;
        }
        let Some(uri) = media.uri() else {
            continue;
        };
        let uri: &str = uri;
        let Some(rank) = RANK_RE
            .captures(uri)
            .and_then(|caps| caps[1].parse::<u32>().ok())
        else {
            continue;
        };
        if best.is_none_or(|(best_rank, _)| rank > best_rank) {
            best = Some((rank, uri));
        }
    }

    let (_, uri) =
        best.ok_or_else(|| Error::ManifestParse("no suitable audio stream found".into()))?;
    resolve_uri(base, uri)
}

fn resolve_uri(base: &Url, uri: &str) -> Result<String> {
    base.join(uri)
        .map(|u| u.to_string())
        .map_err(|e| Error::ManifestParse(format!("bad variant URI {uri}: {e}")))
}

/// (sample rate, bit depth) from `audio-alac-stereo-<rate>-<depth>`
fn alac_group_params(group: &str) -> Option<(u32, u32)> {
    let mut parts = group.rsplit('-');
    let depth = parts.next()?.parse().ok()?;
    let rate = parts.next()?.parse().ok()?;
    Some((rate, depth))
}

fn trailing_number(group: &str) -> Option<u32> {
    group.rsplit('-').next()?.parse().ok()
}

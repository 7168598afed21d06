//! Codec priority resolution
//!
//! Given the variants of a master playlist grouped by codec (each group ordered
//! by descending average bandwidth) and an ordered codec priority list, pick the
//! first variant of the first priority codec that has one.

use std::collections::HashMap;

use crate::types::CodecMode;

/// One audio rendition from a master playlist
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Variant {
    /// Codec string, e.g. "alac", "ec-3", "mp4a.40.2"
    pub codec: String,
    /// Audio group ID, e.g. "audio-alac-stereo-96000-24"
    pub audio_group: Option<String>,
    /// Peak bandwidth in bits per second
    pub bandwidth: u64,
    /// Average bandwidth in bits per second (peak bandwidth when not advertised)
    pub average_bandwidth: u64,
    /// Absolute URI of the media playlist
    pub uri: String,
}

/// Variants keyed by codec, each list ordered by descending average bandwidth
pub type VariantGroups = HashMap<String, Vec<Variant>>;

/// The variant chosen for a track and the codec mode it implies
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Resolution {
    /// Chosen variant
    pub variant: Variant,
    /// Codec family of the chosen variant
    pub mode: CodecMode,
}

/// Group variants by codec, keeping each group ordered by descending average bandwidth
///
/// The sort is stable, so variants with equal bandwidth keep manifest order.
pub fn group_by_codec(mut variants: Vec<Variant>) -> VariantGroups {
    variants.sort_by(|a, b| b.average_bandwidth.cmp(&a.average_bandwidth));

    let mut groups = VariantGroups::new();
    for variant in variants {
        groups.entry(variant.codec.clone()).or_default().push(variant);
    }
    groups
}

/// Pick the best variant for the first codec in `priority` that has any
///
/// Returns None when no priority codec is present.
pub fn resolve<S: AsRef<str>>(groups: &VariantGroups, priority: &[S]) -> Option<Resolution> {
    priority.iter().find_map(|codec| {
        let codec = codec.as_ref();
        groups
            .get(codec)
            .and_then(|group| group.first())
            .map(|variant| Resolution {
                variant: variant.clone(),
                mode: CodecMode::from_codec(codec),
            })
    })
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn variant(codec: &str, average_bandwidth: u64, uri: &str) -> Variant {
        Variant {
            codec: codec.into(),
            audio_group: None,
            bandwidth: average_bandwidth,
            average_bandwidth,
            uri: uri.into(),
        }
    }

    #[test]
    fn first_priority_codec_present_wins() {
        let groups = group_by_codec(vec![
            variant("ec-3", 2_768_000, "atmos.m3u8"),
            variant("mp4a.40.2", 256_000, "aac.m3u8"),
        ]);

        let resolution = resolve(&groups, &["alac", "ec-3", "mp4a.40.2"]).unwrap();
        assert_eq!(resolution.variant.uri, "atmos.m3u8");
        assert_eq!(
            resolution.mode,
            CodecMode::Atmos,
            "alac is absent, so ec-3 is chosen and implies Atmos"
        );
    }

    #[test]
    fn highest_average_bandwidth_within_codec_wins() {
        let groups = group_by_codec(vec![
            variant("alac", 1_500_000, "alac-48.m3u8"),
            variant("alac", 4_600_000, "alac-192.m3u8"),
            variant("alac", 2_300_000, "alac-96.m3u8"),
        ]);

        let resolution = resolve(&groups, &["alac"]).unwrap();
        assert_eq!(resolution.variant.uri, "alac-192.m3u8");
        assert_eq!(resolution.mode, CodecMode::Alac);

        let order: Vec<_> = groups["alac"].iter().map(|v| v.uri.as_str()).collect();
        assert_eq!(order, vec!["alac-192.m3u8", "alac-96.m3u8", "alac-48.m3u8"]);
    }

    #[test]
    fn equal_bandwidth_keeps_manifest_order() {
        let groups = group_by_codec(vec![
            variant("mp4a.40.2", 256_000, "first.m3u8"),
            variant("mp4a.40.2", 256_000, "second.m3u8"),
        ]);
        let resolution = resolve(&groups, &["mp4a.40.2"]).unwrap();
        assert_eq!(resolution.variant.uri, "first.m3u8");
    }

    #[test]
    fn no_priority_codec_present_resolves_to_none() {
        let groups = group_by_codec(vec![variant("mp4a.40.2", 256_000, "aac.m3u8")]);
        assert!(resolve(&groups, &["alac", "ec-3"]).is_none());
        assert!(resolve::<&str>(&groups, &[]).is_none());
        assert!(resolve(&VariantGroups::new(), &["alac"]).is_none());
    }
}

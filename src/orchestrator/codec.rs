//! Codec choice for a batch
//!
//! The quality request decides the plan directly for Atmos and AAC-LC. For
//! the other requests the first track's manifest is probed once per entity;
//! the resolved codec then names the folders and steers every track.

use url::Url;

use super::{Orchestrator, Services};
use crate::catalog::CatalogClient;
use crate::config::{AacType, DownloadConfig};
use crate::error::{Error, Result};
use crate::manifest::{VariantLimits, parse_master_playlist, quality_label};
use crate::resolver::{Resolution, resolve};
use crate::types::{CodecMode, QualityRequest, TrackInfo, TrackKind};

const ATMOS_CODECS: [&str; 2] = ["ec-3", "ac-3"];
const AAC_CODEC: &str = "mp4a.40.2";
const LEGACY_QUALITY: &str = "256Kbps";

/// Codec decision shared by every track of an entity
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct CodecPlan {
    /// Request tracks are resolved with
    pub(crate) request: QualityRequest,
    /// Codec family used for `{Codec}`
    pub(crate) codec: CodecMode,
    /// `{Quality}` text, empty when unknown
    pub(crate) quality: String,
}

impl CodecPlan {
    /// Plan derived from the request alone, without probing
    pub(crate) fn for_request(request: QualityRequest, download: &DownloadConfig) -> Self {
        match request {
            QualityRequest::Atmos => Self {
                request,
                codec: CodecMode::Atmos,
                quality: download.atmos_quality_label(),
            },
            QualityRequest::Aac => Self {
                request,
                codec: CodecMode::Aac,
                quality: if download.aac_type == AacType::AacLc {
                    LEGACY_QUALITY.into()
                } else {
                    String::new()
                },
            },
            QualityRequest::Best => Self {
                request,
                codec: CodecMode::Alac,
                quality: String::new(),
            },
        }
    }

    fn legacy_aac() -> Self {
        Self {
            request: QualityRequest::Aac,
            codec: CodecMode::Aac,
            quality: LEGACY_QUALITY.into(),
        }
    }

    /// `{Codec}` label
    pub(crate) fn label(&self) -> &'static str {
        self.codec.label()
    }

    /// Whether tracks go through the legacy AAC-LC stream
    pub(crate) fn legacy(&self, download: &DownloadConfig) -> bool {
        self.request == QualityRequest::Aac && download.aac_type == AacType::AacLc
    }

    /// Codec priority tracks are resolved against
    pub(crate) fn priority(&self, download: &DownloadConfig) -> Vec<String> {
        codec_priority(self.request, download)
    }
}

/// Priority list for a quality request
///
/// Atmos keeps the configured order of the Atmos-class codecs, falling back to
/// E-AC-3 then AC-3 when the configuration lists neither.
pub(crate) fn codec_priority(request: QualityRequest, download: &DownloadConfig) -> Vec<String> {
    match request {
        QualityRequest::Best => download.codec_priority.clone(),
        QualityRequest::Aac => vec![AAC_CODEC.to_string()],
        QualityRequest::Atmos => {
            let configured: Vec<String> = download
                .codec_priority
                .iter()
                .filter(|c| ATMOS_CODECS.contains(&c.as_str()))
                .cloned()
                .collect();
            if configured.is_empty() {
                ATMOS_CODECS.iter().map(|c| c.to_string()).collect()
            } else {
                configured
            }
        }
    }
}

/// Master playlist URL for a track, asking the device agent when it applies
///
/// None when the track has no enhanced manifest.
pub(crate) async fn master_url(services: &Services, track: &TrackInfo) -> Option<String> {
    let catalog_url = track.enhanced_hls.clone()?;
    if let Some(agent) = services.device.as_ref().filter(|a| a.applies_to(track)) {
        match agent.master_playlist_url(&track.id).await {
            Ok(Some(url)) => return Some(url),
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(track_id = %track.id, error = %e, "device agent lookup failed, using catalog manifest");
            }
        }
    }
    Some(catalog_url)
}

/// Fetch a master playlist and pick the variant for `priority`
pub(crate) async fn resolve_manifest(
    catalog: &dyn CatalogClient,
    url: &str,
    download: &DownloadConfig,
    priority: &[String],
) -> Result<Option<Resolution>> {
    let base =
        Url::parse(url).map_err(|e| Error::ManifestParse(format!("bad manifest URL {url}: {e}")))?;
    let text = catalog.fetch_text(url).await?;
    let groups = parse_master_playlist(text.as_bytes(), &base, &VariantLimits::from(download))?;
    Ok(resolve(&groups, priority))
}

impl Orchestrator {
    /// Decide the codec plan for an entity whose first track is `first`
    pub(super) async fn plan_codec(&self, first: Option<&TrackInfo>) -> CodecPlan {
        let download = &self.config.download;
        let request = self.options.quality;
        let fixed = CodecPlan::for_request(request, download);
        if request == QualityRequest::Atmos || fixed.legacy(download) {
            return fixed;
        }

        let Some(track) = first.filter(|t| t.kind == TrackKind::Song) else {
            return fixed;
        };
        let Some(url) = master_url(&self.services, track).await else {
            tracing::debug!(track_id = %track.id, "no enhanced manifest, planning AAC");
            return CodecPlan::legacy_aac();
        };

        let priority = codec_priority(request, download);
        match resolve_manifest(self.services.catalog.as_ref(), &url, download, &priority).await {
            Ok(Some(resolution)) => {
                let request = match resolution.mode {
                    CodecMode::Atmos => QualityRequest::Atmos,
                    CodecMode::Aac => QualityRequest::Aac,
                    CodecMode::Alac => QualityRequest::Best,
                };
                let quality = if resolution.mode == CodecMode::Aac
                    && download.aac_type == AacType::AacLc
                {
                    LEGACY_QUALITY.to_string()
                } else {
                    quality_label(&resolution.variant).unwrap_or_default()
                };
                CodecPlan {
                    request,
                    codec: resolution.mode,
                    quality,
                }
            }
            Ok(None) => {
                tracing::debug!(track_id = %track.id, ?priority, "no priority codec offered, planning AAC");
                CodecPlan::legacy_aac()
            }
            Err(e) => {
                tracing::warn!(track_id = %track.id, error = %e, "codec probe failed");
                fixed
            }
        }
    }
}

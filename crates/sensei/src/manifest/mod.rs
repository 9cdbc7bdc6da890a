//! Turns lecture video descriptors into selectable renditions.
//!
//! Encrypted lectures are described by DASH manifests. Every distinct video height becomes one
//! [DashVariant] that knows how to address the segments of its video and audio tracks. Clear
//! lectures come as progressive files and HLS master playlists.

pub mod dash;
pub mod hls;
pub mod template;
pub mod base_url;

use reqwest::header::ACCEPT;
use url::Url;

use crate::{
    asset::{ClearSource, VideoAsset, VideoSources},
    config::SegmentEstimate,
    error::{SenseiError, SenseiResult},
    media::{DashVariant, HlsRendition, MediaAsset, Rendition, SegmentPlan},
    HttpClient,
};

pub use crate::quality::select_rendition;

const DASH_ACCEPT: &str = "application/dash+xml,video/vnd.mpeg.dash.mpd";
const HLS_ACCEPT: &str = "application/x-mpegurl,application/vnd.apple.mpegurl";

#[derive(Clone)]
pub struct ManifestResolver {
    client: HttpClient,
    estimate: SegmentEstimate,
}

impl ManifestResolver {
    pub fn new(client: HttpClient, estimate: SegmentEstimate) -> Self {
        Self { client, estimate }
    }

    /// Resolves every source of a video asset.
    ///
    /// A source that can not be fetched or parsed is logged and contributes nothing.
    pub async fn resolve(&self, asset: &VideoAsset, skip_hls: bool) -> MediaAsset {
        let mut renditions = Vec::new();

        match &asset.sources {
            VideoSources::Encrypted(manifests) => {
                for manifest in manifests {
                    match self.resolve_dash(manifest).await {
                        Ok(variants) => {
                            renditions.extend(variants.into_iter().map(Rendition::Dash))
                        }
                        Err(e) => tracing::error!("Failed to resolve DASH manifest {manifest}: {e}"),
                    }
                }
            }
            VideoSources::Clear(sources) => {
                for source in sources {
                    match source {
                        ClearSource::Progressive(rendition) => {
                            renditions.push(Rendition::Progressive(rendition.clone()))
                        }
                        ClearSource::Hls(_) if skip_hls => {
                            tracing::debug!("Skipping HLS source of asset {}", asset.id)
                        }
                        ClearSource::Hls(playlist) => match self.resolve_hls(playlist).await {
                            Ok(variants) => {
                                renditions.extend(variants.into_iter().map(Rendition::Segmented))
                            }
                            Err(e) => {
                                tracing::error!("Failed to resolve HLS playlist {playlist}: {e}")
                            }
                        },
                    }
                }
            }
        }

        MediaAsset {
            id: asset.id,
            encrypted: asset.is_encrypted(),
            renditions,
        }
    }

    pub async fn resolve_dash(&self, url: &Url) -> SenseiResult<Vec<DashVariant>> {
        let (url, text) = self.fetch_text(url, DASH_ACCEPT).await?;
        let manifest = dash::Manifest::parse(&text)?;
        if let Some(kid) = manifest.default_kid() {
            tracing::debug!("Manifest {url} announces default KID {kid}");
        }

        let variants = manifest.variants(&url, &self.estimate)?;
        tracing::debug!("Found {} DASH variants in {url}", variants.len());
        Ok(variants)
    }

    pub async fn resolve_hls(&self, url: &Url) -> SenseiResult<Vec<HlsRendition>> {
        let (url, text) = self.fetch_text(url, HLS_ACCEPT).await?;
        hls::parse_master(text.as_bytes(), &url)
    }

    /// Loads the segment list of one HLS variant.
    pub async fn media_playlist(&self, rendition: &HlsRendition) -> SenseiResult<SegmentPlan> {
        let (url, text) = self.fetch_text(&rendition.playlist, HLS_ACCEPT).await?;
        hls::parse_media(text.as_bytes(), &url)
    }

    /// Returns the body together with the final url after redirects.
    async fn fetch_text(
        &self,
        url: &Url,
        accept: &str,
    ) -> SenseiResult<(Url, String)> {
        let response = self
            .client
            .get(url.clone())
            .header(ACCEPT, accept)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(SenseiError::HttpError(response.status()));
        }

        let url = response.url().clone();
        Ok((url, response.text().await?))
    }
}

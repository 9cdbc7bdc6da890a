use url::Url;

use crate::{
    catalog::{Lecture, RawAsset, RawCaption, RawStreamSource},
    media::{width_for_height, ProgressiveRendition},
    util::path::sanitize_filename,
};

const DASH_MIME: &str = "application/dash+xml";
const HLS_MIME: &str = "application/x-mpegURL";

#[derive(Debug, Clone, PartialEq)]
pub enum Asset {
    Video(VideoAsset),
    Article(Article),
    File(Attachment),
    Ebook(Attachment),
    Presentation(Attachment),
    Audio(Attachment),
    ExternalLink(ExternalLink),
    Unsupported(String),
}

impl Asset {
    pub fn attachment(&self) -> Option<&Attachment> {
        match self {
            Asset::File(a) | Asset::Ebook(a) | Asset::Presentation(a) | Asset::Audio(a) => Some(a),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VideoAsset {
    pub id: u64,
    pub sources: VideoSources,
    pub captions: Vec<Caption>,
}

impl VideoAsset {
    pub fn is_encrypted(&self) -> bool {
        matches!(self.sources, VideoSources::Encrypted(_))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum VideoSources {
    /// Plain `stream_urls.Video` entries.
    Clear(Vec<ClearSource>),
    /// DASH manifests of the media license path.
    Encrypted(Vec<Url>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ClearSource {
    Progressive(ProgressiveRendition),
    /// Master playlist, expanded into variants by the resolver.
    Hls(Url),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Article {
    pub id: u64,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Attachment {
    pub id: u64,
    pub filename: String,
    pub url: Url,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExternalLink {
    pub id: u64,
    pub title: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Caption {
    pub language: String,
    /// `vtt` or `srt`.
    pub extension: String,
    pub url: Url,
}

/// A lecture's main asset and the attachments that come with it.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedLecture {
    pub main: Option<Asset>,
    pub attachments: Vec<Asset>,
}

impl ParsedLecture {
    pub fn parse(lecture: &Lecture) -> Self {
        let main = lecture
            .asset
            .as_ref()
            .map(|asset| asset.parse(lecture.index));
        let attachments = lecture
            .supplementary_assets
            .iter()
            .map(|asset| asset.parse_supplementary(lecture.index))
            .collect();

        Self { main, attachments }
    }
}

impl RawAsset {
    /// Interprets the main asset of the lecture at `index`.
    pub fn parse(&self, index: u32) -> Asset {
        match self.asset_type.to_lowercase().as_str() {
            "file" => self.attachment("File", index).map_or_else(Asset::Unsupported, Asset::File),
            "e-book" => self
                .attachment("E-Book", index)
                .map_or_else(Asset::Unsupported, Asset::Ebook),
            "presentation" => self
                .attachment("Presentation", index)
                .map_or_else(Asset::Unsupported, Asset::Presentation),
            "audio" => self
                .attachment("Audio", index)
                .map_or_else(Asset::Unsupported, Asset::Audio),
            "externallink" => self.external_link(),
            _ => self.playable(),
        }
    }

    pub fn parse_supplementary(&self, index: u32) -> Asset {
        match self.asset_type.to_lowercase().as_str() {
            "file" => self.attachment("File", index).map_or_else(Asset::Unsupported, Asset::File),
            "sourcecode" => self
                .attachment("SourceCode", index)
                .map_or_else(Asset::Unsupported, Asset::File),
            "externallink" => self.external_link(),
            other => Asset::Unsupported(format!("supplementary asset type {other}")),
        }
    }

    fn playable(&self) -> Asset {
        let captions = self.captions();

        if let Some(stream_urls) = &self.stream_urls {
            if let Some(sources) = &stream_urls.video {
                return Asset::Video(VideoAsset {
                    id: self.id,
                    sources: VideoSources::Clear(clear_sources(sources)),
                    captions,
                });
            }
        } else if let Some(media_sources) = self.media_sources.as_ref().filter(|s| !s.is_empty()) {
            let manifests = media_sources
                .iter()
                .filter(|s| s.mime_type.as_deref() == Some(DASH_MIME))
                .filter_map(|s| s.src.as_deref())
                .filter_map(|src| match Url::parse(src) {
                    Ok(url) => Some(url),
                    Err(e) => {
                        tracing::warn!("Ignoring invalid manifest url {src}: {e}");
                        None
                    }
                })
                .collect();
            return Asset::Video(VideoAsset {
                id: self.id,
                sources: VideoSources::Encrypted(manifests),
                captions,
            });
        }

        match self.body.as_deref().filter(|b| !b.is_empty()) {
            Some(body) => Asset::Article(Article {
                id: self.id,
                body: body.to_string(),
            }),
            None => Asset::Unsupported(format!("{} asset without content", self.asset_type)),
        }
    }

    fn attachment(&self, kind: &str, index: u32) -> Result<Attachment, String> {
        let filename = self
            .filename
            .as_deref()
            .ok_or_else(|| format!("{kind} asset {} has no file name", self.id))?;
        let file = self
            .download_urls
            .as_ref()
            .and_then(|urls| urls.get(kind))
            .and_then(|urls| urls.first())
            .and_then(|url| url.file.as_deref())
            .ok_or_else(|| format!("{kind} asset {} has no download url", self.id))?;
        let url = Url::parse(file).map_err(|e| format!("{kind} asset {}: {e}", self.id))?;

        Ok(Attachment {
            id: self.id,
            filename: format!("{index:03} {}", sanitize_filename(filename)),
            url,
        })
    }

    fn external_link(&self) -> Asset {
        match &self.external_url {
            Some(url) => Asset::ExternalLink(ExternalLink {
                id: self.id,
                title: sanitize_filename(self.title.as_deref().unwrap_or_default()),
                url: url.clone(),
            }),
            None => Asset::Unsupported(format!("external link {} without url", self.id)),
        }
    }

    fn captions(&self) -> Vec<Caption> {
        self.captions
            .iter()
            .flatten()
            .filter_map(Caption::from_raw)
            .collect()
    }
}

fn clear_sources(sources: &[RawStreamSource]) -> Vec<ClearSource> {
    let mut result = Vec::new();
    for source in sources {
        let Some(file) = source.file.as_deref().filter(|f| !f.is_empty()) else {
            continue;
        };
        let label = source.label.as_deref().unwrap_or_default();
        if label.eq_ignore_ascii_case("audio") {
            continue;
        }
        let url = match Url::parse(file) {
            Ok(url) => url,
            Err(e) => {
                tracing::warn!("Ignoring invalid stream url {file}: {e}");
                continue;
            }
        };

        let mime_type = source.mime_type.as_deref().unwrap_or_default();
        if mime_type == HLS_MIME || file.contains("m3u8") {
            result.push(ClearSource::Hls(url));
            continue;
        }

        let height = label.parse().unwrap_or_default();
        let extension = match mime_type.strip_prefix("video/") {
            Some(ext) if !ext.is_empty() => ext.to_string(),
            _ => "mp4".to_string(),
        };
        result.push(ClearSource::Progressive(ProgressiveRendition {
            height,
            width: width_for_height(height),
            extension,
            url,
        }));
    }
    result
}

impl Caption {
    pub fn from_raw(raw: &RawCaption) -> Option<Self> {
        if raw.class.as_deref() != Some("caption") {
            return None;
        }
        let url = raw.url.as_deref()?;

        let language = [&raw.language, &raw.srclang, &raw.label]
            .into_iter()
            .flatten()
            .find(|s| !s.is_empty())
            .cloned()
            .or_else(|| {
                raw.locale_id
                    .as_deref()
                    .map(|locale| locale.split('_').next().unwrap_or(locale).to_string())
            })?;

        let last_extension = url.rsplit('.').next().unwrap_or_default();
        let extension = if last_extension.contains("vtt") {
            "vtt"
        } else {
            "srt"
        };

        Some(Self {
            language,
            extension: extension.to_string(),
            url: Url::parse(url).ok()?,
        })
    }
}

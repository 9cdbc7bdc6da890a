//! Playable renditions of a lecture and the addressing of their segments.

use std::fmt::{Display, Formatter};

use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Track {
    Video,
    Audio,
}

impl Track {
    pub fn as_str(&self) -> &'static str {
        match self {
            Track::Video => "video",
            Track::Audio => "audio",
        }
    }
}

impl Display for Track {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single downloadable file.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressiveRendition {
    pub height: u32,
    pub width: u32,
    pub extension: String,
    pub url: Url,
}

/// One variant of an HLS master playlist.
#[derive(Debug, Clone, PartialEq)]
pub struct HlsRendition {
    pub height: u32,
    pub width: u32,
    pub extension: String,
    pub bandwidth: u64,
    /// Media playlist of this variant.
    pub playlist: Url,
}

/// Representation ids of the video and audio halves of a DASH variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatId {
    pub video: String,
    pub audio: String,
}

impl Display for FormatId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{},{}", self.video, self.audio)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DashVariant {
    pub height: u32,
    pub width: u32,
    pub format_id: FormatId,
    pub manifest: Url,
    pub bandwidth: u64,
    pub video: SegmentPlan,
    pub audio: SegmentPlan,
}

impl DashVariant {
    pub fn track(&self, track: Track) -> &SegmentPlan {
        match track {
            Track::Video => &self.video,
            Track::Audio => &self.audio,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Rendition {
    Progressive(ProgressiveRendition),
    Segmented(HlsRendition),
    Dash(DashVariant),
}

impl Rendition {
    pub fn height(&self) -> u32 {
        match self {
            Rendition::Progressive(r) => r.height,
            Rendition::Segmented(r) => r.height,
            Rendition::Dash(r) => r.height,
        }
    }

    pub fn width(&self) -> u32 {
        match self {
            Rendition::Progressive(r) => r.width,
            Rendition::Segmented(r) => r.width,
            Rendition::Dash(r) => r.width,
        }
    }
}

/// One lecture's playable unit after manifest resolution.
#[derive(Debug, Clone)]
pub struct MediaAsset {
    pub id: u64,
    pub encrypted: bool,
    pub renditions: Vec<Rendition>,
}

/// How many numbered segments a track has.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentCount {
    Exact(u64),
    /// Upper bound derived from the presentation duration. The real end is the first 404.
    Estimated(u64),
}

impl SegmentCount {
    pub fn limit(&self) -> u64 {
        match self {
            SegmentCount::Exact(n) | SegmentCount::Estimated(n) => *n,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SegmentAddressing {
    /// `$Number$` template resolved against `base`.
    Numbered {
        base: Url,
        template: String,
        start_number: u64,
        count: SegmentCount,
    },
    /// Explicit segment list, in playback order.
    List(Vec<Url>),
    /// The whole track is one resource.
    Single(Url),
}

/// Everything needed to fetch one elementary stream.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentPlan {
    pub initialization: Option<Url>,
    pub media: SegmentAddressing,
}

/// Width of the frame for a well-known height.
pub fn width_for_height(height: u32) -> u32 {
    match height {
        2160 => 3840,
        1440 => 2560,
        1080 => 1920,
        720 => 1280,
        480 => 854,
        360 => 640,
        240 => 426,
        _ => 256,
    }
}

use std::{path::PathBuf, str::FromStr, time::Duration};

pub use crate::fetch::RetryPolicy;

/// Approximates the segment count of a DASH track without a fixed segment duration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentEstimate {
    pub assumed_segment_secs: f64,
    pub padding: u64,
}

impl Default for SegmentEstimate {
    fn default() -> Self {
        Self {
            assumed_segment_secs: 6.0,
            padding: 20,
        }
    }
}

impl SegmentEstimate {
    pub fn estimate(&self, duration: Duration) -> u64 {
        let secs = self.assumed_segment_secs.max(0.001);
        (duration.as_secs_f64() / secs).round() as u64 + self.padding
    }
}

/// External tool that removes the CENC layer of a track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DecryptorKind {
    #[default]
    ShakaPackager,
    Mp4Decrypt,
}

impl DecryptorKind {
    /// Executable names, in lookup order.
    pub fn executables(&self) -> &'static [&'static str] {
        match self {
            DecryptorKind::ShakaPackager => &["shaka-packager", "packager"],
            DecryptorKind::Mp4Decrypt => &["mp4decrypt"],
        }
    }
}

impl FromStr for DecryptorKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "shaka" | "shaka-packager" | "packager" => Ok(Self::ShakaPackager),
            "mp4decrypt" | "bento4" => Ok(Self::Mp4Decrypt),
            _ => Err(format!("unknown decryptor: {s}")),
        }
    }
}

/// Who fetches the segments of an encrypted DASH variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SegmentBackend {
    #[default]
    Native,
    YtDlp,
}

impl FromStr for SegmentBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "native" | "sensei" => Ok(Self::Native),
            "yt-dlp" | "ytdlp" => Ok(Self::YtDlp),
            _ => Err(format!("unknown downloader: {s}")),
        }
    }
}

/// Re-encode the muxed video to H.265 instead of copying streams.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct H265Options {
    pub crf: u8,
    pub preset: String,
    /// Use the NVENC hardware encoder instead of libx265.
    pub nvenc: bool,
}

impl Default for H265Options {
    fn default() -> Self {
        Self {
            crf: 28,
            preset: "medium".to_string(),
            nvenc: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptionOptions {
    pub enabled: bool,
    /// Locale prefix such as `en`, or `all`.
    pub locale: String,
    pub keep_vtt: bool,
}

impl Default for CaptionOptions {
    fn default() -> Self {
        Self {
            enabled: false,
            locale: "en".to_string(),
            keep_vtt: false,
        }
    }
}

impl CaptionOptions {
    pub fn wants(&self, language: &str) -> bool {
        self.enabled && (self.locale == "all" || self.locale == language)
    }
}

/// Options of one course run. Built once and shared by reference.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub download_dir: PathBuf,
    pub quality: Option<u32>,
    pub skip_hls: bool,
    pub skip_lectures: bool,
    pub download_assets: bool,
    pub captions: CaptionOptions,
    pub id_as_course_name: bool,

    pub retry: RetryPolicy,
    pub request_timeout: Duration,
    pub segment_estimate: SegmentEstimate,
    pub segment_backend: SegmentBackend,
    pub concurrent_fragments: u32,

    pub decryptor: DecryptorKind,
    pub h265: Option<H265Options>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            download_dir: PathBuf::from("out_dir"),
            quality: None,
            skip_hls: false,
            skip_lectures: false,
            download_assets: false,
            captions: CaptionOptions::default(),
            id_as_course_name: false,
            retry: RetryPolicy::default(),
            request_timeout: Duration::from_secs(30),
            segment_estimate: SegmentEstimate::default(),
            segment_backend: SegmentBackend::default(),
            concurrent_fragments: 10,
            decryptor: DecryptorKind::default(),
            h265: None,
        }
    }
}

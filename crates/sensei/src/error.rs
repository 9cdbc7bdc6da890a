use std::path::PathBuf;

use reqwest::StatusCode;
use sensei_pssh::KeyId;
use thiserror::Error;
use url::Url;

use crate::media::Track;

#[derive(Error, Debug)]
pub enum SenseiError {
    #[error("HTTP error: {0}")]
    HttpError(StatusCode),

    #[error("Invalid MPD: {0}")]
    MpdParsing(String),

    #[error("Invalid m3u8 file: {0}")]
    M3u8ParseError(String),

    #[error("Unsupported stream: {0}")]
    UnsupportedStream(String),

    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    #[error("Missing executable {name}: {source}")]
    MissingExecutable {
        name: &'static str,
        #[source]
        source: which::Error,
    },

    #[error("Failed to start {tool}: {source}")]
    ProcessSpawn {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    IOError(#[from] std::io::Error),

    #[error(transparent)]
    UrlParseError(#[from] url::ParseError),

    #[error(transparent)]
    RequestError(#[from] reqwest::Error),

    #[error(transparent)]
    MpdParseError(#[from] dash_mpd::DashMpdError),

    #[error(transparent)]
    JsonError(#[from] serde_json::Error),
}

pub type SenseiResult<T> = Result<T, SenseiError>;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("HTTP {status} while fetching {url}")]
    Status { url: Url, status: StatusCode },

    #[error("{} is incomplete: {actual} of {expected} bytes", path.display())]
    Faulty {
        path: PathBuf,
        expected: u64,
        actual: u64,
    },

    #[error("Segment {index} does not exist: {url}")]
    MissingSegment { url: Url, index: u64 },

    #[error("Giving up after {attempts} attempts: {last}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        last: Box<FetchError>,
    },

    #[error(transparent)]
    Request(#[from] reqwest::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl FetchError {
    /// Whether another attempt may succeed.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            FetchError::MissingSegment { .. } | FetchError::RetriesExhausted { .. }
        )
    }
}

pub type FetchResult<T> = Result<T, FetchError>;

/// Failure of a single lecture. Never aborts the course run.
#[derive(Error, Debug)]
pub enum LectureError {
    #[error("No playable rendition")]
    NoRendition,

    #[error("Failed to extract key id of the {track} track: {source}")]
    KeyIdExtraction {
        track: Track,
        #[source]
        source: sensei_pssh::Error,
    },

    #[error("No key for key id {kid} of the {track} track")]
    KeyNotFound { track: Track, kid: KeyId },

    #[error("{tool} failed with {status}: {command}")]
    ToolFailed {
        tool: String,
        status: String,
        command: String,
    },

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Sensei(#[from] SenseiError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

//! HTTP acquisition of lecture files and segmented tracks.
//!
//! Every file is written as `<name>.part` and renamed once complete, so the presence of the
//! final name is the only resume marker needed.

mod concat;
mod progressive;
mod retry;
mod segmented;

pub use concat::{concat_segments, SegmentFile};
pub use progressive::ProgressiveOutcome;
pub use retry::RetryPolicy;
pub use segmented::{segment_path, EndOfStream, FetchOutcome};

use std::path::{Path, PathBuf};

use reqwest::{header::CONTENT_LENGTH, Response};
use url::Url;

use crate::HttpClient;

/// One file to download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadTask {
    pub url: Url,
    pub destination: PathBuf,
    /// Looked up with a HEAD request when unknown.
    pub expected_len: Option<u64>,
}

impl DownloadTask {
    pub fn new<P: Into<PathBuf>>(url: Url, destination: P) -> Self {
        Self {
            url,
            destination: destination.into(),
            expected_len: None,
        }
    }

    pub fn with_expected_len(mut self, len: u64) -> Self {
        self.expected_len = Some(len);
        self
    }

    /// Whether the destination already holds the whole file.
    ///
    /// Without an expected length any non-empty file counts as complete.
    pub fn is_complete(&self) -> bool {
        is_complete(&self.destination, self.expected_len)
    }
}

pub(crate) fn is_complete(path: &Path, expected_len: Option<u64>) -> bool {
    match std::fs::metadata(path) {
        Ok(meta) if meta.is_file() => match expected_len {
            Some(expected) => meta.len() >= expected,
            None => meta.len() > 0,
        },
        _ => false,
    }
}

/// `Content-Length` as sent by the server.
///
/// Read from the header because the body size hint of a HEAD response is always zero.
pub(crate) fn content_length(response: &Response) -> Option<u64> {
    response
        .headers()
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}

#[derive(Clone)]
pub struct Fetcher {
    client: HttpClient,
    retry: RetryPolicy,
}

impl Fetcher {
    pub fn new(client: HttpClient, retry: RetryPolicy) -> Self {
        Self { client, retry }
    }

    pub fn client(&self) -> &HttpClient {
        &self.client
    }
}

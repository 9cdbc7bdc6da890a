use std::path::{Path, PathBuf};

use reqwest::StatusCode;
use url::Url;

use super::{concat_segments, content_length, is_complete, Fetcher, SegmentFile};
use crate::{
    error::{FetchError, FetchResult, SenseiResult},
    manifest::{base_url::merge_baseurls, template::Template},
    media::{SegmentAddressing, SegmentCount, SegmentPlan},
    util::path::append_extension,
};

/// Why a segmented fetch stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndOfStream {
    /// The server answered 404 for this index.
    NotFound(u64),
    /// Every addressed segment was fetched.
    Exhausted,
}

/// Media segments of one track. The initialization segment is not counted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchOutcome {
    pub fetched: u64,
    pub reused: u64,
    pub end: EndOfStream,
}

enum SegmentStatus {
    Fetched,
    Reused,
    NotFound,
}

/// On-disk location of the segment at `index`.
pub fn segment_path(dir: &Path, index: u64) -> PathBuf {
    dir.join(format!("segment_{index}.m4s"))
}

impl Fetcher {
    /// Fetches every segment of a track into `dir` and merges them into `output`.
    ///
    /// Segments already present in `dir` are reused without a request. For numbered templates
    /// a 404 marks the end of the track, unless it hits the first media segment; for explicit
    /// lists it is always an error.
    pub async fn fetch_track(
        &self,
        label: &str,
        plan: &SegmentPlan,
        dir: &Path,
        output: &Path,
    ) -> SenseiResult<FetchOutcome> {
        tokio::fs::create_dir_all(dir).await?;

        let mut files = Vec::new();
        let mut outcome = FetchOutcome {
            fetched: 0,
            reused: 0,
            end: EndOfStream::Exhausted,
        };

        if let Some(init) = &plan.initialization {
            let path = segment_path(dir, 0);
            self.required_segment(label, init, &path, 0).await?;
            files.push(SegmentFile { index: 0, path });
        }

        match &plan.media {
            SegmentAddressing::Single(url) => {
                let path = segment_path(dir, 1);
                let status = self.required_segment(label, url, &path, 1).await?;
                outcome.record(&status);
                files.push(SegmentFile { index: 1, path });
            }
            SegmentAddressing::List(urls) => {
                for (i, url) in urls.iter().enumerate() {
                    let index = i as u64 + 1;
                    let path = segment_path(dir, index);
                    let status = self.required_segment(label, url, &path, index).await?;
                    outcome.record(&status);
                    files.push(SegmentFile { index, path });
                }
            }
            SegmentAddressing::Numbered {
                base,
                template,
                start_number,
                count,
            } => {
                for index in 1..=count.limit() {
                    let number = start_number + index - 1;
                    let url = merge_baseurls(base, &Template::new().with_number(number).resolve(template))?;
                    let path = segment_path(dir, index);

                    let status = self.fetch_segment(label, &url, &path, index).await?;
                    if let SegmentStatus::NotFound = status {
                        if index == 1 {
                            return Err(FetchError::MissingSegment { url, index }.into());
                        }
                        tracing::debug!(track = label, index, "End of stream at {url}");
                        if let SegmentCount::Exact(expected) = count {
                            tracing::warn!(
                                track = label,
                                "Expected {expected} segments but the stream ended after {}",
                                index - 1
                            );
                        }
                        outcome.end = EndOfStream::NotFound(index);
                        break;
                    }
                    outcome.record(&status);
                    files.push(SegmentFile { index, path });
                }

                if let (EndOfStream::Exhausted, SegmentCount::Estimated(limit)) = (outcome.end, count) {
                    tracing::warn!(
                        track = label,
                        "Segment estimate of {limit} reached without an end of stream, the track may be truncated"
                    );
                }
            }
        }

        concat_segments(&mut files, output).await?;
        tracing::info!(
            track = label,
            "Fetched {} segments, reused {}",
            outcome.fetched,
            outcome.reused
        );
        Ok(outcome)
    }

    async fn required_segment(
        &self,
        label: &str,
        url: &Url,
        path: &Path,
        index: u64,
    ) -> FetchResult<SegmentStatus> {
        match self.fetch_segment(label, url, path, index).await? {
            SegmentStatus::NotFound => Err(FetchError::MissingSegment {
                url: url.clone(),
                index,
            }),
            status => Ok(status),
        }
    }

    async fn fetch_segment(
        &self,
        label: &str,
        url: &Url,
        path: &Path,
        index: u64,
    ) -> FetchResult<SegmentStatus> {
        if is_complete(path, None) {
            return Ok(SegmentStatus::Reused);
        }

        let what = format!("Segment {index} of the {label} track");
        self.retry
            .run(&what, |_| self.download_segment(url, path))
            .await
    }

    async fn download_segment(&self, url: &Url, path: &Path) -> FetchResult<SegmentStatus> {
        let response = self.client.get(url.clone()).send().await?;
        match response.status() {
            StatusCode::NOT_FOUND => return Ok(SegmentStatus::NotFound),
            status if !status.is_success() => {
                return Err(FetchError::Status {
                    url: url.clone(),
                    status,
                })
            }
            _ => {}
        }

        let expected = content_length(&response);
        let data = response.bytes().await?;
        if let Some(expected) = expected {
            if (data.len() as u64) < expected {
                return Err(FetchError::Faulty {
                    path: path.to_path_buf(),
                    expected,
                    actual: data.len() as u64,
                });
            }
        }

        let part = append_extension(path, "part");
        tokio::fs::write(&part, &data).await?;
        tokio::fs::rename(&part, path).await?;
        Ok(SegmentStatus::Fetched)
    }
}

impl FetchOutcome {
    fn record(&mut self, status: &SegmentStatus) {
        match status {
            SegmentStatus::Fetched => self.fetched += 1,
            SegmentStatus::Reused => self.reused += 1,
            SegmentStatus::NotFound => {}
        }
    }
}

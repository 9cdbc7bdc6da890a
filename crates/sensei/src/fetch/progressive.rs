use futures::StreamExt;
use tokio::{fs::File, io::AsyncWriteExt};

use super::{content_length, DownloadTask, Fetcher};
use crate::{
    error::{FetchError, FetchResult},
    util::path::append_extension,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressiveOutcome {
    /// Bytes written by this call.
    Downloaded(u64),
    AlreadyComplete,
}

impl Fetcher {
    /// Downloads a single file unless the destination is already complete.
    pub async fn fetch_progressive(&self, task: &DownloadTask) -> FetchResult<ProgressiveOutcome> {
        let mut task = task.clone();
        if task.expected_len.is_none() {
            task.expected_len = self.remote_length(&task).await;
        }

        if task.is_complete() {
            tracing::info!("{} is already downloaded", task.destination.display());
            return Ok(ProgressiveOutcome::AlreadyComplete);
        }

        let what = format!("Download of {}", task.url);
        let written = self
            .retry
            .run(&what, |_| self.download_once(&task))
            .await?;
        Ok(ProgressiveOutcome::Downloaded(written))
    }

    /// Size announced by a HEAD request. Failures only disable the early completeness check.
    async fn remote_length(&self, task: &DownloadTask) -> Option<u64> {
        match self.client.head(task.url.clone()).send().await {
            Ok(response) if response.status().is_success() => content_length(&response),
            Ok(response) => {
                tracing::debug!("HEAD {} returned {}", task.url, response.status());
                None
            }
            Err(e) => {
                tracing::debug!("HEAD {} failed: {e}", task.url);
                None
            }
        }
    }

    async fn download_once(&self, task: &DownloadTask) -> FetchResult<u64> {
        let response = self.client.get(task.url.clone()).send().await?;
        if !response.status().is_success() {
            return Err(FetchError::Status {
                url: task.url.clone(),
                status: response.status(),
            });
        }
        let expected = task.expected_len.or_else(|| content_length(&response));

        if let Some(parent) = task.destination.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let part = append_extension(&task.destination, "part");
        let mut file = File::create(&part).await?;
        let mut written = 0u64;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;
        drop(file);

        if let Some(expected) = expected {
            if written < expected {
                tokio::fs::remove_file(&part).await?;
                return Err(FetchError::Faulty {
                    path: task.destination.clone(),
                    expected,
                    actual: written,
                });
            }
        }

        tokio::fs::rename(&part, &task.destination).await?;
        tracing::debug!("Saved {written} bytes to {}", task.destination.display());
        Ok(written)
    }
}

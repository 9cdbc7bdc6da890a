use std::path::{Path, PathBuf};

use tokio::{fs::File, io::AsyncWriteExt};

use crate::util::path::append_extension;

/// A downloaded segment and its position in the track. Index 0 is the initialization segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentFile {
    pub index: u64,
    pub path: PathBuf,
}

/// Concatenates segments into `output` in ascending index order.
///
/// The order comes from the recorded indices, never from file names or directory listing.
pub async fn concat_segments(segments: &mut [SegmentFile], output: &Path) -> std::io::Result<()> {
    segments.sort_by_key(|s| s.index);

    if let Some(parent) = output.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let part = append_extension(output, "part");
    let mut writer = File::create(&part).await?;
    for segment in segments.iter() {
        let mut reader = File::open(&segment.path).await?;
        tokio::io::copy(&mut reader, &mut writer).await?;
    }
    writer.flush().await?;
    drop(writer);

    tokio::fs::rename(&part, output).await?;
    tracing::debug!(
        "Merged {} segments into {}",
        segments.len(),
        output.display()
    );
    Ok(())
}

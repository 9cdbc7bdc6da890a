//! Lecture captions, stored next to the video as SubRip.

use std::{
    fmt::Write as _,
    path::{Path, PathBuf},
};

use crate::{
    asset::Caption,
    error::LectureError,
    fetch::{DownloadTask, Fetcher},
    util::path::SenseiPathExt,
};

/// Downloads `caption` to `<stem>_<lang>.<ext>` in `dir`, converting WebVTT to SubRip.
///
/// Returns the path of the subtitle file that was kept.
pub async fn download_caption(
    fetcher: &Fetcher,
    caption: &Caption,
    dir: &Path,
    stem: &str,
    keep_vtt: bool,
) -> Result<PathBuf, LectureError> {
    let mut source = dir.join(format!("{stem}.{}", caption.extension));
    source.add_suffix(&caption.language);
    let srt = source.with_extension("srt");

    if caption.extension == "vtt" && srt.is_file() && (!keep_vtt || source.is_file()) {
        tracing::info!("Caption {} is already downloaded", srt.display());
        return Ok(srt);
    }

    tracing::info!("Downloading caption {}", source.display());
    fetcher
        .fetch_progressive(&DownloadTask::new(caption.url.clone(), &source))
        .await?;
    if caption.extension != "vtt" {
        return Ok(source);
    }

    let vtt = tokio::fs::read_to_string(&source).await?;
    tokio::fs::write(&srt, vtt_to_srt(&vtt)).await?;
    tracing::debug!("Converted {} to SubRip", source.display());
    if !keep_vtt {
        tokio::fs::remove_file(&source).await?;
    }
    Ok(srt)
}

/// Converts a WebVTT document to SubRip. Blocks without a timing line are dropped.
pub fn vtt_to_srt(vtt: &str) -> String {
    let vtt = vtt.trim_start_matches('\u{feff}').replace("\r\n", "\n");
    let mut srt = String::new();
    let mut index = 0;

    for block in vtt.split("\n\n") {
        let mut lines = block.lines().skip_while(|l| !l.contains("-->"));
        let Some(timing) = lines.next() else {
            continue;
        };
        let Some((start, end)) = parse_timing(timing) else {
            tracing::debug!("Skipping cue with invalid timing: {timing}");
            continue;
        };
        let text: Vec<String> = lines
            .filter(|l| !l.trim().is_empty())
            .map(unescape)
            .collect();

        index += 1;
        let _ = write!(
            srt,
            "{index}\n{} --> {}\n{}\n\n",
            format_timestamp(start),
            format_timestamp(end),
            text.join("\n")
        );
    }
    srt
}

fn parse_timing(line: &str) -> Option<(u64, u64)> {
    let (start, rest) = line.split_once("-->")?;
    // cue settings follow the end timestamp
    let end = rest.split_whitespace().next()?;
    Some((parse_timestamp(start.trim())?, parse_timestamp(end)?))
}

/// `HH:MM:SS.mmm` or `MM:SS.mmm` in milliseconds.
fn parse_timestamp(s: &str) -> Option<u64> {
    let (clock, millis) = s.split_once('.')?;
    let millis: u64 = millis.parse().ok()?;
    let parts = clock
        .split(':')
        .map(|p| p.parse::<u64>().ok())
        .collect::<Option<Vec<_>>>()?;
    let (hours, minutes, seconds) = match parts.as_slice() {
        [h, m, s] => (*h, *m, *s),
        [m, s] => (0, *m, *s),
        _ => return None,
    };
    Some(((hours * 60 + minutes) * 60 + seconds) * 1000 + millis)
}

fn format_timestamp(ms: u64) -> String {
    let (hours, rest) = (ms / 3_600_000, ms % 3_600_000);
    let (minutes, rest) = (rest / 60_000, rest % 60_000);
    let (seconds, millis) = (rest / 1000, rest % 1000);
    format!("{hours:02}:{minutes:02}:{seconds:02},{millis:03}")
}

fn unescape(line: &str) -> String {
    line.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&nbsp;", "\u{a0}")
        .replace("&amp;", "&")
}

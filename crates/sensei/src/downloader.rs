use std::path::Path;

use crate::{media::DashVariant, process::Invocation};

/// `yt-dlp` command line fetching both tracks of `variant` as `<stem>.encrypted.<ext>` into
/// `work_dir`.
///
/// The tool runs inside `work_dir`, so the output template is a bare file name.
pub fn ytdlp_invocation(
    program: &Path,
    variant: &DashVariant,
    work_dir: &Path,
    stem: &str,
    concurrent_fragments: u32,
) -> Invocation {
    Invocation::new(program)
        .args([
            "--enable-file-urls",
            "--force-generic-extractor",
            "--allow-unplayable-formats",
            "--concurrent-fragments",
        ])
        .arg(concurrent_fragments.to_string())
        .args(["--fixup", "never", "-k", "-o"])
        .arg(format!("{stem}.encrypted.%(ext)s"))
        .arg("-f")
        .arg(variant.format_id.to_string())
        .arg(variant.manifest.as_str())
        .current_dir(work_dir)
}

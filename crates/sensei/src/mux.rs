use std::path::Path;

use crate::{config::H265Options, process::Invocation};

/// ffmpeg command line joining the decrypted tracks into one file.
///
/// Streams are copied unless `h265` is set. Metadata from the inputs is dropped and the title
/// is set explicitly.
pub fn mux_invocation(
    ffmpeg: &Path,
    video: &Path,
    audio: Option<&Path>,
    title: &str,
    output: &Path,
    h265: Option<&H265Options>,
) -> Invocation {
    let mut invocation = Invocation::new(ffmpeg);
    if let Some(H265Options { nvenc: true, .. }) = h265 {
        invocation = invocation.args(["-hwaccel", "cuda", "-hwaccel_output_format", "cuda"]);
    }

    invocation = invocation.arg("-y").arg("-i").path_arg(video);
    if let Some(audio) = audio {
        invocation = invocation.arg("-i").path_arg(audio);
    }

    invocation = match h265 {
        Some(h265) => invocation
            .arg("-c:v")
            .arg(if h265.nvenc { "hevc_nvenc" } else { "libx265" })
            .args(["-vtag", "hvc1", "-crf"])
            .arg(h265.crf.to_string())
            .arg("-preset")
            .arg(h265.preset.clone()),
        None => invocation.args(["-c:v", "copy"]),
    };

    invocation
        .args(["-c:a", "copy", "-fflags", "+bitexact", "-map_metadata", "-1"])
        .arg("-metadata")
        .arg(format!("title={title}"))
        .args(["-f", "mp4"])
        .path_arg(output)
}

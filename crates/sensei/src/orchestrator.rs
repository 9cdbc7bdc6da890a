//! Key lookup, decryption and muxing of downloaded tracks.
//!
//! Every stage is gated on the previous one. Intermediates are only removed once the muxed
//! file is in place, so a failed lecture can be retried from its encrypted tracks.

use std::path::{Path, PathBuf};

use sensei_pssh::extract_key_id;

use crate::{
    config::{DecryptorKind, H265Options},
    decrypt::decrypt_invocation,
    error::LectureError,
    keystore::KeyStore,
    media::Track,
    mux::mux_invocation,
    process::{run_checked, CommandRunner, Toolchain},
    util::path::append_extension,
};

/// Encrypted tracks of one lecture and where the muxed result goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecryptJob {
    pub encrypted_video: PathBuf,
    pub encrypted_audio: PathBuf,
    pub title: String,
    pub output: PathBuf,
}

impl DecryptJob {
    /// Job for the `<stem>.encrypted.mp4` and `<stem>.encrypted.m4a` tracks in `work_dir`.
    pub fn new<P: Into<PathBuf>>(work_dir: &Path, stem: &str, title: &str, output: P) -> Self {
        Self {
            encrypted_video: work_dir.join(format!("{stem}.encrypted.mp4")),
            encrypted_audio: work_dir.join(format!("{stem}.encrypted.m4a")),
            title: title.to_string(),
            output: output.into(),
        }
    }

    pub fn encrypted(&self, track: Track) -> &Path {
        match track {
            Track::Video => &self.encrypted_video,
            Track::Audio => &self.encrypted_audio,
        }
    }

    pub fn decrypted(&self, track: Track) -> PathBuf {
        decrypted_path(self.encrypted(track))
    }

    fn intermediates(&self) -> [PathBuf; 4] {
        [
            self.encrypted_video.clone(),
            self.encrypted_audio.clone(),
            self.decrypted(Track::Video),
            self.decrypted(Track::Audio),
        ]
    }
}

/// `a.encrypted.mp4` becomes `a.decrypted.mp4`. Other names get `.decrypted` inserted before
/// the extension.
fn decrypted_path(encrypted: &Path) -> PathBuf {
    let name = encrypted
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match name.rfind(".encrypted.") {
        Some(pos) => format!("{}.decrypted.{}", &name[..pos], &name[pos + 11..]),
        None => match name.rsplit_once('.') {
            Some((stem, ext)) => format!("{stem}.decrypted.{ext}"),
            None => format!("{name}.decrypted"),
        },
    };
    encrypted.with_file_name(name)
}

pub struct Orchestrator<R> {
    runner: R,
    toolchain: Toolchain,
    keys: KeyStore,
    decryptor: DecryptorKind,
    h265: Option<H265Options>,
}

impl<R: CommandRunner> Orchestrator<R> {
    pub fn new(
        runner: R,
        toolchain: Toolchain,
        keys: KeyStore,
        decryptor: DecryptorKind,
        h265: Option<H265Options>,
    ) -> Self {
        Self {
            runner,
            toolchain,
            keys,
            decryptor,
            h265,
        }
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    pub fn toolchain(&self) -> &Toolchain {
        &self.toolchain
    }

    pub async fn decrypt_and_mux(&self, job: &DecryptJob) -> Result<(), LectureError> {
        for track in [Track::Video, Track::Audio] {
            self.decrypt_track(track, job.encrypted(track), &job.decrypted(track))
                .await?;
        }

        tracing::info!("Merging tracks into {}", job.output.display());
        let video = job.decrypted(Track::Video);
        let audio = job.decrypted(Track::Audio);
        self.mux(&video, Some(&audio), &job.title, &job.output)
            .await?;

        for path in job.intermediates() {
            remove_intermediate(&path).await;
        }
        Ok(())
    }

    /// Rewrites a clear transport stream as mp4, transcoding when H.265 is configured.
    pub async fn remux(&self, input: &Path, title: &str, output: &Path) -> Result<(), LectureError> {
        self.mux(input, None, title, output).await?;
        remove_intermediate(input).await;
        Ok(())
    }

    async fn decrypt_track(
        &self,
        track: Track,
        input: &Path,
        output: &Path,
    ) -> Result<(), LectureError> {
        let kid = extract_key_id(input)
            .map_err(|source| LectureError::KeyIdExtraction { track, source })?;
        tracing::info!(%track, "Key id is {kid}");

        let key = self
            .keys
            .get(&kid)
            .ok_or_else(|| LectureError::KeyNotFound {
                track,
                kid: kid.clone(),
            })?;

        tracing::info!(%track, "Decrypting {}", input.display());
        let dir = input
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let invocation = decrypt_invocation(
            self.decryptor,
            &self.toolchain.decryptor,
            &kid,
            key,
            dir,
            &file_name(input),
            &file_name(output),
        );
        run_checked(&self.runner, &invocation).await
    }

    async fn mux(
        &self,
        video: &Path,
        audio: Option<&Path>,
        title: &str,
        output: &Path,
    ) -> Result<(), LectureError> {
        let part = append_extension(output, "part");
        let invocation = mux_invocation(
            &self.toolchain.ffmpeg,
            video,
            audio,
            title,
            &part,
            self.h265.as_ref(),
        );
        run_checked(&self.runner, &invocation).await?;
        tokio::fs::rename(&part, output).await?;
        Ok(())
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .unwrap_or(path.as_os_str())
        .to_string_lossy()
        .into_owned()
}

async fn remove_intermediate(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => tracing::debug!("Removed {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!("Failed to remove {}: {e}", path.display()),
    }
}

use std::path::Path;

use sensei::{
    config::DecryptorKind,
    media::Track,
    orchestrator::{DecryptJob, Orchestrator},
    KeyStore, LectureError,
};

use crate::support::{
    encrypted_init, toolchain, RecordingRunner, AUDIO_KEY, AUDIO_KID, VIDEO_KEY, VIDEO_KID,
};

fn orchestrator(runner: RecordingRunner, keys: KeyStore) -> Orchestrator<RecordingRunner> {
    Orchestrator::new(
        runner,
        toolchain(DecryptorKind::Mp4Decrypt),
        keys,
        DecryptorKind::Mp4Decrypt,
        None,
    )
}

fn write_tracks(work_dir: &Path) -> DecryptJob {
    let job = DecryptJob::new(work_dir, "001 Intro", "Intro", work_dir.join("001 Intro.mp4"));
    std::fs::write(&job.encrypted_video, encrypted_init(VIDEO_KID)).unwrap();
    std::fs::write(&job.encrypted_audio, encrypted_init(AUDIO_KID)).unwrap();
    job
}

#[tokio::test]
async fn test_decrypt_and_mux() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let job = write_tracks(dir.path());
    let runner = RecordingRunner::default();
    let keys = KeyStore::from_iter([(VIDEO_KID, VIDEO_KEY), (AUDIO_KID, AUDIO_KEY)]);

    orchestrator(runner.clone(), keys).decrypt_and_mux(&job).await?;

    assert_eq!(runner.tools(), ["mp4decrypt", "mp4decrypt", "ffmpeg"]);
    let calls = runner.calls();
    assert_eq!(calls[0].args[1], format!("{VIDEO_KID}:{VIDEO_KEY}"));
    assert_eq!(calls[1].args[1], format!("{AUDIO_KID}:{AUDIO_KEY}"));
    assert_eq!(calls[0].args[2..], ["001 Intro.encrypted.mp4", "001 Intro.decrypted.mp4"]);
    assert_eq!(calls[0].current_dir.as_deref(), Some(dir.path()));
    assert!(calls[2].args.contains(&"title=Intro".to_string()));

    assert!(job.output.is_file());
    assert!(!job.encrypted_video.exists());
    assert!(!job.encrypted_audio.exists());
    assert!(!job.decrypted(Track::Video).exists());
    assert!(!job.decrypted(Track::Audio).exists());
    Ok(())
}

#[tokio::test]
async fn test_audio_key_miss_stops_before_mux() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let job = write_tracks(dir.path());
    let runner = RecordingRunner::default();
    let keys = KeyStore::from_iter([(VIDEO_KID, VIDEO_KEY)]);

    let result = orchestrator(runner.clone(), keys).decrypt_and_mux(&job).await;

    let Err(LectureError::KeyNotFound { track, kid }) = result else {
        panic!("expected a missing audio key");
    };
    assert_eq!(track, Track::Audio);
    assert_eq!(kid.as_str(), AUDIO_KID);

    // video was decrypted, nothing was muxed or removed
    assert_eq!(runner.tools(), ["mp4decrypt"]);
    assert!(job.encrypted_video.is_file());
    assert!(job.encrypted_audio.is_file());
    assert!(job.decrypted(Track::Video).is_file());
    assert!(!job.output.exists());
    Ok(())
}

#[tokio::test]
async fn test_failed_mux_keeps_intermediates() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let job = write_tracks(dir.path());
    let runner = RecordingRunner::failing("ffmpeg");
    let keys = KeyStore::from_iter([(VIDEO_KID, VIDEO_KEY), (AUDIO_KID, AUDIO_KEY)]);

    let result = orchestrator(runner.clone(), keys).decrypt_and_mux(&job).await;

    assert!(matches!(result, Err(LectureError::ToolFailed { ref tool, .. }) if tool == "ffmpeg"));
    assert!(job.encrypted_video.is_file());
    assert!(job.decrypted(Track::Audio).is_file());
    assert!(!job.output.exists());
    Ok(())
}

#[tokio::test]
async fn test_unreadable_track() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let job = DecryptJob::new(dir.path(), "002 Missing", "Missing", dir.path().join("out.mp4"));
    let runner = RecordingRunner::default();

    let result = orchestrator(runner.clone(), KeyStore::default())
        .decrypt_and_mux(&job)
        .await;

    assert!(matches!(
        result,
        Err(LectureError::KeyIdExtraction {
            track: Track::Video,
            ..
        })
    ));
    assert!(runner.calls().is_empty());
    Ok(())
}

use std::path::Path;

use sensei::{
    catalog::Course,
    config::{CaptionOptions, DecryptorKind, SegmentBackend},
    pipeline::{LectureResult, SkipReason},
    HttpClient, KeyStore, Pipeline, RunConfig,
};
use serde_json::{json, Value};
use wiremock::{
    matchers::{method, path},
    Mock, MockServer, ResponseTemplate,
};

use crate::support::{
    encrypted_init, fast_retry, serve, toolchain, RecordingRunner, AUDIO_KEY, AUDIO_KID,
    VIDEO_KEY, VIDEO_KID,
};

fn config(download_dir: &Path) -> RunConfig {
    RunConfig {
        download_dir: download_dir.to_path_buf(),
        retry: fast_retry(),
        decryptor: DecryptorKind::Mp4Decrypt,
        ..Default::default()
    }
}

fn pipeline(config: RunConfig, runner: RecordingRunner) -> Pipeline<RecordingRunner> {
    let keys = KeyStore::from_iter([(VIDEO_KID, VIDEO_KEY), (AUDIO_KID, AUDIO_KEY)]);
    let toolchain = toolchain(config.decryptor);
    Pipeline::new(config, HttpClient::default(), keys, toolchain, runner)
}

fn course(lectures: Vec<Value>) -> Course {
    course_with_chapter("Basics", lectures)
}

fn course_with_chapter(chapter: &str, lectures: Vec<Value>) -> Course {
    let course = json!({
        "id": 1,
        "title": "Rust 101",
        "chapters": [{ "index": 1, "title": chapter, "lectures": lectures }]
    });
    serde_json::from_value(course).unwrap()
}

fn encrypted_lecture(manifest: String) -> Value {
    json!({
        "index": 1,
        "id": 11,
        "title": "Intro",
        "asset": {
            "id": 101,
            "asset_type": "Video",
            "media_sources": [{ "type": "application/dash+xml", "src": manifest }],
            "media_license_token": "token"
        }
    })
}

fn progressive_lecture(index: u32, url: &str) -> Value {
    json!({
        "index": index,
        "id": 100 + index,
        "title": format!("Lecture {index}"),
        "asset": {
            "id": 200 + index,
            "asset_type": "Video",
            "stream_urls": { "Video": [{ "label": "720", "file": url, "type": "video/mp4" }] }
        }
    })
}

#[tokio::test]
async fn test_encrypted_lecture() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    serve(&server, "/course/index.mpd", crate::manifest::MPD, 1).await;
    serve(&server, "/course/v1080/init.mp4", encrypted_init(VIDEO_KID), 1).await;
    serve(&server, "/course/a128/init.mp4", encrypted_init(AUDIO_KID), 1).await;
    for i in 1..=2 {
        serve(&server, &format!("/course/v1080/seg-{i}.m4s"), format!("v{i}"), 1).await;
        serve(&server, &format!("/course/a128/seg-{i}.m4s"), format!("a{i}"), 1).await;
    }

    let course = course(vec![encrypted_lecture(format!(
        "{}/course/index.mpd",
        server.uri()
    ))]);

    let dir = tempfile::tempdir()?;
    let runner = RecordingRunner::default();
    let pipeline = pipeline(config(dir.path()), runner.clone());

    let report = pipeline.run_course(&course).await?;
    assert_eq!(report.downloaded(), 1, "{report}");
    assert_eq!(runner.tools(), ["mp4decrypt", "mp4decrypt", "ffmpeg"]);

    let chapter_dir = dir.path().join("Rust 101").join("01 - Basics");
    assert!(chapter_dir.join("001 Intro.mp4").is_file());
    assert!(!chapter_dir.join(".sensei").exists());

    // an existing output is skipped before anything is requested
    let report = pipeline.run_course(&course).await?;
    assert!(matches!(
        report.lectures[0].result,
        LectureResult::Skipped(SkipReason::AlreadyDownloaded)
    ));
    assert_eq!(runner.calls().len(), 3);
    Ok(())
}

#[tokio::test]
async fn test_encrypted_lecture_with_external_tools() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    serve(&server, "/course/index.mpd", crate::manifest::MPD, 1).await;

    let course = course_with_chapter(
        "Traits, Generics",
        vec![encrypted_lecture(format!("{}/course/index.mpd", server.uri()))],
    );

    let dir = tempfile::tempdir()?;
    let config = RunConfig {
        segment_backend: SegmentBackend::YtDlp,
        decryptor: DecryptorKind::ShakaPackager,
        ..config(dir.path())
    };
    let runner = RecordingRunner::default();
    let report = pipeline(config, runner.clone()).run_course(&course).await?;
    assert_eq!(report.downloaded(), 1, "{report}");
    assert_eq!(
        runner.tools(),
        ["yt-dlp", "shaka-packager", "shaka-packager", "ffmpeg"]
    );

    let chapter_dir = dir.path().join("Rust 101").join("01 - Traits, Generics");
    let work_dir = chapter_dir.join(".sensei").join("001 Intro");
    let calls = runner.calls();
    for call in &calls[..3] {
        assert_eq!(call.current_dir.as_deref(), Some(work_dir.as_path()));
    }
    assert!(calls[0].args.contains(&"001 Intro.encrypted.%(ext)s".to_string()));

    let descriptor = calls[1].args.last().unwrap();
    assert_eq!(
        descriptor,
        "input=001 Intro.encrypted.mp4,stream_selector=0,output=001 Intro.decrypted.mp4"
    );
    assert_eq!(descriptor.split(',').count(), 3);

    assert!(chapter_dir.join("001 Intro.mp4").is_file());
    assert!(!chapter_dir.join(".sensei").exists());
    Ok(())
}

#[tokio::test]
async fn test_failed_lecture_does_not_stop_the_course() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    let mut lectures = Vec::new();
    for index in 1..=5 {
        let route = format!("/videos/{index}.mp4");
        if index == 3 {
            Mock::given(method("GET"))
                .and(path(route.as_str()))
                .respond_with(ResponseTemplate::new(500))
                .expect(3)
                .mount(&server)
                .await;
        } else {
            serve(&server, &route, vec![index as u8; 64], 1).await;
        }
        lectures.push(progressive_lecture(index, &format!("{}{route}", server.uri())));
    }

    let dir = tempfile::tempdir()?;
    let runner = RecordingRunner::default();
    let report = pipeline(config(dir.path()), runner.clone())
        .run_course(&course(lectures))
        .await?;

    let results: Vec<_> = report
        .lectures
        .iter()
        .map(|l| match l.result {
            LectureResult::Downloaded => "downloaded",
            LectureResult::Skipped(_) => "skipped",
            LectureResult::Failed(_) => "failed",
        })
        .collect();
    assert_eq!(
        results,
        ["downloaded", "downloaded", "failed", "downloaded", "downloaded"]
    );

    let chapter_dir = dir.path().join("Rust 101").join("01 - Basics");
    assert!(chapter_dir.join("005 Lecture 5.mp4").is_file());
    assert!(!chapter_dir.join("003 Lecture 3.mp4").exists());
    assert!(runner.calls().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_supplements() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    serve(&server, "/videos/1.mp4", vec![1u8; 64], 1).await;
    serve(
        &server,
        "/captions/en.vtt",
        "WEBVTT\n\n00:01.000 --> 00:02.000\nHello\n",
        1,
    )
    .await;
    serve(&server, "/captions/de.vtt", "WEBVTT\n", 0).await;
    serve(&server, "/files/cheatsheet.pdf", "%PDF", 1).await;

    let mut video = progressive_lecture(1, &format!("{}/videos/1.mp4", server.uri()));
    video["asset"]["captions"] = json!([
        { "_class": "caption", "url": format!("{}/captions/en.vtt", server.uri()), "locale_id": "en_US" },
        { "_class": "caption", "url": format!("{}/captions/de.vtt", server.uri()), "locale_id": "de_DE" }
    ]);
    video["supplementary_assets"] = json!([
        {
            "id": 301,
            "asset_type": "File",
            "filename": "cheatsheet.pdf",
            "download_urls": { "File": [{ "file": format!("{}/files/cheatsheet.pdf", server.uri()), "label": "download" }] }
        },
        { "id": 302, "asset_type": "ExternalLink", "title": "Rust Book", "external_url": "https://doc.rust-lang.org/book/" }
    ]);
    let article = json!({
        "index": 2,
        "id": 12,
        "title": "Reading",
        "asset": { "id": 102, "asset_type": "Article", "body": "<p>Ownership</p>" }
    });

    let dir = tempfile::tempdir()?;
    let config = RunConfig {
        download_assets: true,
        captions: CaptionOptions {
            enabled: true,
            ..Default::default()
        },
        ..config(dir.path())
    };
    let report = pipeline(config, RecordingRunner::default())
        .run_course(&course(vec![video, article]))
        .await?;
    assert_eq!(report.downloaded(), 2, "{report}");

    let chapter_dir = dir.path().join("Rust 101").join("01 - Basics");
    assert!(chapter_dir.join("001 Lecture 1.mp4").is_file());
    assert_eq!(
        std::fs::read_to_string(chapter_dir.join("001 Lecture 1_en.srt"))?,
        "1\n00:00:01,000 --> 00:00:02,000\nHello\n\n"
    );
    assert!(!chapter_dir.join("001 Lecture 1_en.vtt").exists());
    assert!(!chapter_dir.join("001 Lecture 1_de.srt").exists());
    assert_eq!(
        std::fs::read(chapter_dir.join("001 cheatsheet.pdf"))?,
        b"%PDF"
    );
    assert!(chapter_dir.join("001 Rust Book.url").is_file());
    assert_eq!(
        std::fs::read_to_string(chapter_dir.join("002 Reading.html"))?,
        "<p>Ownership</p>"
    );
    Ok(())
}

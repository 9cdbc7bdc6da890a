use sensei::{
    error::{FetchError, SenseiError},
    fetch::{segment_path, EndOfStream, FetchOutcome},
    media::{SegmentAddressing, SegmentCount, SegmentPlan},
};
use url::Url;
use wiremock::MockServer;

use crate::{
    support::{fetcher, not_found, serve},
    AssertWrapper,
};

fn numbered_plan(server: &MockServer, count: SegmentCount) -> SegmentPlan {
    let base = Url::parse(&format!("{}/track/index.mpd?token=t", server.uri())).unwrap();
    SegmentPlan {
        initialization: Some(base.join("init.mp4").unwrap()),
        media: SegmentAddressing::Numbered {
            base,
            template: "seg-$Number$.m4s".to_string(),
            start_number: 1,
            count,
        },
    }
}

fn expected_track(segments: u64) -> Vec<u8> {
    let mut data = b"init".to_vec();
    for i in 1..=segments {
        data.extend(format!("seg-{i}").into_bytes());
    }
    data
}

#[tokio::test]
async fn test_stops_at_first_missing_segment() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    serve(&server, "/track/init.mp4", "init", 1).await;
    for i in 1..=5 {
        serve(&server, &format!("/track/seg-{i}.m4s"), format!("seg-{i}"), 1).await;
    }
    not_found(&server, "/track/seg-6.m4s", 1).await;
    not_found(&server, "/track/seg-7.m4s", 0).await;

    let dir = tempfile::tempdir()?;
    let output = dir.path().join("video.mp4");
    let outcome = fetcher()
        .fetch_track(
            "video",
            &numbered_plan(&server, SegmentCount::Estimated(30)),
            &dir.path().join("segments"),
            &output,
        )
        .await
        .assert_success();

    assert_eq!(
        outcome,
        FetchOutcome {
            fetched: 5,
            reused: 0,
            end: EndOfStream::NotFound(6),
        }
    );
    assert_eq!(std::fs::read(&output)?, expected_track(5));
    Ok(())
}

#[tokio::test]
async fn test_resume_only_requests_missing_segments() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    serve(&server, "/track/init.mp4", "init", 0).await;
    for i in 1..=3 {
        serve(&server, &format!("/track/seg-{i}.m4s"), format!("seg-{i}"), 0).await;
    }
    for i in 4..=5 {
        serve(&server, &format!("/track/seg-{i}.m4s"), format!("seg-{i}"), 1).await;
    }
    not_found(&server, "/track/seg-6.m4s", 1).await;

    let dir = tempfile::tempdir()?;
    let segments = dir.path().join("segments");
    std::fs::create_dir_all(&segments)?;
    std::fs::write(segment_path(&segments, 0), "init")?;
    for i in 1..=3 {
        std::fs::write(segment_path(&segments, i), format!("seg-{i}"))?;
    }

    let output = dir.path().join("audio.m4a");
    let outcome = fetcher()
        .fetch_track(
            "audio",
            &numbered_plan(&server, SegmentCount::Estimated(30)),
            &segments,
            &output,
        )
        .await
        .assert_success();

    assert_eq!(outcome.fetched, 2);
    assert_eq!(outcome.reused, 3);
    assert_eq!(outcome.end, EndOfStream::NotFound(6));
    assert_eq!(std::fs::read(&output)?, expected_track(5));
    Ok(())
}

#[tokio::test]
async fn test_exact_count_needs_no_end_marker() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    serve(&server, "/track/init.mp4", "init", 1).await;
    // ten or more segments, so lexical and numeric order differ
    for i in 1..=12 {
        serve(&server, &format!("/track/seg-{i}.m4s"), format!("seg-{i}"), 1).await;
    }
    not_found(&server, "/track/seg-13.m4s", 0).await;

    let dir = tempfile::tempdir()?;
    let output = dir.path().join("video.mp4");
    let outcome = fetcher()
        .fetch_track(
            "video",
            &numbered_plan(&server, SegmentCount::Exact(12)),
            &dir.path().join("segments"),
            &output,
        )
        .await
        .assert_success();

    assert_eq!(outcome.fetched, 12);
    assert_eq!(outcome.end, EndOfStream::Exhausted);
    assert_eq!(std::fs::read(&output)?, expected_track(12));
    Ok(())
}

#[tokio::test]
async fn test_missing_listed_segment_is_an_error() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    serve(&server, "/hls/0.ts", "seg-1", 1).await;
    not_found(&server, "/hls/1.ts", 1).await;

    let plan = SegmentPlan {
        initialization: None,
        media: SegmentAddressing::List(vec![
            Url::parse(&format!("{}/hls/0.ts", server.uri()))?,
            Url::parse(&format!("{}/hls/1.ts", server.uri()))?,
        ]),
    };

    let dir = tempfile::tempdir()?;
    let result = fetcher()
        .fetch_track(
            "video",
            &plan,
            &dir.path().join("segments"),
            &dir.path().join("video.ts"),
        )
        .await;

    assert!(matches!(
        result,
        Err(SenseiError::Fetch(FetchError::MissingSegment { index: 2, .. }))
    ));
    assert!(!dir.path().join("video.ts").exists());
    Ok(())
}

#[tokio::test]
async fn test_track_without_media_segments_is_an_error() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    serve(&server, "/track/init.mp4", "init", 1).await;
    not_found(&server, "/track/seg-1.m4s", 1).await;
    not_found(&server, "/track/seg-2.m4s", 0).await;

    let dir = tempfile::tempdir()?;
    let output = dir.path().join("video.mp4");
    let result = fetcher()
        .fetch_track(
            "video",
            &numbered_plan(&server, SegmentCount::Exact(11)),
            &dir.path().join("segments"),
            &output,
        )
        .await;

    assert!(matches!(
        result,
        Err(SenseiError::Fetch(FetchError::MissingSegment { index: 1, .. }))
    ));
    assert!(!output.exists());
    Ok(())
}

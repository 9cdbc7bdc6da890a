use sensei::{
    asset::{ClearSource, VideoAsset, VideoSources},
    config::SegmentEstimate,
    manifest::{select_rendition, ManifestResolver},
    media::{ProgressiveRendition, Rendition, SegmentAddressing, SegmentCount},
    HttpClient,
};
use url::Url;
use wiremock::{
    matchers::{method, path},
    Mock, MockServer, ResponseTemplate,
};

use crate::{support::serve, AssertWrapper};

pub const MPD: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<MPD xmlns="urn:mpeg:dash:schema:mpd:2011" type="static" mediaPresentationDuration="PT12S" minBufferTime="PT2S">
  <Period id="0">
    <AdaptationSet contentType="video" mimeType="video/mp4">
      <SegmentTemplate timescale="1000" duration="6000" startNumber="1" initialization="$RepresentationID$/init.mp4" media="$RepresentationID$/seg-$Number$.m4s"/>
      <Representation id="v480" bandwidth="900000" width="854" height="480" codecs="avc1.4d401f"/>
      <Representation id="v720" bandwidth="2500000" width="1280" height="720" codecs="avc1.4d401f"/>
      <Representation id="v1080" bandwidth="4500000" width="1920" height="1080" codecs="avc1.640028"/>
    </AdaptationSet>
    <AdaptationSet contentType="audio" mimeType="audio/mp4" lang="en">
      <SegmentTemplate timescale="1000" duration="6000" startNumber="1" initialization="$RepresentationID$/init.mp4" media="$RepresentationID$/seg-$Number$.m4s"/>
      <Representation id="a128" bandwidth="128000" codecs="mp4a.40.2"/>
    </AdaptationSet>
  </Period>
</MPD>"#;

fn resolver() -> ManifestResolver {
    ManifestResolver::new(HttpClient::default(), SegmentEstimate::default())
}

#[tokio::test]
async fn test_resolve_dash_variants() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/course/index.mpd"))
        .respond_with(ResponseTemplate::new(200).set_body_string(MPD))
        .expect(1)
        .mount(&server)
        .await;

    let manifest = Url::parse(&format!("{}/course/index.mpd", server.uri()))?;
    let asset = VideoAsset {
        id: 7,
        sources: VideoSources::Encrypted(vec![manifest.clone()]),
        captions: vec![],
    };
    let media = resolver().resolve(&asset, false).await;
    assert!(media.encrypted);
    assert_eq!(media.renditions.len(), 3);

    let Rendition::Dash(variant) = select_rendition(&media.renditions, Some(500)).assert_success()
    else {
        panic!("expected a DASH variant");
    };
    assert_eq!(variant.height, 480);
    assert_eq!(variant.format_id.to_string(), "v480,a128");
    assert_eq!(variant.manifest, manifest);
    assert_eq!(
        variant.video.initialization.as_ref().map(Url::path),
        Some("/course/v480/init.mp4")
    );
    let SegmentAddressing::Numbered { count, .. } = &variant.audio.media else {
        panic!("expected numbered audio segments");
    };
    assert_eq!(*count, SegmentCount::Exact(2));

    let best = select_rendition(&media.renditions, None).assert_success();
    assert_eq!(best.height(), 1080);
    Ok(())
}

#[tokio::test]
async fn test_failed_source_yields_nothing() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    let asset = VideoAsset {
        id: 8,
        sources: VideoSources::Encrypted(vec![Url::parse(&format!(
            "{}/missing.mpd",
            server.uri()
        ))?]),
        captions: vec![],
    };

    let media = resolver().resolve(&asset, false).await;
    assert!(media.renditions.is_empty());
    assert!(select_rendition(&media.renditions, None).is_none());
    Ok(())
}

#[tokio::test]
async fn test_resolve_clear_sources() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    let master = "#EXTM3U
#EXT-X-STREAM-INF:BANDWIDTH=800000,RESOLUTION=640x360,CODECS=\"avc1.4d401e,mp4a.40.2\"
360/index.m3u8
#EXT-X-STREAM-INF:BANDWIDTH=5000000,RESOLUTION=1920x1080,CODECS=\"avc1.640028,mp4a.40.2\"
1080/index.m3u8
";
    serve(&server, "/hls/master.m3u8", master, 1).await;

    let progressive = ProgressiveRendition {
        height: 720,
        width: 1280,
        extension: "mp4".to_string(),
        url: Url::parse(&format!("{}/720.mp4", server.uri()))?,
    };
    let asset = VideoAsset {
        id: 9,
        sources: VideoSources::Clear(vec![
            ClearSource::Progressive(progressive.clone()),
            ClearSource::Hls(Url::parse(&format!("{}/hls/master.m3u8", server.uri()))?),
        ]),
        captions: vec![],
    };

    let media = resolver().resolve(&asset, false).await;
    assert!(!media.encrypted);
    let heights: Vec<_> = media.renditions.iter().map(Rendition::height).collect();
    assert_eq!(heights, [720, 360, 1080]);

    let Rendition::Segmented(hls) = select_rendition(&media.renditions, Some(1000)).assert_success()
    else {
        panic!("expected an HLS rendition");
    };
    assert_eq!(hls.playlist.path(), "/hls/1080/index.m3u8");

    let skipped = resolver().resolve(&asset, true).await;
    assert_eq!(skipped.renditions, [Rendition::Progressive(progressive)]);
    Ok(())
}

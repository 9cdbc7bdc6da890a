use std::collections::HashSet;

use m3u8_rs::{KeyMethod, Playlist};
use url::Url;

use super::base_url::merge_baseurls;
use crate::{
    error::{SenseiError, SenseiResult},
    media::{HlsRendition, SegmentAddressing, SegmentPlan},
};

fn parse_playlist(data: &[u8]) -> SenseiResult<Playlist> {
    m3u8_rs::parse_playlist_res(data).map_err(|e| SenseiError::M3u8ParseError(format!("{e:?}")))
}

/// Variants of a master playlist, de-duplicated by height.
///
/// Variants without a resolution or codecs are skipped, and the first variant of each height
/// wins.
pub fn parse_master(data: &[u8], playlist_url: &Url) -> SenseiResult<Vec<HlsRendition>> {
    let Playlist::MasterPlaylist(master) = parse_playlist(data)? else {
        return Err(SenseiError::M3u8ParseError(
            "expected a master playlist".to_string(),
        ));
    };

    let mut seen = HashSet::new();
    let mut renditions = Vec::new();
    for variant in master.variants {
        if variant.is_i_frame || variant.codecs.is_none() {
            continue;
        }
        let Some(resolution) = variant.resolution else {
            continue;
        };
        let (Ok(width), Ok(height)) = (
            u32::try_from(resolution.width),
            u32::try_from(resolution.height),
        ) else {
            continue;
        };
        if !seen.insert(height) {
            continue;
        }

        renditions.push(HlsRendition {
            height,
            width,
            extension: "mp4".to_string(),
            bandwidth: variant.bandwidth,
            playlist: merge_baseurls(playlist_url, &variant.uri)?,
        });
    }
    Ok(renditions)
}

/// Segment list of a media playlist, with the `EXT-X-MAP` initialization section if any.
pub fn parse_media(data: &[u8], playlist_url: &Url) -> SenseiResult<SegmentPlan> {
    let Playlist::MediaPlaylist(playlist) = parse_playlist(data)? else {
        return Err(SenseiError::M3u8ParseError(
            "expected a media playlist".to_string(),
        ));
    };

    let encrypted = playlist.segments.iter().any(|segment| {
        segment
            .key
            .as_ref()
            .is_some_and(|key| key.method != KeyMethod::None)
    });
    if encrypted {
        return Err(SenseiError::UnsupportedStream(format!(
            "{playlist_url} has encrypted segments"
        )));
    }

    let initialization = playlist
        .segments
        .iter()
        .find_map(|segment| segment.map.as_ref())
        .map(|map| merge_baseurls(playlist_url, &map.uri))
        .transpose()?;
    let urls = playlist
        .segments
        .iter()
        .map(|segment| merge_baseurls(playlist_url, &segment.uri))
        .collect::<SenseiResult<Vec<_>>>()?;

    Ok(SegmentPlan {
        initialization,
        media: SegmentAddressing::List(urls),
    })
}

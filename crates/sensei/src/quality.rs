use crate::media::Rendition;

/// Anything that can be ranked by frame height.
pub trait HasHeight {
    fn height(&self) -> u32;
}

impl HasHeight for Rendition {
    fn height(&self) -> u32 {
        Rendition::height(self)
    }
}

impl HasHeight for crate::media::DashVariant {
    fn height(&self) -> u32 {
        self.height
    }
}

impl HasHeight for crate::media::HlsRendition {
    fn height(&self) -> u32 {
        self.height
    }
}

/// Picks the rendition to download.
///
/// Without a requested quality the tallest rendition wins. Otherwise the one closest to the
/// requested height wins. Ties always go to the entry listed first.
pub fn select_closest<T: HasHeight>(items: &[T], quality: Option<u32>) -> Option<&T> {
    match quality {
        None => {
            let mut best: Option<&T> = None;
            for item in items {
                if best.map_or(true, |b| item.height() > b.height()) {
                    best = Some(item);
                }
            }
            best
        }
        // min_by_key keeps the first of equal minimums
        Some(quality) => items
            .iter()
            .min_by_key(|item| item.height().abs_diff(quality)),
    }
}

pub fn select_rendition(renditions: &[Rendition], quality: Option<u32>) -> Option<&Rendition> {
    select_closest(renditions, quality)
}

use url::Url;

use crate::error::SenseiResult;

fn is_absolute_url(s: &str) -> bool {
    s.starts_with("http://")
        || s.starts_with("https://")
        || s.starts_with("file://")
        || s.starts_with("ftp://")
}

/// Resolves `new` against `current`.
///
/// The query of `current` (signed CDN tokens) is carried over unless `new` brings its own:
///
/// - `https://example.com/a.mpd?auth=secret` + `/v.mp4` => `https://example.com/v.mp4?auth=secret`
/// - `https://example.com/a.mpd?auth=old` + `/v.mp4?auth=new` => `https://example.com/v.mp4?auth=new`
pub fn merge_baseurls(current: &Url, new: &str) -> SenseiResult<Url> {
    if is_absolute_url(new) {
        return Ok(Url::parse(new)?);
    }

    let mut merged = current.join(new)?;
    if merged.query().is_none() {
        merged.set_query(current.query());
    }
    Ok(merged)
}

/// Applies a chain of optional `BaseURL` values, outermost first.
pub fn resolve_base<'a, I>(root: &Url, bases: I) -> SenseiResult<Url>
where
    I: IntoIterator<Item = Option<&'a str>>,
{
    let mut current = root.clone();
    for base in bases.into_iter().flatten() {
        current = merge_baseurls(&current, base)?;
    }
    Ok(current)
}

//! Owned view of a DASH manifest.
//!
//! Only the parts needed to address on-demand lecture tracks are kept. Protection defaults such
//! as `cenc:default_KID` are first-class fields instead of attributes looked up by name.

use std::{collections::HashMap, time::Duration};

use url::Url;

use super::{
    template::Template,
    base_url::{merge_baseurls, resolve_base},
};
use crate::{
    config::SegmentEstimate,
    error::{SenseiError, SenseiResult},
    media::{
        width_for_height, DashVariant, FormatId, SegmentAddressing, SegmentCount, SegmentPlan,
        Track,
    },
};

#[derive(Debug, Clone, PartialEq)]
pub struct Manifest {
    pub duration: Option<Duration>,
    pub base_url: Option<String>,
    pub periods: Vec<Period>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Period {
    pub id: Option<String>,
    pub duration: Option<Duration>,
    pub base_url: Option<String>,
    pub adaptation_sets: Vec<AdaptationSet>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AdaptationSet {
    pub content_type: Option<String>,
    pub mime_type: Option<String>,
    pub codecs: Option<String>,
    pub lang: Option<String>,
    pub base_url: Option<String>,
    pub segment_template: Option<SegmentTemplate>,
    pub content_protection: Vec<ContentProtection>,
    pub representations: Vec<Representation>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Representation {
    pub id: Option<String>,
    pub bandwidth: u64,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub codecs: Option<String>,
    pub content_type: Option<String>,
    pub mime_type: Option<String>,
    pub base_url: Option<String>,
    pub segment_template: Option<SegmentTemplate>,
    pub content_protection: Vec<ContentProtection>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SegmentTemplate {
    pub media: Option<String>,
    pub initialization: Option<String>,
    pub duration: Option<f64>,
    pub timescale: Option<u64>,
    pub start_number: Option<u64>,
    pub timeline: Option<Vec<TimelineEntry>>,
}

/// An `S` element of a `SegmentTimeline`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimelineEntry {
    pub t: Option<u64>,
    pub d: u64,
    /// Negative repeats last until the next entry or the end of the period.
    pub r: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentProtection {
    pub scheme_id_uri: String,
    pub default_kid: Option<String>,
}

fn first_base(urls: &[dash_mpd::BaseURL]) -> Option<String> {
    urls.first().map(|b| b.base.clone())
}

fn to_u32(value: Option<u64>) -> Option<u32> {
    value.and_then(|v| u32::try_from(v).ok())
}

impl From<&dash_mpd::SegmentTemplate> for SegmentTemplate {
    fn from(template: &dash_mpd::SegmentTemplate) -> Self {
        Self {
            media: template.media.clone(),
            initialization: template.initialization.clone(),
            duration: template.duration,
            timescale: template.timescale,
            start_number: template.startNumber,
            timeline: template.SegmentTimeline.as_ref().map(|timeline| {
                timeline
                    .segments
                    .iter()
                    .map(|s| TimelineEntry {
                        t: s.t,
                        d: s.d,
                        r: s.r.unwrap_or(0),
                    })
                    .collect()
            }),
        }
    }
}

fn content_protection(items: &[dash_mpd::ContentProtection]) -> Vec<ContentProtection> {
    items
        .iter()
        .map(|cp| ContentProtection {
            scheme_id_uri: cp.schemeIdUri.clone(),
            default_kid: cp.default_KID.clone(),
        })
        .collect()
}

impl From<dash_mpd::MPD> for Manifest {
    fn from(mpd: dash_mpd::MPD) -> Self {
        let periods = mpd
            .periods
            .iter()
            .map(|period| Period {
                id: period.id.clone(),
                duration: period.duration,
                base_url: first_base(&period.BaseURL),
                adaptation_sets: period
                    .adaptations
                    .iter()
                    .map(|adaptation| AdaptationSet {
                        content_type: adaptation.contentType.clone(),
                        mime_type: adaptation.mimeType.clone(),
                        codecs: adaptation.codecs.clone(),
                        lang: adaptation.lang.clone(),
                        base_url: first_base(&adaptation.BaseURL),
                        segment_template: adaptation.SegmentTemplate.as_ref().map(Into::into),
                        content_protection: content_protection(&adaptation.ContentProtection),
                        representations: adaptation
                            .representations
                            .iter()
                            .map(|representation| Representation {
                                id: representation.id.clone(),
                                bandwidth: representation.bandwidth.unwrap_or(0),
                                width: to_u32(representation.width),
                                height: to_u32(representation.height),
                                codecs: representation.codecs.clone(),
                                content_type: representation.contentType.clone(),
                                mime_type: representation.mimeType.clone(),
                                base_url: first_base(&representation.BaseURL),
                                segment_template: representation
                                    .SegmentTemplate
                                    .as_ref()
                                    .map(Into::into),
                                content_protection: content_protection(
                                    &representation.ContentProtection,
                                ),
                            })
                            .collect(),
                    })
                    .collect(),
            })
            .collect();

        Self {
            duration: mpd.mediaPresentationDuration,
            base_url: first_base(&mpd.base_url),
            periods,
        }
    }
}

impl AdaptationSet {
    /// Classifies a representation by content type, falling back to mime types.
    pub fn track_of(&self, representation: &Representation) -> Option<Track> {
        let kind = self
            .content_type
            .as_deref()
            .or(self.mime_type.as_deref())
            .or(representation.content_type.as_deref())
            .or(representation.mime_type.as_deref())?;

        if kind.starts_with("video") {
            Some(Track::Video)
        } else if kind.starts_with("audio") {
            Some(Track::Audio)
        } else {
            None
        }
    }
}

/// A classified representation with its segment addressing.
struct Candidate {
    id: String,
    bandwidth: u64,
    width: Option<u32>,
    height: Option<u32>,
    plan: SegmentPlan,
}

impl Manifest {
    pub fn parse(xml: &str) -> SenseiResult<Self> {
        Ok(dash_mpd::parse(xml)?.into())
    }

    /// First `default_KID` announced anywhere in the manifest.
    pub fn default_kid(&self) -> Option<&str> {
        self.periods
            .iter()
            .flat_map(|p| p.adaptation_sets.iter())
            .flat_map(|a| {
                a.representations
                    .iter()
                    .flat_map(|r| r.content_protection.iter())
                    .chain(a.content_protection.iter())
            })
            .find_map(|cp| cp.default_kid.as_deref())
    }

    /// One variant per distinct video height, ordered from lowest to highest.
    ///
    /// For each height the representation with the highest bandwidth wins, and every variant is
    /// paired with the highest-bandwidth audio representation.
    pub fn variants(
        &self,
        manifest_url: &Url,
        estimate: &SegmentEstimate,
    ) -> SenseiResult<Vec<DashVariant>> {
        let period = self
            .periods
            .first()
            .ok_or_else(|| SenseiError::MpdParsing("manifest has no period".to_string()))?;
        if self.periods.len() > 1 {
            tracing::warn!(
                "Manifest has {} periods, only the first one is used",
                self.periods.len()
            );
        }

        let mut videos: Vec<Candidate> = Vec::new();
        let mut audio: Option<Candidate> = None;

        for set in &period.adaptation_sets {
            for representation in &set.representations {
                let Some(track) = set.track_of(representation) else {
                    continue;
                };
                let candidate = Candidate {
                    id: representation.id.clone().unwrap_or_default(),
                    bandwidth: representation.bandwidth,
                    width: representation.width,
                    height: representation.height,
                    plan: self.segment_plan(manifest_url, period, set, representation, estimate)?,
                };

                match track {
                    Track::Video => videos.push(candidate),
                    Track::Audio => {
                        if audio
                            .as_ref()
                            .map_or(true, |best| candidate.bandwidth > best.bandwidth)
                        {
                            audio = Some(candidate);
                        }
                    }
                }
            }
        }

        let audio = audio
            .ok_or_else(|| SenseiError::MpdParsing("no audio representation".to_string()))?;

        let mut by_height: HashMap<u32, Candidate> = HashMap::new();
        for video in videos {
            let Some(height) = video.height else {
                continue;
            };
            match by_height.get(&height) {
                Some(best) if best.bandwidth >= video.bandwidth => {}
                _ => {
                    by_height.insert(height, video);
                }
            }
        }

        let mut variants: Vec<DashVariant> = by_height
            .into_iter()
            .map(|(height, video)| DashVariant {
                height,
                width: video.width.unwrap_or_else(|| width_for_height(height)),
                format_id: FormatId {
                    video: video.id,
                    audio: audio.id.clone(),
                },
                manifest: manifest_url.clone(),
                bandwidth: video.bandwidth,
                video: video.plan,
                audio: audio.plan.clone(),
            })
            .collect();
        variants.sort_by_key(|v| v.height);

        Ok(variants)
    }

    fn segment_plan(
        &self,
        manifest_url: &Url,
        period: &Period,
        set: &AdaptationSet,
        representation: &Representation,
        estimate: &SegmentEstimate,
    ) -> SenseiResult<SegmentPlan> {
        let base = resolve_base(
            manifest_url,
            [
                self.base_url.as_deref(),
                period.base_url.as_deref(),
                set.base_url.as_deref(),
                representation.base_url.as_deref(),
            ],
        )?;

        let Some(template) = representation
            .segment_template
            .as_ref()
            .or(set.segment_template.as_ref())
        else {
            return Ok(SegmentPlan {
                initialization: None,
                media: SegmentAddressing::Single(base),
            });
        };

        let id = representation.id.as_deref().unwrap_or_default();
        let vars = Template::for_representation(id, representation.bandwidth);
        let initialization = template
            .initialization
            .as_deref()
            .map(|init| merge_baseurls(&base, &vars.resolve(init)))
            .transpose()?;
        let media = template.media.as_deref().ok_or_else(|| {
            SenseiError::MpdParsing(format!("SegmentTemplate of {id} has no media attribute"))
        })?;

        let timescale = template.timescale.unwrap_or(1).max(1);
        let start_number = template.start_number.unwrap_or(1);
        let total = period.duration.or(self.duration);

        let media = match &template.timeline {
            Some(timeline) if media.contains("$Time") => {
                let urls = expand_timeline(timeline, timescale, total)
                    .into_iter()
                    .enumerate()
                    .map(|(i, time)| {
                        let path = vars
                            .clone()
                            .with_time(time)
                            .with_number(start_number + i as u64)
                            .resolve(media);
                        merge_baseurls(&base, &path)
                    })
                    .collect::<SenseiResult<Vec<_>>>()?;
                SegmentAddressing::List(urls)
            }
            Some(timeline) => SegmentAddressing::Numbered {
                base,
                template: vars.resolve(media),
                start_number,
                count: SegmentCount::Exact(
                    expand_timeline(timeline, timescale, total).len() as u64
                ),
            },
            None => {
                let count = match (template.duration, total) {
                    (Some(duration), Some(total)) if duration > 0.0 => {
                        let segment_secs = duration / timescale as f64;
                        SegmentCount::Exact((total.as_secs_f64() / segment_secs).ceil() as u64)
                    }
                    _ => SegmentCount::Estimated(estimate.estimate(total.unwrap_or_default())),
                };
                SegmentAddressing::Numbered {
                    base,
                    template: vars.resolve(media),
                    start_number,
                    count,
                }
            }
        };

        Ok(SegmentPlan {
            initialization,
            media,
        })
    }
}

/// Start times of every segment of a timeline.
fn expand_timeline(timeline: &[TimelineEntry], timescale: u64, total: Option<Duration>) -> Vec<u64> {
    let end_of_period = total.map(|t| (t.as_secs_f64() * timescale as f64).round() as u64);

    let mut times = Vec::new();
    let mut current = 0;
    for (i, entry) in timeline.iter().enumerate() {
        if let Some(t) = entry.t {
            current = t;
        }
        if entry.d == 0 {
            continue;
        }

        let repeats = if entry.r >= 0 {
            entry.r as u64
        } else {
            let end = timeline
                .get(i + 1)
                .and_then(|next| next.t)
                .or(end_of_period)
                .unwrap_or(current + entry.d);
            end.saturating_sub(current).div_ceil(entry.d).saturating_sub(1)
        };

        for _ in 0..=repeats {
            times.push(current);
            current += entry.d;
        }
    }
    times
}

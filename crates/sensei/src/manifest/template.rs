// Only `%0[width]d` format tags are allowed in DASH templates, so they are expanded here
// instead of pulling in a printf implementation.
//
// Example template: "$RepresentationID$/$Number%06d$.m4s"

use regex::{Captures, Regex, Replacer};
use std::{collections::HashMap, sync::LazyLock};

static TEMPLATE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$(RepresentationID|Number|Time|Bandwidth)(?:%0(\d+)d)?\$")
        .expect("template regex is valid")
});

/// Identifier substitution for `SegmentTemplate` urls.
#[derive(Debug, Clone, Default)]
pub struct Template {
    args: HashMap<&'static str, String>,
}

impl Template {
    pub const REPRESENTATION_ID: &'static str = "RepresentationID";
    pub const NUMBER: &'static str = "Number";
    pub const TIME: &'static str = "Time";
    pub const BANDWIDTH: &'static str = "Bandwidth";

    pub fn new() -> Self {
        Self::default()
    }

    /// Template bound to one representation.
    pub fn for_representation(id: &str, bandwidth: u64) -> Self {
        let mut template = Self::new();
        template.insert(Self::REPRESENTATION_ID, id.to_string());
        template.insert(Self::BANDWIDTH, bandwidth.to_string());
        template
    }

    pub fn insert(&mut self, key: &'static str, value: String) {
        self.args.insert(key, value);
    }

    pub fn with_number(mut self, number: u64) -> Self {
        self.insert(Self::NUMBER, number.to_string());
        self
    }

    pub fn with_time(mut self, time: u64) -> Self {
        self.insert(Self::TIME, time.to_string());
        self
    }

    /// Identifiers without a value are left untouched.
    pub fn resolve(&self, template: &str) -> String {
        TEMPLATE_REGEX
            .replace_all(template, TemplateReplacer(&self.args))
            .into_owned()
    }
}

struct TemplateReplacer<'a>(&'a HashMap<&'static str, String>);

impl Replacer for TemplateReplacer<'_> {
    fn replace_append(&mut self, caps: &Captures<'_>, dst: &mut String) {
        let whole = caps.get(0).map_or("", |m| m.as_str());
        let value = caps.get(1).and_then(|key| self.0.get(key.as_str()));
        let Some(value) = value else {
            dst.push_str(whole);
            return;
        };

        match caps.get(2).and_then(|m| m.as_str().parse::<usize>().ok()) {
            Some(width) => dst.push_str(&format!("{value:0>width$}")),
            None => dst.push_str(value),
        }
    }
}

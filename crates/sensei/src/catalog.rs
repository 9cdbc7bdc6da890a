//! Course tree handed over by the catalog collaborator.
//!
//! The raw asset objects mirror what the course platform returns, so most fields are optional
//! and loosely typed. [crate::asset] turns them into typed assets.

use std::{collections::HashMap, path::Path};

use serde::Deserialize;

use crate::{error::SenseiResult, util::path::sanitize_filename};

#[derive(Debug, Clone, Deserialize)]
pub struct Course {
    pub id: u64,
    pub title: String,
    #[serde(default)]
    pub chapters: Vec<Chapter>,
}

impl Course {
    pub fn load<P: AsRef<Path>>(path: P) -> SenseiResult<Self> {
        let data = std::fs::read_to_string(path)?;
        Self::from_json(&data)
    }

    pub fn from_json(data: &str) -> SenseiResult<Self> {
        Ok(serde_json::from_str(data)?)
    }

    pub fn lecture_count(&self) -> usize {
        self.chapters.iter().map(|c| c.lectures.len()).sum()
    }

    /// Directory name of the course.
    pub fn dir_name(&self, id_as_name: bool) -> String {
        if id_as_name {
            self.id.to_string()
        } else {
            sanitize_filename(&self.title)
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chapter {
    pub index: u32,
    pub title: String,
    #[serde(default)]
    pub lectures: Vec<Lecture>,
}

impl Chapter {
    pub fn dir_name(&self) -> String {
        format!("{:02} - {}", self.index, sanitize_filename(&self.title))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Lecture {
    /// Position within the chapter, starting at 1.
    pub index: u32,
    pub id: u64,
    pub title: String,
    #[serde(default)]
    pub asset: Option<RawAsset>,
    #[serde(default)]
    pub supplementary_assets: Vec<RawAsset>,
}

impl Lecture {
    /// File stem of everything produced for this lecture.
    pub fn file_stem(&self) -> String {
        format!("{:03} {}", self.index, sanitize_filename(&self.title))
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawAsset {
    pub id: u64,
    #[serde(default)]
    pub asset_type: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub stream_urls: Option<StreamUrls>,
    #[serde(default)]
    pub media_sources: Option<Vec<RawMediaSource>>,
    #[serde(default)]
    pub media_license_token: Option<String>,
    #[serde(default)]
    pub captions: Option<Vec<RawCaption>>,
    #[serde(default)]
    pub download_urls: Option<HashMap<String, Vec<RawDownloadUrl>>>,
    #[serde(default)]
    pub external_url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StreamUrls {
    #[serde(rename = "Video", default)]
    pub video: Option<Vec<RawStreamSource>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawStreamSource {
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub file: Option<String>,
    #[serde(rename = "type", default)]
    pub mime_type: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawMediaSource {
    #[serde(rename = "type", default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub src: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawCaption {
    #[serde(rename = "_class", default)]
    pub class: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub srclang: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub locale_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawDownloadUrl {
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
}

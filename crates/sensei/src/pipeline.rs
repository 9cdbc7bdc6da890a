//! Per-lecture control flow over a whole course.
//!
//! Lectures run one after another. A failing lecture is recorded in the [CourseReport] and the
//! run continues with the next one.

use std::{
    fmt::{Display, Formatter},
    path::{Path, PathBuf},
};

use tokio::io::AsyncWriteExt;

use crate::{
    asset::{Article, Asset, Attachment, ExternalLink, ParsedLecture, VideoAsset},
    caption::download_caption,
    catalog::{Chapter, Course, Lecture},
    config::{RunConfig, SegmentBackend},
    downloader::ytdlp_invocation,
    error::{LectureError, SenseiResult},
    fetch::{DownloadTask, Fetcher},
    keystore::KeyStore,
    manifest::{select_rendition, ManifestResolver},
    media::{DashVariant, HlsRendition, ProgressiveRendition, Rendition, Track},
    orchestrator::{DecryptJob, Orchestrator},
    process::{run_checked, CommandRunner, Toolchain},
    util::path::sanitize_track_name,
    HttpClient,
};

/// Name of the per-chapter directory holding transient files.
pub const WORK_DIR_NAME: &str = ".sensei";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    AlreadyDownloaded,
    LecturesDisabled,
    AssetsDisabled,
    NoAsset,
    Unsupported(String),
}

impl Display for SkipReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::AlreadyDownloaded => f.write_str("already downloaded"),
            SkipReason::LecturesDisabled => f.write_str("lecture downloads disabled"),
            SkipReason::AssetsDisabled => f.write_str("asset downloads disabled"),
            SkipReason::NoAsset => f.write_str("no asset"),
            SkipReason::Unsupported(reason) => write!(f, "unsupported: {reason}"),
        }
    }
}

#[derive(Debug)]
pub enum LectureResult {
    Downloaded,
    Skipped(SkipReason),
    Failed(LectureError),
}

#[derive(Debug)]
pub struct LectureReport {
    pub chapter: u32,
    pub lecture: u32,
    pub title: String,
    pub result: LectureResult,
}

/// Outcome of every lecture of a course run, in processing order.
#[derive(Debug, Default)]
pub struct CourseReport {
    pub lectures: Vec<LectureReport>,
}

impl CourseReport {
    pub fn downloaded(&self) -> usize {
        self.count(|r| matches!(r, LectureResult::Downloaded))
    }

    pub fn skipped(&self) -> usize {
        self.count(|r| matches!(r, LectureResult::Skipped(_)))
    }

    pub fn failed(&self) -> impl Iterator<Item = &LectureReport> {
        self.lectures
            .iter()
            .filter(|l| matches!(l.result, LectureResult::Failed(_)))
    }

    fn count<F: Fn(&LectureResult) -> bool>(&self, predicate: F) -> usize {
        self.lectures.iter().filter(|l| predicate(&l.result)).count()
    }
}

impl Display for CourseReport {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "{} lectures: {} downloaded, {} skipped, {} failed",
            self.lectures.len(),
            self.downloaded(),
            self.skipped(),
            self.failed().count()
        )?;
        for report in self.failed() {
            if let LectureResult::Failed(e) = &report.result {
                writeln!(
                    f,
                    "  chapter {} lecture {} ({}): {e}",
                    report.chapter, report.lecture, report.title
                )?;
            }
        }
        Ok(())
    }
}

pub struct Pipeline<R> {
    config: RunConfig,
    resolver: ManifestResolver,
    fetcher: Fetcher,
    orchestrator: Orchestrator<R>,
}

impl<R: CommandRunner> Pipeline<R> {
    pub fn new(
        config: RunConfig,
        client: HttpClient,
        keys: KeyStore,
        toolchain: Toolchain,
        runner: R,
    ) -> Self {
        let resolver = ManifestResolver::new(client.clone(), config.segment_estimate);
        let fetcher = Fetcher::new(client, config.retry);
        let orchestrator = Orchestrator::new(
            runner,
            toolchain,
            keys,
            config.decryptor,
            config.h265.clone(),
        );

        Self {
            config,
            resolver,
            fetcher,
            orchestrator,
        }
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Directory the course is written to.
    pub fn course_dir(&self, course: &Course) -> PathBuf {
        self.config
            .download_dir
            .join(course.dir_name(self.config.id_as_course_name))
    }

    pub async fn run_course(&self, course: &Course) -> SenseiResult<CourseReport> {
        let course_dir = self.course_dir(course);
        tokio::fs::create_dir_all(&course_dir).await?;
        tracing::info!(
            "Downloading {} ({} chapters, {} lectures) to {}",
            course.title,
            course.chapters.len(),
            course.lecture_count(),
            course_dir.display()
        );

        let mut report = CourseReport::default();
        for chapter in &course.chapters {
            let chapter_dir = course_dir.join(chapter.dir_name());
            tokio::fs::create_dir_all(&chapter_dir).await?;
            tracing::info!(chapter = chapter.index, "Processing chapter {}", chapter.title);

            for lecture in &chapter.lectures {
                let result = self.run_lecture(chapter, &chapter_dir, lecture).await;
                report.lectures.push(LectureReport {
                    chapter: chapter.index,
                    lecture: lecture.index,
                    title: lecture.title.clone(),
                    result,
                });
            }

            remove_empty_dir(&chapter_dir.join(WORK_DIR_NAME)).await;
        }

        Ok(report)
    }

    /// Runs one lecture. Never fails; errors end up in [LectureResult::Failed].
    pub async fn run_lecture(
        &self,
        chapter: &Chapter,
        chapter_dir: &Path,
        lecture: &Lecture,
    ) -> LectureResult {
        tracing::info!(
            chapter = chapter.index,
            lecture = lecture.index,
            "Processing lecture {}",
            lecture.title
        );

        let result = match self.process_lecture(chapter_dir, lecture).await {
            Ok(result) => result,
            Err(e) => {
                tracing::error!(
                    chapter = chapter.index,
                    lecture = lecture.index,
                    "Lecture {} failed: {e}",
                    lecture.title
                );
                LectureResult::Failed(e)
            }
        };

        if let LectureResult::Skipped(reason) = &result {
            tracing::info!(
                chapter = chapter.index,
                lecture = lecture.index,
                "Skipped {}: {reason}",
                lecture.title
            );
        }
        result
    }

    async fn process_lecture(
        &self,
        chapter_dir: &Path,
        lecture: &Lecture,
    ) -> Result<LectureResult, LectureError> {
        let parsed = ParsedLecture::parse(lecture);
        let stem = lecture.file_stem();

        if self.config.download_assets {
            for asset in &parsed.attachments {
                if let Err(e) = self.supplement(chapter_dir, lecture, asset).await {
                    tracing::warn!(lecture = lecture.index, "Failed to save attachment: {e}");
                }
            }
        }

        let Some(main) = parsed.main else {
            return Ok(LectureResult::Skipped(SkipReason::NoAsset));
        };
        match &main {
            Asset::Video(video) => {
                if self.config.captions.enabled {
                    self.captions(chapter_dir, &stem, video).await;
                }
                if self.config.skip_lectures {
                    return Ok(LectureResult::Skipped(SkipReason::LecturesDisabled));
                }
                self.video(chapter_dir, &stem, &lecture.title, video).await
            }
            Asset::Article(article) => {
                if self.config.skip_lectures {
                    return Ok(LectureResult::Skipped(SkipReason::LecturesDisabled));
                }
                self.article(chapter_dir, &stem, article).await
            }
            Asset::Unsupported(reason) => {
                Ok(LectureResult::Skipped(SkipReason::Unsupported(reason.clone())))
            }
            asset if !self.config.download_assets => {
                tracing::debug!("Not saving {asset:?}");
                Ok(LectureResult::Skipped(SkipReason::AssetsDisabled))
            }
            asset => self.supplement(chapter_dir, lecture, asset).await,
        }
    }

    async fn video(
        &self,
        chapter_dir: &Path,
        stem: &str,
        title: &str,
        video: &VideoAsset,
    ) -> Result<LectureResult, LectureError> {
        let output = chapter_dir.join(format!("{stem}.mp4"));
        if output.is_file() {
            return Ok(LectureResult::Skipped(SkipReason::AlreadyDownloaded));
        }

        let media = self.resolver.resolve(video, self.config.skip_hls).await;
        let rendition = select_rendition(&media.renditions, self.config.quality)
            .ok_or(LectureError::NoRendition)?;
        tracing::info!(
            "Selected {}x{} of asset {}{}",
            rendition.width(),
            rendition.height(),
            media.id,
            if media.encrypted { " (encrypted)" } else { "" }
        );

        let work_dir = chapter_dir.join(WORK_DIR_NAME).join(stem);
        match rendition {
            Rendition::Progressive(rendition) => self.progressive(rendition, &output).await?,
            Rendition::Segmented(rendition) => {
                self.hls(rendition, &work_dir, stem, title, &output).await?
            }
            Rendition::Dash(variant) => {
                self.encrypted(variant, &work_dir, stem, title, &output)
                    .await?
            }
        }

        match tokio::fs::remove_dir_all(&work_dir).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!("Failed to remove {}: {e}", work_dir.display()),
        }
        Ok(LectureResult::Downloaded)
    }

    async fn progressive(
        &self,
        rendition: &ProgressiveRendition,
        output: &Path,
    ) -> Result<(), LectureError> {
        let task = DownloadTask::new(rendition.url.clone(), output);
        self.fetcher.fetch_progressive(&task).await?;
        Ok(())
    }

    async fn hls(
        &self,
        rendition: &HlsRendition,
        work_dir: &Path,
        stem: &str,
        title: &str,
        output: &Path,
    ) -> Result<(), LectureError> {
        let plan = self.resolver.media_playlist(rendition).await?;
        let merged = work_dir.join(format!("{stem}.ts"));
        self.fetcher
            .fetch_track(
                Track::Video.as_str(),
                &plan,
                &work_dir.join("segments"),
                &merged,
            )
            .await?;
        self.orchestrator.remux(&merged, title, output).await
    }

    async fn encrypted(
        &self,
        variant: &DashVariant,
        work_dir: &Path,
        stem: &str,
        title: &str,
        output: &Path,
    ) -> Result<(), LectureError> {
        let track_stem = sanitize_track_name(stem);
        let job = DecryptJob::new(work_dir, &track_stem, title, output);

        if job.encrypted_video.is_file() && job.encrypted_audio.is_file() {
            tracing::info!("Encrypted tracks already downloaded");
        } else {
            tracing::info!("Downloading encrypted tracks {}", variant.format_id);
            self.fetch_encrypted(variant, work_dir, &track_stem, &job)
                .await?;
        }

        self.orchestrator.decrypt_and_mux(&job).await
    }

    async fn fetch_encrypted(
        &self,
        variant: &DashVariant,
        work_dir: &Path,
        stem: &str,
        job: &DecryptJob,
    ) -> Result<(), LectureError> {
        tokio::fs::create_dir_all(work_dir).await?;

        match self.config.segment_backend {
            SegmentBackend::Native => {
                let fetch = |track: Track| async move {
                    let segments = work_dir.join(track.as_str());
                    self.fetcher
                        .fetch_track(
                            track.as_str(),
                            variant.track(track),
                            &segments,
                            job.encrypted(track),
                        )
                        .await
                };
                tokio::try_join!(fetch(Track::Video), fetch(Track::Audio))?;
            }
            SegmentBackend::YtDlp => {
                let toolchain = self.orchestrator.toolchain();
                let program = toolchain
                    .downloader
                    .as_deref()
                    .unwrap_or_else(|| Path::new("yt-dlp"));
                let invocation = ytdlp_invocation(
                    program,
                    variant,
                    work_dir,
                    stem,
                    self.config.concurrent_fragments,
                );
                run_checked(self.orchestrator.runner(), &invocation).await?;
            }
        }
        Ok(())
    }

    async fn captions(&self, chapter_dir: &Path, stem: &str, video: &VideoAsset) {
        let wanted: Vec<_> = video
            .captions
            .iter()
            .filter(|c| self.config.captions.wants(&c.language))
            .collect();
        if wanted.is_empty() {
            tracing::debug!(
                "No captions for locale {} among {}",
                self.config.captions.locale,
                video.captions.len()
            );
            return;
        }

        for caption in wanted {
            if let Err(e) = download_caption(
                &self.fetcher,
                caption,
                chapter_dir,
                stem,
                self.config.captions.keep_vtt,
            )
            .await
            {
                tracing::warn!("Failed to download {} caption: {e}", caption.language);
            }
        }
    }

    async fn article(
        &self,
        chapter_dir: &Path,
        stem: &str,
        article: &Article,
    ) -> Result<LectureResult, LectureError> {
        let path = chapter_dir.join(format!("{stem}.html"));
        if path.is_file() {
            return Ok(LectureResult::Skipped(SkipReason::AlreadyDownloaded));
        }
        if article.body.trim().is_empty() {
            return Ok(LectureResult::Skipped(SkipReason::NoAsset));
        }

        tokio::fs::write(&path, &article.body).await?;
        tracing::info!("Saved article to {}", path.display());
        Ok(LectureResult::Downloaded)
    }

    async fn supplement(
        &self,
        chapter_dir: &Path,
        lecture: &Lecture,
        asset: &Asset,
    ) -> Result<LectureResult, LectureError> {
        match asset {
            Asset::ExternalLink(link) => {
                save_external_link(chapter_dir, lecture.index, link).await?;
                Ok(LectureResult::Downloaded)
            }
            Asset::Unsupported(reason) => {
                tracing::debug!("Ignoring attachment: {reason}");
                Ok(LectureResult::Skipped(SkipReason::Unsupported(reason.clone())))
            }
            asset => match asset.attachment() {
                Some(attachment) => self.attachment(chapter_dir, attachment).await,
                None => Ok(LectureResult::Skipped(SkipReason::Unsupported(format!(
                    "{asset:?}"
                )))),
            },
        }
    }

    async fn attachment(
        &self,
        chapter_dir: &Path,
        attachment: &Attachment,
    ) -> Result<LectureResult, LectureError> {
        let task = DownloadTask::new(attachment.url.clone(), chapter_dir.join(&attachment.filename));
        tracing::info!("Downloading attachment {}", attachment.filename);
        self.fetcher.fetch_progressive(&task).await?;
        Ok(LectureResult::Downloaded)
    }
}

/// Writes `<index> <title>.url` and appends the link to the chapter's `external-links.txt`
/// unless a link of that name is already listed.
pub async fn save_external_link(
    chapter_dir: &Path,
    index: u32,
    link: &ExternalLink,
) -> std::io::Result<()> {
    let name = format!("{index:03} {}", link.title);
    let shortcut = chapter_dir.join(format!("{name}.url"));
    tokio::fs::write(&shortcut, format!("[InternetShortcut]\nURL={}", link.url)).await?;

    let list = chapter_dir.join("external-links.txt");
    let listed = match tokio::fs::read_to_string(&list).await {
        Ok(content) => content
            .lines()
            .any(|line| line.trim().eq_ignore_ascii_case(&name)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
        Err(e) => return Err(e),
    };
    if !listed {
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&list)
            .await?;
        file.write_all(format!("\n{name}\n{}\n", link.url).as_bytes())
            .await?;
        file.flush().await?;
    }
    Ok(())
}

async fn remove_empty_dir(dir: &Path) {
    // only succeeds once every lecture of the chapter cleaned up
    let _ = tokio::fs::remove_dir(dir).await;
}

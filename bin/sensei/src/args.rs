use std::{path::PathBuf, str::FromStr, time::Duration};

use anyhow::Context;
use clap::{Args, Parser};
use fake_user_agent::get_chrome_rua;
use reqwest::{
    header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, USER_AGENT},
    Client,
};
use sensei::{
    catalog::Course,
    config::{
        CaptionOptions, DecryptorKind, H265Options, RetryPolicy, SegmentBackend, SegmentEstimate,
    },
    process::{SystemRunner, Toolchain},
    HttpClient, KeyStore, Pipeline, RunConfig,
};

#[derive(Parser, Clone, Debug)]
#[clap(name = "sensei", version, about)]
pub struct SenseiArgs {
    #[clap(flatten)]
    pub http: HttpOptions,

    #[clap(flatten)]
    pub download: DownloadOptions,

    #[clap(flatten)]
    pub output: OutputOptions,

    #[clap(flatten)]
    pub decrypt: DecryptOptions,

    /// Course tree exported by the catalog, as JSON
    #[clap(long)]
    pub course: PathBuf,

    /// Log at debug level, including the output of external tools
    #[clap(short, long)]
    pub verbose: bool,
}

impl SenseiArgs {
    pub async fn run(self) -> anyhow::Result<()> {
        let course = Course::load(&self.course)
            .with_context(|| format!("Failed to read course {}", self.course.display()))?;
        let keys = KeyStore::load(&self.decrypt.keyfile)?;

        let config = self.run_config();
        let toolchain = Toolchain::locate(&config)?;
        let client = self.http.into_client(config.request_timeout)?;

        let pipeline = Pipeline::new(config, client, keys, toolchain, SystemRunner);
        let report = pipeline.run_course(&course).await?;

        print!("{report}");
        Ok(())
    }

    fn run_config(&self) -> RunConfig {
        RunConfig {
            download_dir: self.output.download_dir.clone(),
            quality: self.download.quality,
            skip_hls: self.download.skip_hls,
            skip_lectures: self.download.skip_lectures,
            download_assets: self.download.assets,
            captions: CaptionOptions {
                enabled: self.output.captions,
                locale: self.output.caption_locale.clone(),
                keep_vtt: self.output.keep_vtt,
            },
            id_as_course_name: self.output.id_as_course_name,
            retry: RetryPolicy::new(
                self.download.retries,
                Duration::from_millis(self.download.backoff_ms),
            ),
            request_timeout: Duration::from_secs(self.http.timeout),
            segment_estimate: SegmentEstimate {
                assumed_segment_secs: self.download.segment_secs,
                padding: self.download.segment_padding,
            },
            segment_backend: self.download.downloader,
            concurrent_fragments: self.download.concurrent_fragments,
            decryptor: self.decrypt.decryptor,
            h265: self.decrypt.h265.then(|| H265Options {
                crf: self.decrypt.h265_crf,
                preset: self.decrypt.h265_preset.clone(),
                nvenc: self.decrypt.h265_nvenc,
            }),
        }
    }
}

#[derive(Args, Clone, Debug)]
pub struct HttpOptions {
    /// Additional HTTP headers
    #[clap(short = 'H', long = "header")]
    pub headers: Vec<String>,

    /// Bearer token of the logged in account
    #[clap(long, env = "SENSEI_BEARER_TOKEN", hide_env_values = true)]
    pub bearer: Option<String>,

    /// Cookies in `name=value` form
    #[clap(long = "cookie")]
    pub cookies: Vec<String>,

    /// Site the cookies belong to
    #[clap(long, requires = "cookies")]
    pub cookie_url: Option<String>,

    /// HTTP timeout, in seconds
    #[clap(long, default_value = "30")]
    pub timeout: u64,
}

impl HttpOptions {
    pub fn into_client(self, timeout: Duration) -> anyhow::Result<HttpClient> {
        let mut headers = HeaderMap::new();
        for header in &self.headers {
            let (key, value) = header
                .split_once(':')
                .with_context(|| format!("Invalid header: {header}"))?;
            headers.insert(
                HeaderName::from_str(key.trim())?,
                HeaderValue::from_str(value.trim())?,
            );
        }
        if let Some(token) = &self.bearer {
            headers.insert(AUTHORIZATION, HeaderValue::from_str(&format!("Bearer {token}"))?);
        }
        if !headers.contains_key(USER_AGENT) {
            headers.insert(USER_AGENT, HeaderValue::try_from(get_chrome_rua())?);
        }

        let client = HttpClient::new(
            Client::builder()
                .default_headers(headers)
                .timeout(timeout),
        )?;

        if !self.cookies.is_empty() {
            let url = self
                .cookie_url
                .context("--cookie-url is required together with --cookie")?;
            client.add_cookies(self.cookies, url.as_str())?;
        }
        Ok(client)
    }
}

#[derive(Args, Clone, Debug)]
pub struct DownloadOptions {
    /// Preferred video height. The closest available one is used
    #[clap(short, long)]
    pub quality: Option<u32>,

    /// Ignore HLS sources of clear lectures
    #[clap(long)]
    pub skip_hls: bool,

    /// Do not download lecture videos and articles
    #[clap(long)]
    pub skip_lectures: bool,

    /// Download attachments and external links
    #[clap(long)]
    pub assets: bool,

    /// Attempts per request
    #[clap(long, default_value = "3")]
    pub retries: u32,

    /// Pause between attempts, in milliseconds
    #[clap(long, default_value = "2000")]
    pub backoff_ms: u64,

    /// Fetcher of encrypted segments: native or yt-dlp
    #[clap(long, default_value = "native")]
    pub downloader: SegmentBackend,

    /// Parallel fragment downloads of yt-dlp
    #[clap(long, default_value = "10")]
    pub concurrent_fragments: u32,

    /// Assumed segment duration when a manifest does not announce one
    #[clap(long, default_value = "6")]
    pub segment_secs: f64,

    /// Extra segments tried beyond the estimated count
    #[clap(long, default_value = "20")]
    pub segment_padding: u64,
}

#[derive(Args, Clone, Debug)]
pub struct OutputOptions {
    /// Root directory of every course
    #[clap(short = 'o', long, default_value = "out_dir")]
    pub download_dir: PathBuf,

    /// Name the course directory after the course id
    #[clap(long)]
    pub id_as_course_name: bool,

    /// Download captions
    #[clap(long)]
    pub captions: bool,

    /// Caption language, or `all`
    #[clap(long, default_value = "en")]
    pub caption_locale: String,

    /// Keep WebVTT captions next to the converted SubRip files
    #[clap(long)]
    pub keep_vtt: bool,
}

/// Decrypt related arguments
#[derive(Args, Clone, Debug)]
pub struct DecryptOptions {
    /// JSON object of key id to key
    #[clap(long, default_value = "keyfile.json")]
    pub keyfile: PathBuf,

    /// shaka-packager or mp4decrypt
    #[clap(long, default_value = "shaka-packager")]
    pub decryptor: DecryptorKind,

    /// Re-encode videos to H.265
    #[clap(long)]
    pub h265: bool,

    #[clap(long, default_value = "28")]
    pub h265_crf: u8,

    #[clap(long, default_value = "medium")]
    pub h265_preset: String,

    /// Encode with NVENC
    #[clap(long)]
    pub h265_nvenc: bool,
}

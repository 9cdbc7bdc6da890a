use std::{
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
    time::Duration,
};

use sensei::{
    config::{DecryptorKind, RetryPolicy},
    fetch::Fetcher,
    process::{CommandRunner, ExitStatus, Invocation, Toolchain},
    HttpClient, SenseiResult,
};
use sensei_pssh::WIDEVINE_SYSTEM_ID;
use wiremock::{
    matchers::{method, path},
    Mock, MockServer, ResponseTemplate,
};

pub const VIDEO_KID: &str = "0a1b2c3d4e5f60718293a4b5c6d7e8f9";
pub const AUDIO_KID: &str = "f9e8d7c6b5a4938271605f4e3d2c1b0a";
pub const VIDEO_KEY: &str = "00112233445566778899aabbccddeeff";
pub const AUDIO_KEY: &str = "ffeeddccbbaa99887766554433221100";

fn mp4_box(box_type: &[u8; 4], payload: &[u8]) -> Vec<u8> {
    let mut data = ((payload.len() + 8) as u32).to_be_bytes().to_vec();
    data.extend_from_slice(box_type);
    data.extend_from_slice(payload);
    data
}

/// Initialization segment whose Widevine header carries `kid` as content id.
pub fn encrypted_init(kid: &str) -> Vec<u8> {
    let content_id: Vec<u8> = (0..kid.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&kid[i..i + 2], 16).unwrap())
        .collect();

    // protobuf field 4, length delimited
    let mut header = vec![0x22, content_id.len() as u8];
    header.extend_from_slice(&content_id);

    let mut pssh = vec![0, 0, 0, 0];
    pssh.extend_from_slice(&WIDEVINE_SYSTEM_ID);
    pssh.extend_from_slice(&(header.len() as u32).to_be_bytes());
    pssh.extend_from_slice(&header);

    let mut data = mp4_box(b"ftyp", b"iso6\0\0\0\0iso6dash");
    data.extend(mp4_box(
        b"moov",
        &[mp4_box(b"mvhd", &[0; 100]), mp4_box(b"pssh", &pssh)].concat(),
    ));
    data
}

pub fn fetcher() -> Fetcher {
    Fetcher::new(HttpClient::default(), fast_retry())
}

pub fn fast_retry() -> RetryPolicy {
    RetryPolicy::new(3, Duration::ZERO)
}

/// Serves `body` for GET requests to `route`, expecting exactly `times` of them.
pub async fn serve(server: &MockServer, route: &str, body: impl Into<Vec<u8>>, times: u64) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body.into()))
        .expect(times)
        .mount(server)
        .await;
}

pub async fn not_found(server: &MockServer, route: &str, times: u64) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(404))
        .expect(times)
        .mount(server)
        .await;
}

/// Tools with their location left to `PATH`.
pub fn toolchain(decryptor: DecryptorKind) -> Toolchain {
    Toolchain {
        ffmpeg: PathBuf::from("ffmpeg"),
        decryptor: PathBuf::from(decryptor.executables()[0]),
        downloader: Some(PathBuf::from("yt-dlp")),
    }
}

/// Records every invocation and pretends the tool wrote its outputs.
///
/// `yt-dlp` leaves both encrypted tracks behind, every other tool writes the file named by its
/// last argument (or the `output=` field of a shaka-packager stream descriptor). Relative names
/// resolve against the invocation's working directory.
#[derive(Clone, Default)]
pub struct RecordingRunner {
    calls: Arc<Mutex<Vec<Invocation>>>,
    failing_tool: Option<&'static str>,
}

impl RecordingRunner {
    pub fn failing(tool: &'static str) -> Self {
        Self {
            failing_tool: Some(tool),
            ..Default::default()
        }
    }

    pub fn calls(&self) -> Vec<Invocation> {
        self.calls.lock().unwrap().clone()
    }

    pub fn tools(&self) -> Vec<String> {
        self.calls().iter().map(Invocation::tool).collect()
    }
}

fn outputs(invocation: &Invocation) -> Vec<(String, Vec<u8>)> {
    let tool = invocation.tool();
    if tool == "yt-dlp" {
        let Some(template) = invocation
            .args
            .iter()
            .skip_while(|arg| *arg != "-o")
            .nth(1)
        else {
            return vec![];
        };
        return vec![
            (template.replace("%(ext)s", "mp4"), encrypted_init(VIDEO_KID)),
            (template.replace("%(ext)s", "m4a"), encrypted_init(AUDIO_KID)),
        ];
    }

    let Some(last) = invocation.args.last() else {
        return vec![];
    };
    let output = match last.rsplit_once(",output=") {
        Some((_, output)) => output,
        None => last.as_str(),
    };
    vec![(output.to_string(), tool.into_bytes())]
}

impl CommandRunner for RecordingRunner {
    async fn run(&self, invocation: &Invocation) -> SenseiResult<ExitStatus> {
        self.calls.lock().unwrap().push(invocation.clone());

        if self.failing_tool == Some(invocation.tool().as_str()) {
            return Ok(ExitStatus(Some(1)));
        }
        let dir = invocation.current_dir.clone().unwrap_or_default();
        for (output, content) in outputs(invocation) {
            let output = dir.join(output);
            if output.parent().is_some_and(Path::is_dir) {
                std::fs::write(output, content)?;
            }
        }
        Ok(ExitStatus::SUCCESS)
    }
}

//! External tools run as argument vectors, never through a shell.

use std::{
    fmt::{Display, Formatter},
    future::Future,
    path::{Path, PathBuf},
    process::Stdio,
};

use tokio::{
    io::{AsyncBufReadExt, AsyncRead, BufReader},
    process::Command,
};

use crate::{
    config::{RunConfig, SegmentBackend},
    error::{LectureError, SenseiError, SenseiResult},
};

/// A command line to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub current_dir: Option<PathBuf>,
}

impl Invocation {
    pub fn new<P: Into<PathBuf>>(program: P) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            current_dir: None,
        }
    }

    pub fn arg<S: Into<String>>(mut self, arg: S) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn path_arg<P: AsRef<Path>>(self, path: P) -> Self {
        let arg = path.as_ref().to_string_lossy().into_owned();
        self.arg(arg)
    }

    pub fn current_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    /// File name of the program, used to prefix its output.
    pub fn tool(&self) -> String {
        self.program
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.program.to_string_lossy().into_owned())
    }

    /// Shell-quoted rendering for logs.
    pub fn render(&self) -> String {
        let program = self.program.to_string_lossy();
        let words = std::iter::once(program.as_ref()).chain(self.args.iter().map(String::as_str));
        shlex::try_join(words).unwrap_or_else(|_| {
            std::iter::once(program.to_string())
                .chain(self.args.iter().cloned())
                .collect::<Vec<_>>()
                .join(" ")
        })
    }
}

/// Exit code of a finished process. `None` when it was killed by a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitStatus(pub Option<i32>);

impl ExitStatus {
    pub const SUCCESS: Self = Self(Some(0));

    pub fn success(&self) -> bool {
        self.0 == Some(0)
    }
}

impl Display for ExitStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.0 {
            Some(code) => write!(f, "exit code {code}"),
            None => f.write_str("signal"),
        }
    }
}

pub trait CommandRunner: Send + Sync {
    fn run(&self, invocation: &Invocation) -> impl Future<Output = SenseiResult<ExitStatus>> + Send;
}

/// Runs `invocation` and turns a non-zero exit into [LectureError::ToolFailed].
pub async fn run_checked<R: CommandRunner>(
    runner: &R,
    invocation: &Invocation,
) -> Result<(), LectureError> {
    let status = runner.run(invocation).await?;
    if status.success() {
        return Ok(());
    }

    let command = invocation.render();
    tracing::error!("{} failed with {status}: {command}", invocation.tool());
    Err(LectureError::ToolFailed {
        tool: invocation.tool(),
        status: status.to_string(),
        command,
    })
}

/// Spawns real processes, forwarding their output to the log line by line.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    async fn run(&self, invocation: &Invocation) -> SenseiResult<ExitStatus> {
        let tool = invocation.tool();
        let mut command = Command::new(&invocation.program);
        command
            .args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &invocation.current_dir {
            command.current_dir(dir);
        }

        tracing::debug!("Running {}", invocation.render());
        let mut child = command.spawn().map_err(|source| SenseiError::ProcessSpawn {
            tool: tool.clone(),
            source,
        })?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let (status, _, _) = tokio::join!(
            child.wait(),
            forward_lines(&tool, stdout),
            forward_lines(&tool, stderr)
        );

        Ok(ExitStatus(status?.code()))
    }
}

async fn forward_lines<R: AsyncRead + Unpin>(tool: &str, reader: Option<R>) {
    let Some(reader) = reader else {
        return;
    };
    let mut lines = BufReader::new(reader).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        tracing::debug!("[{tool}] {line}");
    }
}

/// Locations of the external tools a run needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toolchain {
    pub ffmpeg: PathBuf,
    pub decryptor: PathBuf,
    /// Only set when segments are fetched by `yt-dlp`.
    pub downloader: Option<PathBuf>,
}

impl Toolchain {
    /// Looks every required tool up in `PATH`. A missing tool is fatal for the run.
    pub fn locate(config: &RunConfig) -> SenseiResult<Self> {
        let ffmpeg = find(&["ffmpeg"])?;
        let decryptor = find(config.decryptor.executables())?;
        let downloader = match config.segment_backend {
            SegmentBackend::Native => None,
            SegmentBackend::YtDlp => Some(find(&["yt-dlp"])?),
        };

        tracing::debug!(
            "Using ffmpeg at {}, decryptor at {}",
            ffmpeg.display(),
            decryptor.display()
        );
        Ok(Self {
            ffmpeg,
            decryptor,
            downloader,
        })
    }
}

fn find(names: &'static [&'static str]) -> SenseiResult<PathBuf> {
    let mut last = None;
    for name in names {
        match which::which(name) {
            Ok(path) => return Ok(path),
            Err(source) => last = Some((*name, source)),
        }
    }

    match last {
        Some((name, source)) => Err(SenseiError::MissingExecutable { name, source }),
        None => Err(SenseiError::MissingExecutable {
            name: "<none>",
            source: which::Error::CannotFindBinaryPath,
        }),
    }
}

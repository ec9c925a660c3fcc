pub mod lines;
pub mod supervisor;

pub use lines::ProgressLines;
pub use supervisor::{check_binary, ProcessSupervisor};

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use regex::Regex;

use crate::error::{Result, ShortreelError};

/// Decides whether an output line proves the process is still making progress.
#[derive(Clone)]
pub struct Heartbeat {
    matcher: Arc<dyn Fn(&str) -> bool + Send + Sync>,
    description: String,
}

impl Heartbeat {
    pub fn from_fn<F>(description: impl Into<String>, f: F) -> Self
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        Self {
            matcher: Arc::new(f),
            description: description.into(),
        }
    }

    pub fn contains(token: impl Into<String>) -> Self {
        let token = token.into();
        let description = format!("contains {token:?}");
        Self::from_fn(description, move |line| line.contains(&token))
    }

    pub fn matching(pattern: Regex) -> Self {
        let description = format!("matches /{}/", pattern.as_str());
        Self::from_fn(description, move |line| pattern.is_match(line))
    }

    /// Every line counts.
    pub fn any_line() -> Self {
        Self::from_fn("any line", |_| true)
    }

    /// FFmpeg's video status line.
    pub fn ffmpeg_video() -> Self {
        Self::contains("frame=")
    }

    /// FFmpeg's status line for audio-only outputs, which has no frame counter.
    pub fn ffmpeg_audio() -> Self {
        Self::contains("size=")
    }

    pub fn is_beat(&self, line: &str) -> bool {
        (self.matcher)(line)
    }
}

impl fmt::Debug for Heartbeat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Heartbeat").field(&self.description).finish()
    }
}

/// Which output stream carries the progress lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProgressChannel {
    Stdout,
    #[default]
    Stderr,
}

/// One external process invocation.
#[derive(Debug, Clone)]
pub struct TaskDescriptor {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub working_dir: Option<PathBuf>,
    pub stall_timeout: Duration,
    pub heartbeat: Heartbeat,
    pub progress_channel: ProgressChannel,
    /// Short name used in logs and errors.
    pub label: String,
}

impl TaskDescriptor {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        let program = program.into();
        let label = program
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| program.display().to_string());

        Self {
            program,
            args,
            working_dir: None,
            stall_timeout: Duration::from_secs(60),
            heartbeat: Heartbeat::ffmpeg_video(),
            progress_channel: ProgressChannel::default(),
            label,
        }
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn with_stall_timeout(mut self, timeout: Duration) -> Self {
        self.stall_timeout = timeout;
        self
    }

    pub fn with_heartbeat(mut self, heartbeat: Heartbeat) -> Self {
        self.heartbeat = heartbeat;
        self
    }

    pub fn with_progress_channel(mut self, channel: ProgressChannel) -> Self {
        self.progress_channel = channel;
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// The command line as a single string, for logging.
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.display().to_string())
            .chain(self.args.iter().cloned())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// How a supervised run ended.
#[derive(Debug)]
pub enum SupervisionOutcome {
    /// The process exited on its own. Signal deaths report `128 + signo`.
    Completed(i32),
    StallTerminated,
    SignalTerminated,
    LaunchFailed(std::io::Error),
}

/// Outcome of a run plus what is needed to diagnose it.
#[derive(Debug)]
pub struct SupervisionReport {
    pub label: String,
    pub outcome: SupervisionOutcome,
    /// The last lines of progress output, oldest first.
    pub tail: Vec<String>,
    pub elapsed: Duration,
}

impl SupervisionReport {
    pub fn succeeded(&self) -> bool {
        matches!(self.outcome, SupervisionOutcome::Completed(0))
    }

    /// Treat anything but a clean zero exit as an error.
    pub fn into_result(self) -> Result<()> {
        match self.outcome {
            SupervisionOutcome::Completed(0) => Ok(()),
            SupervisionOutcome::Completed(code) => Err(ShortreelError::NonZeroExit {
                label: self.label,
                code,
                tail: self.tail,
            }),
            SupervisionOutcome::StallTerminated => Err(ShortreelError::StallTerminated(self.label)),
            SupervisionOutcome::SignalTerminated => {
                Err(ShortreelError::SignalTerminated(self.label))
            }
            SupervisionOutcome::LaunchFailed(source) => Err(ShortreelError::LaunchFailed {
                program: self.label,
                source,
            }),
        }
    }
}

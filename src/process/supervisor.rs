use std::collections::VecDeque;
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::io::AsyncRead;
use tokio::process::{Child, Command};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::cancel::CancelToken;
use crate::error::{Result, ShortreelError};

use super::{
    ProgressChannel, ProgressLines, SupervisionOutcome, SupervisionReport, TaskDescriptor,
};

/// Number of output lines kept for error reports.
const TAIL_LINES: usize = 20;

type ProgressStream = Box<dyn AsyncRead + Unpin + Send>;

/// Check that an encoder binary is installed and runnable.
pub fn check_binary(program: &Path) -> Result<()> {
    let output = std::process::Command::new(program)
        .arg("-version")
        .output()
        .map_err(|source| ShortreelError::LaunchFailed {
            program: program.display().to_string(),
            source,
        })?;

    if !output.status.success() {
        return Err(ShortreelError::NonZeroExit {
            label: program.display().to_string(),
            code: exit_code(output.status),
            tail: Vec::new(),
        });
    }

    debug!("{} is available", program.display());
    Ok(())
}

/// Runs external processes, watching their progress output for stalls.
///
/// The child is owned by `run` for its whole lifetime. A stall, or a cancel
/// request on the token, sends SIGTERM, waits out the grace period and then
/// kills the child outright, so no encoder outlives the call.
#[derive(Debug, Clone)]
pub struct ProcessSupervisor {
    cancel: CancelToken,
    kill_grace: Duration,
}

enum Event {
    Line(std::io::Result<Option<String>>),
    Exited(std::io::Result<ExitStatus>),
    Stalled,
    Cancelled,
}

impl ProcessSupervisor {
    pub fn new(cancel: CancelToken) -> Self {
        Self {
            cancel,
            kill_grace: Duration::from_secs(1),
        }
    }

    /// Time allowed between SIGTERM and SIGKILL.
    pub fn with_kill_grace(mut self, grace: Duration) -> Self {
        self.kill_grace = grace;
        self
    }

    /// The token this supervisor stops on, for callers with work of their own
    /// between encoder runs.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub async fn run(&self, task: TaskDescriptor) -> SupervisionReport {
        let started = Instant::now();
        let mut cancel = self.cancel.clone();
        let mut tail: VecDeque<String> = VecDeque::with_capacity(TAIL_LINES);

        let finish = |outcome: SupervisionOutcome, tail: VecDeque<String>| SupervisionReport {
            label: task.label.clone(),
            outcome,
            tail: tail.into_iter().collect(),
            elapsed: started.elapsed(),
        };

        if cancel.is_cancelled() {
            warn!("Cancelled before {} started", task.label);
            return finish(SupervisionOutcome::SignalTerminated, tail);
        }

        info!("Executing {}: {}", task.label, task.command_line());

        let mut command = Command::new(&task.program);
        command
            .args(&task.args)
            .stdin(Stdio::null())
            .kill_on_drop(true);
        if let Some(ref dir) = task.working_dir {
            command.current_dir(dir);
        }
        match task.progress_channel {
            ProgressChannel::Stdout => command.stdout(Stdio::piped()).stderr(Stdio::null()),
            ProgressChannel::Stderr => command.stdout(Stdio::null()).stderr(Stdio::piped()),
        };

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(e) => {
                error!("Failed to launch {}: {e}", task.program.display());
                return finish(SupervisionOutcome::LaunchFailed(e), tail);
            }
        };

        let stream: Option<ProgressStream> = match task.progress_channel {
            ProgressChannel::Stdout => child.stdout.take().map(|s| Box::new(s) as ProgressStream),
            ProgressChannel::Stderr => child.stderr.take().map(|s| Box::new(s) as ProgressStream),
        };
        let mut lines = stream.map(ProgressLines::new);
        let mut last_beat = Instant::now();

        let outcome = loop {
            let deadline = last_beat + task.stall_timeout;
            let stream_open = lines.is_some();

            let event = tokio::select! {
                line = next_line(&mut lines) => Event::Line(line),
                status = child.wait(), if !stream_open => Event::Exited(status),
                _ = tokio::time::sleep_until(deadline) => Event::Stalled,
                _ = cancel.cancelled() => Event::Cancelled,
            };

            match event {
                Event::Line(Ok(Some(line))) => {
                    if task.heartbeat.is_beat(&line) {
                        last_beat = Instant::now();
                    }
                    info!(target: "encoder", "{line}");
                    if tail.len() == TAIL_LINES {
                        tail.pop_front();
                    }
                    tail.push_back(line);
                }
                Event::Line(Ok(None)) => {
                    lines = None;
                }
                Event::Line(Err(e)) => {
                    warn!("Lost {} progress stream: {e}", task.label);
                    lines = None;
                }
                Event::Exited(Ok(status)) => {
                    let code = exit_code(status);
                    if code == 0 {
                        debug!("{} finished in {:.2?}", task.label, started.elapsed());
                    } else {
                        warn!("{} finished with non-zero exit code: {code}", task.label);
                    }
                    break SupervisionOutcome::Completed(code);
                }
                Event::Exited(Err(e)) => {
                    error!("Failed to wait for {}: {e}", task.label);
                    self.terminate(&mut child, &task.label).await;
                    break SupervisionOutcome::LaunchFailed(e);
                }
                Event::Stalled => {
                    warn!(
                        "{} stall detected: no heartbeat for {:?}, terminating",
                        task.label, task.stall_timeout
                    );
                    self.terminate(&mut child, &task.label).await;
                    break SupervisionOutcome::StallTerminated;
                }
                Event::Cancelled => {
                    warn!("Cancellation requested, terminating {}", task.label);
                    self.terminate(&mut child, &task.label).await;
                    break SupervisionOutcome::SignalTerminated;
                }
            }
        };

        finish(outcome, tail)
    }

    /// SIGTERM, wait for the grace period, then SIGKILL.
    async fn terminate(&self, child: &mut Child, label: &str) {
        #[cfg(unix)]
        {
            use nix::sys::signal::{kill, Signal};
            use nix::unistd::Pid;

            if let Some(pid) = child.id() {
                if let Err(e) = kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
                    debug!("SIGTERM to {label} ({pid}) failed: {e}");
                }

                match tokio::time::timeout(self.kill_grace, child.wait()).await {
                    Ok(Ok(status)) => {
                        info!("{label} terminated ({status})");
                        return;
                    }
                    Ok(Err(e)) => warn!("Failed to wait for {label} after SIGTERM: {e}"),
                    Err(_) => debug!("{label} ignored SIGTERM for {:?}", self.kill_grace),
                }
            }
        }

        match child.kill().await {
            Ok(()) => info!("{label} killed"),
            Err(e) => warn!("Failed to kill {label}: {e}"),
        }
    }
}

async fn next_line(
    lines: &mut Option<ProgressLines<ProgressStream>>,
) -> std::io::Result<Option<String>> {
    match lines {
        Some(lines) => lines.next_line().await,
        None => std::future::pending().await,
    }
}

fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }

    -1
}

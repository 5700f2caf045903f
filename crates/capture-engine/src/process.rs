//! External capture process control.
//!
//! A [`ProcessLauncher`] turns a source URI and an output path into a running
//! [`CaptureProcess`]. The production launcher spawns ffmpeg (or any program
//! configured with the same argument template); tests substitute fakes.
//!
//! [`CaptureProcessHandle`] owns one process for the life of one recording
//! and implements the stop protocol: enforce the minimum duration, ask the
//! process to quit on its control channel, wait, and fall back to a forced
//! kill when the graceful wait times out.

use std::collections::VecDeque;
use std::path::Path;
use std::process::Stdio;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use cameraman_common::clock::shortfall;
use cameraman_common::config::{CaptureConfig, OUTPUT_PLACEHOLDER, SOURCE_PLACEHOLDER};
use cameraman_common::error::{CameramanError, CameramanResult};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, Command};
use tokio::task::JoinHandle;

/// Number of stderr lines kept for diagnostics.
const STDERR_TAIL_LINES: usize = 20;

/// How long to keep reading stderr after the process has exited. A leftover
/// descendant can hold the pipe open indefinitely.
const STDERR_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

type StderrTail = Arc<Mutex<VecDeque<String>>>;

/// How a capture process ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExitInfo {
    /// Exit code, `None` when terminated by a signal.
    pub code: Option<i32>,

    /// Whether the process had to be killed after the graceful timeout.
    pub forced: bool,

    /// Last lines the process wrote to stderr.
    pub stderr_tail: String,
}

impl ExitInfo {
    /// Zero exit code after a graceful quit.
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// One running external capture process.
#[async_trait::async_trait]
pub trait CaptureProcess: Send {
    /// OS process id, if known.
    fn pid(&self) -> Option<u32>;

    /// Send the graceful quit command on the control channel.
    async fn request_quit(&mut self) -> std::io::Result<()>;

    /// Wait for the process to exit and return its exit code.
    async fn wait(&mut self) -> std::io::Result<Option<i32>>;

    /// Forcibly terminate the process.
    async fn kill(&mut self) -> std::io::Result<()>;

    /// Diagnostic output collected from the process.
    async fn stderr_tail(&mut self) -> String {
        String::new()
    }
}

/// Creates capture processes.
#[async_trait::async_trait]
pub trait ProcessLauncher: Send + Sync {
    /// Launch a process capturing `source_uri` into `output_path`.
    async fn launch(
        &self,
        source_uri: &str,
        output_path: &Path,
    ) -> std::io::Result<Box<dyn CaptureProcess>>;
}

/// Launches the configured capture program (ffmpeg by default).
#[derive(Debug, Clone)]
pub struct FfmpegLauncher {
    program: String,
    args: Vec<String>,
}

impl FfmpegLauncher {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    pub fn from_config(config: &CaptureConfig) -> Self {
        Self::new(config.program.clone(), config.args.clone())
    }

    /// Substitute placeholders in the argument template.
    pub fn render_args(&self, source_uri: &str, output_path: &Path) -> Vec<String> {
        let output = output_path.to_string_lossy();
        self.args
            .iter()
            .map(|arg| {
                arg.replace(SOURCE_PLACEHOLDER, source_uri)
                    .replace(OUTPUT_PLACEHOLDER, &output)
            })
            .collect()
    }
}

#[async_trait::async_trait]
impl ProcessLauncher for FfmpegLauncher {
    async fn launch(
        &self,
        source_uri: &str,
        output_path: &Path,
    ) -> std::io::Result<Box<dyn CaptureProcess>> {
        let args = self.render_args(source_uri, output_path);
        tracing::debug!(program = %self.program, ?args, "Spawning capture process");

        let mut command = Command::new(&self.program);
        command
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        // Own process group, so a forced kill reaches helpers the program forks.
        #[cfg(unix)]
        command.process_group(0);
        let mut child = command.spawn()?;

        let stdin = child.stdin.take();
        let stderr_tail = StderrTail::default();
        // Drain stderr concurrently so the process never blocks on a full pipe.
        let stderr_task = child.stderr.take().map(|stderr| {
            let tail = Arc::clone(&stderr_tail);
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    let mut tail = tail.lock().unwrap_or_else(PoisonError::into_inner);
                    if tail.len() == STDERR_TAIL_LINES {
                        tail.pop_front();
                    }
                    tail.push_back(line);
                }
            })
        });

        Ok(Box::new(FfmpegProcess {
            child,
            stdin,
            stderr_task,
            stderr_tail,
        }))
    }
}

/// A spawned ffmpeg process. Killed if dropped while still running.
pub struct FfmpegProcess {
    child: Child,
    stdin: Option<ChildStdin>,
    stderr_task: Option<JoinHandle<()>>,
    stderr_tail: StderrTail,
}

impl FfmpegProcess {
    /// SIGKILL the whole process group. A group that is already gone is fine.
    #[cfg(unix)]
    fn kill_group(&self) -> std::io::Result<()> {
        let Some(pid) = self.child.id() else {
            return Ok(());
        };
        let Ok(pgid) = libc::pid_t::try_from(pid) else {
            return Ok(());
        };
        // SAFETY: kill(2) has no memory-safety preconditions; the negative pid
        // addresses the group this child leads since it was spawned with
        // process_group(0).
        let rc = unsafe { libc::kill(-pgid, libc::SIGKILL) };
        if rc == 0 {
            return Ok(());
        }
        let err = std::io::Error::last_os_error();
        if err.raw_os_error() == Some(libc::ESRCH) {
            Ok(())
        } else {
            Err(err)
        }
    }

    #[cfg(not(unix))]
    fn kill_group(&self) -> std::io::Result<()> {
        Ok(())
    }
}

#[async_trait::async_trait]
impl CaptureProcess for FfmpegProcess {
    fn pid(&self) -> Option<u32> {
        self.child.id()
    }

    async fn request_quit(&mut self) -> std::io::Result<()> {
        let Some(mut stdin) = self.stdin.take() else {
            return Ok(());
        };
        stdin.write_all(b"q").await?;
        stdin.flush().await?;
        // Dropping stdin closes the control channel.
        Ok(())
    }

    async fn wait(&mut self) -> std::io::Result<Option<i32>> {
        let status = self.child.wait().await?;
        Ok(status.code())
    }

    async fn kill(&mut self) -> std::io::Result<()> {
        if let Err(e) = self.kill_group() {
            tracing::warn!(pid = ?self.child.id(), error = %e, "Failed to kill capture process group");
        }
        self.child.kill().await
    }

    async fn stderr_tail(&mut self) -> String {
        if let Some(mut task) = self.stderr_task.take() {
            match tokio::time::timeout(STDERR_DRAIN_TIMEOUT, &mut task).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::warn!(error = %e, "Stderr reader task failed"),
                Err(_) => {
                    tracing::warn!(
                        timeout_secs = STDERR_DRAIN_TIMEOUT.as_secs_f64(),
                        "Stderr still open after exit, keeping what was read"
                    );
                    task.abort();
                }
            }
        }
        let tail = self.stderr_tail.lock().unwrap_or_else(PoisonError::into_inner);
        tail.iter().map(String::as_str).collect::<Vec<_>>().join("\n")
    }
}

/// Result of a stop request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopOutcome {
    /// The handle held no running process.
    NothingToStop,
    /// The process exited (successfully or not).
    Exited(ExitInfo),
}

enum HandleState {
    NotStarted,
    Started(Box<dyn CaptureProcess>),
    Stopped,
}

/// Owns the capture process of exactly one recording.
///
/// Lifecycle: `NotStarted -> Started -> Stopped`. A handle is never reused.
pub struct CaptureProcessHandle {
    label: String,
    state: HandleState,
    pid: Option<u32>,
    min_duration: Duration,
    graceful_timeout: Duration,
}

impl CaptureProcessHandle {
    /// Create an unstarted handle. `label` identifies it in logs.
    pub fn new(label: impl Into<String>, min_duration: Duration, graceful_timeout: Duration) -> Self {
        Self {
            label: label.into(),
            state: HandleState::NotStarted,
            pid: None,
            min_duration,
            graceful_timeout,
        }
    }

    /// Launch the capture process, creating the output directory if needed.
    pub async fn start(
        &mut self,
        launcher: &dyn ProcessLauncher,
        source_uri: &str,
        output_path: &Path,
    ) -> CameramanResult<()> {
        if !matches!(self.state, HandleState::NotStarted) {
            return Err(CameramanError::spawn(format!(
                "capture process for {} was already started",
                self.label
            )));
        }

        if let Some(dir) = output_path.parent().filter(|d| !d.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(dir).await.map_err(|e| {
                CameramanError::spawn(format!("cannot create {}: {e}", dir.display()))
            })?;
        }

        let process = launcher
            .launch(source_uri, output_path)
            .await
            .map_err(|e| CameramanError::spawn(e.to_string()))?;

        self.pid = process.pid();
        self.state = HandleState::Started(process);
        tracing::info!(
            recording_id = %self.label,
            pid = ?self.pid,
            output = %output_path.display(),
            "Capture process started"
        );
        Ok(())
    }

    /// Stop the process.
    ///
    /// Suspends until `min_duration` has elapsed since start, then requests a
    /// graceful quit and waits up to the graceful timeout before killing.
    /// A non-zero exit is logged and reported in the outcome, not as an error;
    /// an error means the process could not be signaled or reaped.
    pub async fn stop(&mut self, elapsed_since_start: Duration) -> CameramanResult<StopOutcome> {
        let mut process = match std::mem::replace(&mut self.state, HandleState::Stopped) {
            HandleState::Started(process) => process,
            HandleState::NotStarted => {
                self.state = HandleState::NotStarted;
                return Ok(StopOutcome::NothingToStop);
            }
            HandleState::Stopped => return Ok(StopOutcome::NothingToStop),
        };

        let wait_for = shortfall(elapsed_since_start, self.min_duration);
        if !wait_for.is_zero() {
            tracing::warn!(
                recording_id = %self.label,
                min_duration_secs = self.min_duration.as_secs_f64(),
                waiting_secs = wait_for.as_secs_f64(),
                "Recording is below the minimum duration, waiting before stopping"
            );
            tokio::time::sleep(wait_for).await;
        }

        tracing::info!(recording_id = %self.label, pid = ?self.pid, "Stopping capture process");

        if let Err(e) = process.request_quit().await {
            // The process may already be gone; waiting below reaps it either way.
            tracing::warn!(recording_id = %self.label, error = %e, "Failed to send quit command");
        }

        let waited = tokio::time::timeout(self.graceful_timeout, process.wait()).await;
        let (code, forced) = match waited {
            Ok(Ok(code)) => (code, false),
            Ok(Err(e)) => {
                tracing::warn!(recording_id = %self.label, error = %e, "Waiting on capture process failed");
                (force_teardown(&self.label, process.as_mut()).await?, true)
            }
            Err(_) => {
                tracing::warn!(
                    recording_id = %self.label,
                    timeout_secs = self.graceful_timeout.as_secs_f64(),
                    "Capture process did not exit in time, killing it"
                );
                (force_teardown(&self.label, process.as_mut()).await?, true)
            }
        };

        let info = ExitInfo {
            code,
            forced,
            stderr_tail: process.stderr_tail().await,
        };

        if info.success() {
            tracing::debug!(recording_id = %self.label, "Capture process exited with code 0");
        } else {
            tracing::error!(
                recording_id = %self.label,
                exit_code = ?info.code,
                forced = info.forced,
                stderr = %info.stderr_tail,
                "Capture process exited unsuccessfully, keeping partial output"
            );
        }

        Ok(StopOutcome::Exited(info))
    }

    /// OS process id of the started process.
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Whether a process is currently attached.
    pub fn is_running(&self) -> bool {
        matches!(self.state, HandleState::Started(_))
    }
}

/// Kill and reap a process that did not quit gracefully.
async fn force_teardown(label: &str, process: &mut dyn CaptureProcess) -> CameramanResult<Option<i32>> {
    process.kill().await.map_err(|e| {
        CameramanError::teardown(format!("failed to kill capture process for {label}: {e}"))
    })?;
    process.wait().await.map_err(|e| {
        CameramanError::teardown(format!("failed to reap capture process for {label}: {e}"))
    })
}

impl std::fmt::Debug for CaptureProcessHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match self.state {
            HandleState::NotStarted => "NotStarted",
            HandleState::Started(_) => "Started",
            HandleState::Stopped => "Stopped",
        };
        f.debug_struct("CaptureProcessHandle")
            .field("label", &self.label)
            .field("state", &state)
            .field("pid", &self.pid)
            .finish()
    }
}

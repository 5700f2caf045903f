//! Deterministic fakes for exercising the engine without real cameras or
//! capture processes.
//!
//! The fakes never touch the network or spawn programs and never sleep, so
//! they work on a paused tokio clock.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::camera::{Camera, LivenessProbe};
use crate::process::{CaptureProcess, ProcessLauncher};

/// How processes created by a [`FakeLauncher`] behave.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FakeBehavior {
    /// Exit with this code once asked to quit.
    ExitCode(i32),
    /// Ignore the quit command; only a kill ends the process.
    IgnoreQuit,
    /// Ignore the quit command and fail to be killed.
    Unkillable,
    /// Fail to launch at all.
    SpawnFails,
}

#[derive(Debug, Default)]
struct Counters {
    launches: AtomicUsize,
    quit_requests: AtomicUsize,
    kills: AtomicUsize,
}

/// Launcher producing in-memory processes.
#[derive(Debug, Clone)]
pub struct FakeLauncher {
    behavior: Arc<Mutex<FakeBehavior>>,
    counters: Arc<Counters>,
    launched: Arc<Mutex<Vec<(String, PathBuf)>>>,
}

impl FakeLauncher {
    pub fn new(behavior: FakeBehavior) -> Self {
        Self {
            behavior: Arc::new(Mutex::new(behavior)),
            counters: Arc::new(Counters::default()),
            launched: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Change the behavior of processes launched from now on.
    pub fn set_behavior(&self, behavior: FakeBehavior) {
        *self.behavior.lock().unwrap_or_else(PoisonError::into_inner) = behavior;
    }

    /// Successful launches so far.
    pub fn launches(&self) -> usize {
        self.counters.launches.load(Ordering::SeqCst)
    }

    /// Quit commands received by launched processes.
    pub fn quit_requests(&self) -> usize {
        self.counters.quit_requests.load(Ordering::SeqCst)
    }

    /// Kill attempts on launched processes.
    pub fn kills(&self) -> usize {
        self.counters.kills.load(Ordering::SeqCst)
    }

    /// `(source_uri, output_path)` of every successful launch.
    pub fn launched(&self) -> Vec<(String, PathBuf)> {
        self.launched
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait::async_trait]
impl ProcessLauncher for FakeLauncher {
    async fn launch(
        &self,
        source_uri: &str,
        output_path: &Path,
    ) -> std::io::Result<Box<dyn CaptureProcess>> {
        let behavior = *self.behavior.lock().unwrap_or_else(PoisonError::into_inner);
        if behavior == FakeBehavior::SpawnFails {
            return Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "capture program not found",
            ));
        }

        let pid = self.counters.launches.fetch_add(1, Ordering::SeqCst) as u32 + 1000;
        self.launched
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((source_uri.to_string(), output_path.to_path_buf()));

        Ok(Box::new(FakeProcess {
            pid,
            behavior,
            quit: false,
            killed: false,
            counters: Arc::clone(&self.counters),
        }))
    }
}

struct FakeProcess {
    pid: u32,
    behavior: FakeBehavior,
    quit: bool,
    killed: bool,
    counters: Arc<Counters>,
}

#[async_trait::async_trait]
impl CaptureProcess for FakeProcess {
    fn pid(&self) -> Option<u32> {
        Some(self.pid)
    }

    async fn request_quit(&mut self) -> std::io::Result<()> {
        self.counters.quit_requests.fetch_add(1, Ordering::SeqCst);
        self.quit = true;
        Ok(())
    }

    async fn wait(&mut self) -> std::io::Result<Option<i32>> {
        if self.killed {
            return Ok(None);
        }
        match self.behavior {
            FakeBehavior::ExitCode(code) if self.quit => Ok(Some(code)),
            _ => std::future::pending().await,
        }
    }

    async fn kill(&mut self) -> std::io::Result<()> {
        self.counters.kills.fetch_add(1, Ordering::SeqCst);
        if self.behavior == FakeBehavior::Unkillable {
            return Err(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "operation not permitted",
            ));
        }
        self.killed = true;
        Ok(())
    }

    async fn stderr_tail(&mut self) -> String {
        format!("fake process {} finished", self.pid)
    }
}

/// Probe answering from a mutable set of reachable camera numbers.
#[derive(Debug, Clone, Default)]
pub struct FakeProbe {
    up: Arc<Mutex<HashSet<u32>>>,
}

impl FakeProbe {
    /// Probe reporting the given cameras as reachable.
    pub fn reachable(numbers: impl IntoIterator<Item = u32>) -> Self {
        Self {
            up: Arc::new(Mutex::new(numbers.into_iter().collect())),
        }
    }

    /// Mark a camera as reachable or not.
    pub fn set_up(&self, number: u32, is_up: bool) {
        let mut up = self.up.lock().unwrap_or_else(PoisonError::into_inner);
        if is_up {
            up.insert(number);
        } else {
            up.remove(&number);
        }
    }
}

#[async_trait::async_trait]
impl LivenessProbe for FakeProbe {
    async fn is_up(&self, camera: &Camera) -> bool {
        self.up
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&camera.number)
    }
}

//! Command runner: execute a shell command inside a compiled tree.
//!
//! The child runs with the tree as its working directory and an environment
//! variable naming the tree. While waiting, the runner polls a cancellation
//! token; on cancellation, or if the waiting caller unwinds, the child gets
//! SIGTERM, then SIGKILL once the grace period runs out.

use crate::error::IsoenvError;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Variable naming the materialized directory in the child's environment.
pub const COMPILED_DIR_VAR: &str = "COMPILED_DIR";

/// Shell used when none is configured.
pub const DEFAULT_SHELL: &str = "/bin/sh";

/// Time between SIGTERM and SIGKILL.
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(5);

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Exit code reported when cancellation arrives before the spawn (128 + SIGINT).
const CANCELLED_BEFORE_START: i32 = 130;

/// Shared flag set when the run should be abandoned
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Cancel this token on SIGINT/SIGTERM. Can be installed once per process.
    pub fn install_signal_handler(&self) -> Result<(), ctrlc::Error> {
        let token = self.clone();
        ctrlc::set_handler(move || {
            eprintln!("\nReceived interrupt signal, stopping command...");
            token.cancel();
        })
    }
}

/// How the child finished
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunStatus {
    /// Exit code, or 128 + signal number when killed by a signal
    pub code: i32,
    /// Whether the runner had to stop the child
    pub cancelled: bool,
}

impl RunStatus {
    pub fn success(&self) -> bool {
        self.code == 0 && !self.cancelled
    }
}

/// Runs shell command lines in a directory
#[derive(Debug, Clone)]
pub struct CommandRunner {
    shell: PathBuf,
    env_var: String,
    grace_period: Duration,
    cancel: CancelToken,
}

impl Default for CommandRunner {
    fn default() -> Self {
        Self {
            shell: PathBuf::from(DEFAULT_SHELL),
            env_var: COMPILED_DIR_VAR.to_string(),
            grace_period: DEFAULT_GRACE_PERIOD,
            cancel: CancelToken::new(),
        }
    }
}

impl CommandRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_shell(mut self, shell: PathBuf) -> Self {
        self.shell = shell;
        self
    }

    pub fn with_env_var(mut self, name: impl Into<String>) -> Self {
        self.env_var = name.into();
        self
    }

    pub fn with_grace_period(mut self, grace_period: Duration) -> Self {
        self.grace_period = grace_period;
        self
    }

    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Run `command` through the shell with `dir` as working directory.
    pub fn run(&self, command: &str, dir: &Path) -> Result<RunStatus, IsoenvError> {
        if self.cancel.is_cancelled() {
            warn!("Cancelled before the command started");
            return Ok(RunStatus {
                code: CANCELLED_BEFORE_START,
                cancelled: true,
            });
        }

        info!(
            shell = %self.shell.display(),
            dir = %dir.display(),
            "Running command: {}",
            command
        );

        let child = Command::new(&self.shell)
            .arg("-c")
            .arg(command)
            .current_dir(dir)
            .env(&self.env_var, dir)
            .spawn()
            .map_err(|source| IsoenvError::Spawn {
                command: command.to_string(),
                source,
            })?;

        let mut guard = ChildGuard::new(child, self.grace_period);
        debug!(pid = guard.child.id(), "Command started");

        loop {
            if self.cancel.is_cancelled() {
                warn!("Cancellation requested, terminating command");
                let status = guard.terminate().map_err(IsoenvError::Wait)?;
                return Ok(RunStatus {
                    code: exit_code(status),
                    cancelled: true,
                });
            }

            match guard.child.try_wait().map_err(IsoenvError::Wait)? {
                Some(status) => {
                    guard.finished = true;
                    let code = exit_code(status);
                    info!(code, "Command exited");
                    return Ok(RunStatus {
                        code,
                        cancelled: false,
                    });
                }
                None => std::thread::sleep(POLL_INTERVAL),
            }
        }
    }
}

/// Owns a running child and stops it if dropped before it exits
struct ChildGuard {
    child: Child,
    grace_period: Duration,
    finished: bool,
}

impl ChildGuard {
    fn new(child: Child, grace_period: Duration) -> Self {
        Self {
            child,
            grace_period,
            finished: false,
        }
    }

    /// SIGTERM, wait out the grace period, then SIGKILL.
    fn terminate(&mut self) -> std::io::Result<ExitStatus> {
        if let Some(status) = self.child.try_wait()? {
            self.finished = true;
            return Ok(status);
        }

        send_terminate(&mut self.child);

        let start = Instant::now();
        while start.elapsed() < self.grace_period {
            if let Some(status) = self.child.try_wait()? {
                self.finished = true;
                return Ok(status);
            }
            std::thread::sleep(POLL_INTERVAL);
        }

        warn!(pid = self.child.id(), "Command ignored SIGTERM, killing");
        // Already-exited children make kill fail; wait reports the real status.
        let _ = self.child.kill();
        let status = self.child.wait()?;
        self.finished = true;
        Ok(status)
    }
}

impl Drop for ChildGuard {
    fn drop(&mut self) {
        if !self.finished {
            if let Err(e) = self.terminate() {
                warn!("Failed to stop command: {}", e);
            }
        }
    }
}

#[cfg(unix)]
fn send_terminate(child: &mut Child) {
    use nix::sys::signal::{self, Signal};
    use nix::unistd::Pid;

    let pid = Pid::from_raw(child.id() as i32);
    if let Err(e) = signal::kill(pid, Signal::SIGTERM) {
        debug!("SIGTERM failed: {}", e);
    }
}

#[cfg(not(unix))]
fn send_terminate(child: &mut Child) {
    let _ = child.kill();
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
    1
}

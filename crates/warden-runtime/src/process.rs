//! Provider child processes: spawning with piped stdio, a bounded stderr tail,
//! and graceful termination.

use std::io::{self, Read};
use std::process::{ExitStatus, Stdio};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;

use tokio::io::{AsyncReadExt, BufReader};
use tokio::time::Instant;
use tracing::{debug, error, warn};
use warden_core::error::{Result, WardenError};

use crate::config::{ProviderConfig, TransportKind};
use crate::transport::{StdioTransport, ThreadedTransport, Transport};

/// Bytes of provider stderr kept for diagnostics
pub const STDERR_TAIL_BYTES: usize = 4096;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Last [`STDERR_TAIL_BYTES`] written to a provider's stderr.
///
/// The pipe keeps being drained after the cap so a chatty provider never
/// blocks on a full stderr buffer.
#[derive(Clone, Debug, Default)]
pub struct StderrTail(Arc<Mutex<Vec<u8>>>);

impl StderrTail {
    fn push(&self, bytes: &[u8]) {
        let mut buf = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        buf.extend_from_slice(bytes);
        if buf.len() > STDERR_TAIL_BYTES {
            let excess = buf.len() - STDERR_TAIL_BYTES;
            buf.drain(..excess);
        }
    }

    pub fn contents(&self) -> String {
        let buf = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        String::from_utf8_lossy(&buf).trim().to_string()
    }
}

/// A running provider process from either process API
#[derive(Debug)]
pub enum ChildHandle {
    Async(tokio::process::Child),
    Blocking(std::process::Child),
}

impl ChildHandle {
    pub fn id(&self) -> Option<u32> {
        match self {
            Self::Async(child) => child.id(),
            Self::Blocking(child) => Some(child.id()),
        }
    }

    /// Exit status if the process has already exited
    pub fn try_wait(&mut self) -> io::Result<Option<ExitStatus>> {
        match self {
            Self::Async(child) => child.try_wait(),
            Self::Blocking(child) => child.try_wait(),
        }
    }

    pub fn is_running(&mut self) -> bool {
        matches!(self.try_wait(), Ok(None))
    }

    fn start_kill(&mut self) -> io::Result<()> {
        match self {
            Self::Async(child) => child.start_kill(),
            Self::Blocking(child) => child.kill(),
        }
    }
}

impl Drop for ChildHandle {
    fn drop(&mut self) {
        // tokio children carry kill_on_drop
        if let Self::Blocking(child) = self {
            if matches!(child.try_wait(), Ok(None)) {
                let _ = child.kill();
                let _ = child.wait();
            }
        }
    }
}

/// Freshly spawned provider with its stdio already wired up
pub struct SpawnedProcess {
    pub child: ChildHandle,
    pub transport: Box<dyn Transport>,
    pub stderr: StderrTail,
}

/// Launch a provider with stdin, stdout and stderr piped.
///
/// The child inherits the parent environment with the configured overrides
/// applied on top.
pub fn spawn(config: &ProviderConfig) -> Result<SpawnedProcess> {
    debug!(
        provider = %config.name,
        command = %config.command,
        args = ?config.args,
        transport = ?config.transport,
        "spawning provider"
    );

    let spawned = match config.transport {
        TransportKind::Async => spawn_async(config),
        TransportKind::Threaded => spawn_blocking(config),
    };
    if let Err(e) = &spawned {
        error!(provider = %config.name, err = %e, "failed to spawn provider");
    }
    spawned
}

fn missing_pipe(stream: &str) -> WardenError {
    WardenError::Other(format!("{stream} was not piped"))
}

fn spawn_async(config: &ProviderConfig) -> Result<SpawnedProcess> {
    let mut child = tokio::process::Command::new(&config.command)
        .args(&config.args)
        .envs(&config.env)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()?;

    let stdin = child.stdin.take().ok_or_else(|| missing_pipe("stdin"))?;
    let stdout = child.stdout.take().ok_or_else(|| missing_pipe("stdout"))?;
    let mut stderr = child.stderr.take().ok_or_else(|| missing_pipe("stderr"))?;

    let tail = StderrTail::default();
    let sink = tail.clone();
    tokio::spawn(async move {
        let mut chunk = [0u8; 1024];
        loop {
            match stderr.read(&mut chunk).await {
                Ok(0) | Err(_) => break,
                Ok(n) => sink.push(&chunk[..n]),
            }
        }
    });

    Ok(SpawnedProcess {
        child: ChildHandle::Async(child),
        transport: Box::new(StdioTransport::new(stdin, BufReader::new(stdout))),
        stderr: tail,
    })
}

fn spawn_blocking(config: &ProviderConfig) -> Result<SpawnedProcess> {
    let mut child = std::process::Command::new(&config.command)
        .args(&config.args)
        .envs(&config.env)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;

    let stdin = child.stdin.take().ok_or_else(|| missing_pipe("stdin"))?;
    let stdout = child.stdout.take().ok_or_else(|| missing_pipe("stdout"))?;
    let mut stderr = child.stderr.take().ok_or_else(|| missing_pipe("stderr"))?;

    let tail = StderrTail::default();
    let sink = tail.clone();
    thread::spawn(move || {
        let mut chunk = [0u8; 1024];
        loop {
            match stderr.read(&mut chunk) {
                Ok(0) | Err(_) => break,
                Ok(n) => sink.push(&chunk[..n]),
            }
        }
    });

    Ok(SpawnedProcess {
        child: ChildHandle::Blocking(child),
        transport: Box::new(ThreadedTransport::new(stdin, stdout)),
        stderr: tail,
    })
}

/// Ask the process to exit, then kill it if it is still alive after `grace`.
pub async fn terminate(child: &mut ChildHandle, grace: Duration) -> io::Result<()> {
    if child.try_wait()?.is_some() {
        return Ok(());
    }

    if request_exit(child) {
        let deadline = Instant::now() + grace;
        while Instant::now() < deadline {
            if let Some(status) = child.try_wait()? {
                debug!(pid = ?child.id(), ?status, "provider exited after termination signal");
                return Ok(());
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
        warn!(pid = ?child.id(), grace_ms = grace.as_millis(), "provider ignored termination signal, killing");
    }

    child.start_kill()?;
    match child {
        ChildHandle::Async(child) => {
            child.wait().await?;
        }
        ChildHandle::Blocking(child) => {
            child.wait()?;
        }
    }
    Ok(())
}

#[cfg(unix)]
fn request_exit(child: &ChildHandle) -> bool {
    use nix::sys::signal::{Signal, kill};
    use nix::unistd::Pid;

    let Some(pid) = child.id().and_then(|id| i32::try_from(id).ok()) else {
        return false;
    };
    match kill(Pid::from_raw(pid), Signal::SIGTERM) {
        Ok(()) => true,
        Err(e) => {
            warn!(pid, err = %e, "failed to send SIGTERM");
            false
        }
    }
}

#[cfg(not(unix))]
const fn request_exit(_child: &ChildHandle) -> bool {
    false
}

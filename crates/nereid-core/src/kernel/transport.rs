//! Transport to a kernel launcher process.
//!
//! The production transport spawns the launcher as a child process and
//! frames protocol messages over its stdio. Responses are drained on a
//! dedicated reader thread into a channel, so receives can carry a timeout
//! and a kill from another thread unblocks any pending receive.

use std::io::{BufReader, BufWriter};
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use crate::config::ExecutionConfig;
use crate::error::{Error, Result};

use super::protocol::{KernelRequest, KernelResponse, read_message, write_message};

/// Two-way message channel to a running kernel.
///
/// Implementations must guarantee that [`KernelTransport::shutdown`] is
/// safe to call more than once and that a kill through the handle returned
/// by [`KernelTransport::kill_handle`] eventually fails any blocked
/// receive.
pub trait KernelTransport: Send {
    /// Send one request to the kernel.
    fn send(&mut self, request: &KernelRequest) -> Result<()>;

    /// Receive the next response, waiting at most `timeout` when given.
    fn recv(&mut self, timeout: Option<Duration>) -> Result<KernelResponse>;

    /// Handle that can terminate the kernel from another thread.
    fn kill_handle(&self) -> KernelKillHandle;

    /// Tear the transport down. Best-effort; never fails.
    fn shutdown(&mut self);
}

/// Thread-safe handle for terminating a kernel process.
///
/// Killing the process makes the reader thread observe EOF, which closes
/// the response channel and fails any receive pending on the transport.
/// That is how a cancellation interrupts a blocking execute.
#[derive(Clone)]
pub struct KernelKillHandle {
    pid: Option<u32>,
    killed: Arc<AtomicBool>,
}

impl KernelKillHandle {
    fn new(pid: Option<u32>) -> Self {
        Self {
            pid,
            killed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Handle for a transport with no process behind it. Killing only sets
    /// the flag; in-memory transports check it on their next receive.
    pub fn detached() -> Self {
        Self::new(None)
    }

    /// Terminate the kernel immediately.
    pub fn kill(&self) {
        if self.killed.swap(true, Ordering::SeqCst) {
            return;
        }

        #[cfg(unix)]
        if let Some(pid) = self.pid {
            // SIGKILL: no cooperation required from the running unit.
            unsafe {
                libc::kill(pid as i32, libc::SIGKILL);
            }
        }
    }

    /// Check whether a kill has been requested.
    pub fn is_killed(&self) -> bool {
        self.killed.load(Ordering::SeqCst)
    }
}

/// Map a closed response channel to the right error: a deliberate kill is a
/// cancellation, anything else is transport loss.
fn disconnect_error(kill: &KernelKillHandle) -> Error {
    if kill.is_killed() {
        Error::Cancelled
    } else {
        Error::Transport("kernel connection closed".to_string())
    }
}

/// Find the launcher binary for the configured kernel.
///
/// Order: explicit command from the registry entry, the
/// `NEREID_KERNEL_PATH` environment variable, then the kernel identifier
/// looked up on the PATH.
fn resolve_launcher(config: &ExecutionConfig) -> Result<PathBuf> {
    if let Some(command) = &config.command {
        return Ok(PathBuf::from(command));
    }

    if let Ok(path) = std::env::var("NEREID_KERNEL_PATH") {
        let path = PathBuf::from(path);
        if path.exists() {
            return Ok(path);
        }
    }

    if let Ok(path) = which::which(&config.kernel) {
        return Ok(path);
    }

    Err(Error::Connect {
        kernel: config.kernel.clone(),
        message: "no launcher found; set a command in the registry or NEREID_KERNEL_PATH"
            .to_string(),
    })
}

/// Transport over a spawned kernel launcher process.
pub struct ChildTransport {
    child: Child,
    stdin: BufWriter<std::process::ChildStdin>,
    responses: Receiver<Result<KernelResponse>>,
    kill: KernelKillHandle,
    shut_down: bool,
}

impl ChildTransport {
    /// Spawn the launcher for the configured kernel.
    pub fn spawn(config: &ExecutionConfig) -> Result<Self> {
        let launcher = resolve_launcher(config)?;

        let mut child = Command::new(&launcher)
            .args(&config.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| Error::Connect {
                kernel: config.kernel.clone(),
                message: format!("failed to spawn `{}`: {e}", launcher.display()),
            })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| Error::Transport("failed to get kernel stdin".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::Transport("failed to get kernel stdout".to_string()))?;

        let pid = child.id();
        let (tx, rx) = mpsc::channel();
        // The reader runs detached; it exits on EOF or when the channel's
        // receiving side is dropped.
        let _reader = thread::Builder::new()
            .name(format!("kernel-reader-{pid}"))
            .spawn(move || {
                let mut reader = BufReader::new(stdout);
                loop {
                    match read_message::<_, KernelResponse>(&mut reader) {
                        Ok(response) => {
                            if tx.send(Ok(response)).is_err() {
                                break;
                            }
                        }
                        Err(e) => {
                            let _ = tx.send(Err(e));
                            break;
                        }
                    }
                }
            })
            .map_err(|e| Error::Transport(format!("failed to start reader thread: {e}")))?;

        tracing::debug!(pid, launcher = %launcher.display(), "kernel process spawned");

        Ok(Self {
            child,
            stdin: BufWriter::new(stdin),
            responses: rx,
            kill: KernelKillHandle::new(Some(pid)),
            shut_down: false,
        })
    }
}

impl KernelTransport for ChildTransport {
    fn send(&mut self, request: &KernelRequest) -> Result<()> {
        if self.kill.is_killed() {
            return Err(Error::Cancelled);
        }
        write_message(&mut self.stdin, request)
    }

    fn recv(&mut self, timeout: Option<Duration>) -> Result<KernelResponse> {
        match timeout {
            Some(timeout) => match self.responses.recv_timeout(timeout) {
                Ok(received) => received,
                Err(RecvTimeoutError::Timeout) => Err(Error::ResponseTimeout(timeout)),
                Err(RecvTimeoutError::Disconnected) => Err(disconnect_error(&self.kill)),
            },
            None => match self.responses.recv() {
                Ok(received) => received,
                Err(_) => Err(disconnect_error(&self.kill)),
            },
        }
    }

    fn kill_handle(&self) -> KernelKillHandle {
        self.kill.clone()
    }

    fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        self.shut_down = true;

        // Polite shutdown first so the kernel can release its resources.
        let _ = write_message(&mut self.stdin, &KernelRequest::Shutdown);
        thread::sleep(Duration::from_millis(10));

        if let Err(e) = self.child.kill() {
            // ESRCH means the process already exited, which is fine.
            if !e.to_string().contains("No such process") {
                tracing::warn!("failed to kill kernel process: {e}");
            }
        }

        // Reap the zombie.
        let _ = self.child.wait();
    }
}

impl Drop for ChildTransport {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kill_handle_is_sticky() {
        let handle = KernelKillHandle::detached();
        assert!(!handle.is_killed());

        handle.kill();
        assert!(handle.is_killed());

        // Second kill is a no-op.
        handle.kill();
        assert!(handle.is_killed());
    }

    #[test]
    fn test_kill_handle_clone_shares_state() {
        let handle = KernelKillHandle::detached();
        let clone = handle.clone();

        clone.kill();
        assert!(handle.is_killed());
    }

    #[test]
    fn test_disconnect_error_distinguishes_kill_from_loss() {
        let handle = KernelKillHandle::detached();
        assert!(matches!(disconnect_error(&handle), Error::Transport(_)));

        handle.kill();
        assert!(matches!(disconnect_error(&handle), Error::Cancelled));
    }

    #[test]
    fn test_launcher_resolution_prefers_explicit_command() {
        let server = crate::config::KernelServer {
            server_name: "IPython".to_string(),
            kernel: "python3".to_string(),
            command: Some("/opt/kernels/ipy-bridge".to_string()),
            args: Vec::new(),
            launch_timeout_ms: 1000,
            exec_timeout_ms: None,
            max_results: 10,
        };
        let config = crate::config::ExecutionConfig::for_server(
            &server,
            crate::config::SourceSpec::Inline {
                code: "1".to_string(),
            },
            "smoke",
        );

        let launcher = resolve_launcher(&config).unwrap();
        assert_eq!(launcher, PathBuf::from("/opt/kernels/ipy-bridge"));
    }
}

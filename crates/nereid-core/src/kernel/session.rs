//! Kernel session lifecycle: connect, execute units, close.

use std::time::Instant;

use nereid_notebook::CodeUnit;
use uuid::Uuid;

use crate::config::ExecutionConfig;
use crate::error::{Error, Result};
use crate::report::{UnitOutcome, UnitResult};
use crate::sink::LogSink;

use super::protocol::{KernelRequest, KernelResponse};
use super::transport::{ChildTransport, KernelKillHandle, KernelTransport};

/// Establishes kernel sessions for the orchestrator.
pub trait Connector: Send + Sync {
    /// Connect to the configured kernel within its launch timeout.
    fn connect(&self, config: &ExecutionConfig) -> Result<InterpreterSession>;
}

/// Production connector: spawns the kernel launcher process and hands the
/// transport to a session.
pub struct ProcessConnector;

impl Connector for ProcessConnector {
    fn connect(&self, config: &ExecutionConfig) -> Result<InterpreterSession> {
        let transport = ChildTransport::spawn(config)?;
        InterpreterSession::open(Box::new(transport), config)
    }
}

/// One live connection to a remote kernel, used by exactly one run.
///
/// The session must reach [`InterpreterSession::close`] on every exit path.
/// `close` is idempotent and never fails, and `Drop` closes as a backstop,
/// so a panic or early return cannot leak the remote resource.
pub struct InterpreterSession {
    id: Uuid,
    kernel: String,
    max_results: u64,
    exec_timeout: Option<std::time::Duration>,
    transport: Box<dyn KernelTransport>,
    closed: bool,
}

impl std::fmt::Debug for InterpreterSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterpreterSession")
            .field("id", &self.id)
            .field("kernel", &self.kernel)
            .field("max_results", &self.max_results)
            .field("exec_timeout", &self.exec_timeout)
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

impl InterpreterSession {
    /// Wrap an already-open transport and verify kernel liveness within the
    /// launch timeout.
    ///
    /// On any handshake failure the transport is torn down before the error
    /// is returned, so a half-open session never escapes.
    pub fn open(
        mut transport: Box<dyn KernelTransport>,
        config: &ExecutionConfig,
    ) -> Result<Self> {
        let handshake = transport
            .send(&KernelRequest::Ping)
            .and_then(|()| transport.recv(Some(config.launch_timeout)));

        match handshake {
            Ok(KernelResponse::Pong) => {}
            Ok(other) => {
                transport.shutdown();
                return Err(Error::Connect {
                    kernel: config.kernel.clone(),
                    message: format!("unexpected handshake response: {other:?}"),
                });
            }
            Err(e) => {
                transport.shutdown();
                return Err(Error::Connect {
                    kernel: config.kernel.clone(),
                    message: e.to_string(),
                });
            }
        }

        let id = Uuid::new_v4();
        tracing::info!(session = %id, kernel = %config.kernel, "kernel session established");

        Ok(Self {
            id,
            kernel: config.kernel.clone(),
            max_results: config.max_results,
            exec_timeout: config.exec_timeout,
            transport,
            closed: false,
        })
    }

    /// Kernel identifier this session is bound to.
    pub fn kernel(&self) -> &str {
        &self.kernel
    }

    /// Handle that can terminate the kernel from another thread, unblocking
    /// an execute in flight.
    pub fn kill_handle(&self) -> KernelKillHandle {
        self.transport.kill_handle()
    }

    /// Submit one unit and collect its result.
    ///
    /// Output lines are streamed to `sink` as they arrive. At most
    /// `max_results` lines are captured; once the cap is reached the rest
    /// of the output is drained without buffering and the result is marked
    /// truncated. A kernel-reported fault is an Ok result with a fault
    /// outcome, so it stays distinguishable from transport loss (an Err).
    pub fn execute(
        &mut self,
        unit: &CodeUnit,
        task: &str,
        sink: &mut dyn LogSink,
    ) -> Result<UnitResult> {
        if self.closed {
            return Err(Error::Transport("session already closed".to_string()));
        }

        let started = Instant::now();
        self.transport.send(&KernelRequest::Execute {
            code: unit.source.clone(),
            task: task.to_string(),
        })?;

        let mut lines: Vec<String> = Vec::new();
        let mut truncated = false;

        loop {
            let response = match self.transport.recv(self.exec_timeout) {
                Ok(response) => response,
                Err(Error::ResponseTimeout(timeout)) => {
                    // A hung unit would hold the whole run hostage; kill the
                    // kernel so the session can be reclaimed.
                    self.transport.kill_handle().kill();
                    return Err(Error::Transport(format!(
                        "unit {} produced no response within {:?}",
                        unit.sequence, timeout
                    )));
                }
                Err(e) => return Err(e),
            };

            match response {
                KernelResponse::Output { text } => {
                    if (lines.len() as u64) < self.max_results {
                        sink.line(&text);
                        lines.push(text);
                    } else {
                        // Past the cap: drain without buffering.
                        truncated = true;
                    }
                }
                KernelResponse::Completed => {
                    tracing::debug!(session = %self.id, unit = unit.sequence, "unit completed");
                    return Ok(UnitResult {
                        sequence: unit.sequence,
                        output: lines.join("\n"),
                        truncated,
                        elapsed_ms: started.elapsed().as_millis() as u64,
                        outcome: UnitOutcome::Success,
                    });
                }
                KernelResponse::Fault { message } => {
                    sink.line(&message);
                    return Ok(UnitResult {
                        sequence: unit.sequence,
                        output: lines.join("\n"),
                        truncated,
                        elapsed_ms: started.elapsed().as_millis() as u64,
                        outcome: UnitOutcome::Fault { message },
                    });
                }
                other => {
                    return Err(Error::Transport(format!(
                        "unexpected response during execution: {other:?}"
                    )));
                }
            }
        }
    }

    /// Release the remote session.
    ///
    /// Idempotent and infallible. The run's outcome is already decided by
    /// the time this runs, so teardown problems are logged, not propagated.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.transport.shutdown();
        tracing::info!(session = %self.id, kernel = %self.kernel, "kernel session closed");
    }
}

impl Drop for InterpreterSession {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{KernelServer, SourceSpec};
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    /// In-memory transport that answers Ping and replays scripted response
    /// batches, one batch per Execute.
    struct ScriptedTransport {
        script: VecDeque<Vec<KernelResponse>>,
        pending: VecDeque<KernelResponse>,
        answer_ping: bool,
        shutdowns: Arc<Mutex<usize>>,
        kill: KernelKillHandle,
    }

    impl ScriptedTransport {
        fn new(script: Vec<Vec<KernelResponse>>, shutdowns: Arc<Mutex<usize>>) -> Self {
            Self {
                script: script.into(),
                pending: VecDeque::new(),
                answer_ping: true,
                shutdowns,
                kill: KernelKillHandle::detached(),
            }
        }
    }

    impl KernelTransport for ScriptedTransport {
        fn send(&mut self, request: &KernelRequest) -> Result<()> {
            match request {
                KernelRequest::Ping => {
                    if self.answer_ping {
                        self.pending.push_back(KernelResponse::Pong);
                    }
                }
                KernelRequest::Execute { .. } => {
                    let batch = self.script.pop_front().unwrap_or_default();
                    self.pending.extend(batch);
                }
                KernelRequest::Shutdown => {
                    self.pending.push_back(KernelResponse::ShuttingDown);
                }
            }
            Ok(())
        }

        fn recv(&mut self, timeout: Option<Duration>) -> Result<KernelResponse> {
            if self.kill.is_killed() {
                return Err(Error::Cancelled);
            }
            match self.pending.pop_front() {
                Some(response) => Ok(response),
                None => match timeout {
                    Some(timeout) => Err(Error::ResponseTimeout(timeout)),
                    None => Err(Error::Transport("kernel connection closed".to_string())),
                },
            }
        }

        fn kill_handle(&self) -> KernelKillHandle {
            self.kill.clone()
        }

        fn shutdown(&mut self) {
            *self.shutdowns.lock().unwrap() += 1;
        }
    }

    fn test_config() -> ExecutionConfig {
        let server = KernelServer {
            server_name: "IPython".to_string(),
            kernel: "python3".to_string(),
            command: None,
            args: Vec::new(),
            launch_timeout_ms: 1000,
            exec_timeout_ms: None,
            max_results: 3,
        };
        ExecutionConfig::for_server(
            &server,
            SourceSpec::Inline {
                code: "print(1)".to_string(),
            },
            "smoke",
        )
    }

    fn output(text: &str) -> KernelResponse {
        KernelResponse::Output {
            text: text.to_string(),
        }
    }

    #[test]
    fn test_open_requires_pong() {
        let shutdowns = Arc::new(Mutex::new(0));
        let mut transport = ScriptedTransport::new(vec![], shutdowns.clone());
        transport.answer_ping = false;

        let err = InterpreterSession::open(Box::new(transport), &test_config()).unwrap_err();
        assert!(matches!(err, Error::Connect { ref kernel, .. } if kernel == "python3"));
        // A failed handshake still tears the transport down.
        assert_eq!(*shutdowns.lock().unwrap(), 1);
    }

    #[test]
    fn test_execute_collects_output() {
        let shutdowns = Arc::new(Mutex::new(0));
        let transport = ScriptedTransport::new(
            vec![vec![output("1"), output("2"), KernelResponse::Completed]],
            shutdowns,
        );

        let config = test_config();
        let mut session = InterpreterSession::open(Box::new(transport), &config).unwrap();
        let mut sink: Vec<String> = Vec::new();

        let result = session
            .execute(&CodeUnit::code(0, "print(1)"), &config.task, &mut sink)
            .unwrap();
        assert_eq!(result.output, "1\n2");
        assert!(!result.truncated);
        assert!(result.outcome.is_success());
        assert_eq!(sink, vec!["1".to_string(), "2".to_string()]);
    }

    #[test]
    fn test_execute_truncates_at_max_results() {
        let shutdowns = Arc::new(Mutex::new(0));
        let batch: Vec<KernelResponse> = (0..10)
            .map(|i| output(&i.to_string()))
            .chain([KernelResponse::Completed])
            .collect();
        let transport = ScriptedTransport::new(vec![batch], shutdowns);

        let config = test_config();
        let mut session = InterpreterSession::open(Box::new(transport), &config).unwrap();
        let mut sink: Vec<String> = Vec::new();

        let result = session
            .execute(&CodeUnit::code(0, "spam()"), &config.task, &mut sink)
            .unwrap();
        assert_eq!(result.output.lines().count(), 3);
        assert!(result.truncated);
        // Lines past the cap are drained, not streamed.
        assert_eq!(sink.len(), 3);
        assert!(result.outcome.is_success());
    }

    #[test]
    fn test_execute_reports_fault_as_outcome() {
        let shutdowns = Arc::new(Mutex::new(0));
        let transport = ScriptedTransport::new(
            vec![vec![
                output("partial"),
                KernelResponse::Fault {
                    message: "division by zero".to_string(),
                },
            ]],
            shutdowns,
        );

        let config = test_config();
        let mut session = InterpreterSession::open(Box::new(transport), &config).unwrap();
        let mut sink: Vec<String> = Vec::new();

        let result = session
            .execute(&CodeUnit::code(1, "1/0"), &config.task, &mut sink)
            .unwrap();
        assert_eq!(result.output, "partial");
        assert!(matches!(result.outcome, UnitOutcome::Fault { ref message } if message == "division by zero"));
    }

    #[test]
    fn test_hung_unit_hits_deadline_and_kills_kernel() {
        let shutdowns = Arc::new(Mutex::new(0));
        // The unit never answers: an empty batch simulates a hang.
        let transport = ScriptedTransport::new(vec![vec![]], shutdowns);
        let kill = transport.kill_handle();

        let mut config = test_config();
        config.exec_timeout = Some(Duration::from_millis(50));

        let mut session = InterpreterSession::open(Box::new(transport), &config).unwrap();
        let mut sink: Vec<String> = Vec::new();

        let err = session
            .execute(&CodeUnit::code(0, "while True: pass"), &config.task, &mut sink)
            .unwrap_err();
        assert!(matches!(err, Error::Transport(_)));
        assert!(err.to_string().contains("no response within"));
        // The hung kernel is reclaimed, not left running.
        assert!(kill.is_killed());
    }

    #[test]
    fn test_lost_connection_is_transport_error() {
        let shutdowns = Arc::new(Mutex::new(0));
        // No Completed terminator: the channel dries up mid-unit.
        let transport = ScriptedTransport::new(vec![vec![output("1")]], shutdowns);

        let config = test_config();
        let mut session = InterpreterSession::open(Box::new(transport), &config).unwrap();
        let mut sink: Vec<String> = Vec::new();

        let err = session
            .execute(&CodeUnit::code(0, "print(1)"), &config.task, &mut sink)
            .unwrap_err();
        assert!(matches!(err, Error::Transport(_)));
    }

    #[test]
    fn test_close_is_idempotent() {
        let shutdowns = Arc::new(Mutex::new(0));
        let transport = ScriptedTransport::new(vec![], shutdowns.clone());

        let mut session = InterpreterSession::open(Box::new(transport), &test_config()).unwrap();
        session.close();
        session.close();
        drop(session);

        assert_eq!(*shutdowns.lock().unwrap(), 1);
    }

    #[test]
    fn test_drop_closes_session() {
        let shutdowns = Arc::new(Mutex::new(0));
        let transport = ScriptedTransport::new(vec![], shutdowns.clone());

        let session = InterpreterSession::open(Box::new(transport), &test_config()).unwrap();
        drop(session);

        assert_eq!(*shutdowns.lock().unwrap(), 1);
    }

    #[test]
    fn test_execute_after_close_fails() {
        let shutdowns = Arc::new(Mutex::new(0));
        let transport = ScriptedTransport::new(vec![], shutdowns);

        let config = test_config();
        let mut session = InterpreterSession::open(Box::new(transport), &config).unwrap();
        session.close();

        let mut sink: Vec<String> = Vec::new();
        let err = session
            .execute(&CodeUnit::code(0, "print(1)"), &config.task, &mut sink)
            .unwrap_err();
        assert!(matches!(err, Error::Transport(_)));
    }
}

//! Run orchestration: configuration in, sealed report out.
//!
//! Drives parsed code units through one kernel session in document order,
//! streams output to the host's log sink as it is produced, and maps every
//! failure mode into a `Failure` report. The host never sees a raw error,
//! only the report plus diagnostics.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use nereid_notebook::{self as notebook, CodeUnit, SourceFormat};

use crate::config::{ExecutionConfig, SourceSpec};
use crate::error::{Error, Result};
use crate::kernel::{Connector, InterpreterSession, KernelKillHandle, ProcessConnector};
use crate::report::{ExecutionReport, RunOutcome, UnitOutcome, UnitResult};
use crate::sink::LogSink;

/// Clone-able handle for cancelling a run from another thread.
///
/// Cancelling sets a flag checked between units and kills the kernel the
/// run currently has registered, which unblocks an execute in flight. Any
/// clone can trigger the cancellation and all clones observe it.
#[derive(Clone)]
pub struct RunCancelHandle {
    cancelled: Arc<AtomicBool>,
    current_kill: Arc<Mutex<Option<KernelKillHandle>>>,
}

impl RunCancelHandle {
    /// Request cancellation of the run.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        if let Ok(guard) = self.current_kill.lock()
            && let Some(kill) = guard.as_ref()
        {
            kill.kill();
        }
    }

    /// Check whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Clear the flag before starting a fresh run.
    pub fn reset(&self) {
        self.cancelled.store(false, Ordering::SeqCst);
    }
}

/// Drives one run end to end: validate, parse, connect, execute, release.
pub struct Orchestrator {
    workspace: PathBuf,
    connector: Box<dyn Connector>,
    cancelled: Arc<AtomicBool>,
    current_kill: Arc<Mutex<Option<KernelKillHandle>>>,
}

impl Orchestrator {
    /// Create an orchestrator resolving file sources against `workspace`.
    pub fn new(workspace: impl Into<PathBuf>) -> Self {
        Self::with_connector(workspace, Box::new(ProcessConnector))
    }

    /// Create an orchestrator with a custom session connector.
    pub fn with_connector(workspace: impl Into<PathBuf>, connector: Box<dyn Connector>) -> Self {
        Self {
            workspace: workspace.into(),
            connector,
            cancelled: Arc::new(AtomicBool::new(false)),
            current_kill: Arc::new(Mutex::new(None)),
        }
    }

    /// Handle for cancelling this orchestrator's current run.
    pub fn cancel_handle(&self) -> RunCancelHandle {
        RunCancelHandle {
            cancelled: self.cancelled.clone(),
            current_kill: self.current_kill.clone(),
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Execute one run and seal its report.
    ///
    /// Never returns an error: configuration problems, malformed input,
    /// connect failures, kernel faults, transport loss, and cancellation
    /// all end as a `Failure` report with a human-readable diagnostic.
    pub fn run(&self, config: &ExecutionConfig, sink: &mut dyn LogSink) -> ExecutionReport {
        let mut diagnostics = Vec::new();
        let mut unit_results = Vec::new();

        let outcome = match self.run_inner(config, sink, &mut diagnostics, &mut unit_results) {
            Ok(true) => RunOutcome::Success,
            Ok(false) => RunOutcome::Failure,
            Err(e) => {
                let message = e.to_string();
                sink.line(&message);
                diagnostics.push(message);
                RunOutcome::Failure
            }
        };

        let report = ExecutionReport {
            outcome,
            unit_results,
            diagnostics,
        };

        let verdict = if report.succeeded() { "succeeded" } else { "failed" };
        sink.line(&format!(
            "Run {verdict} on kernel `{}` ({})",
            config.kernel, config.server_name
        ));
        report
    }

    /// The fallible part of a run. Returns whether every executed unit
    /// succeeded; any `Err` is already terminal.
    fn run_inner(
        &self,
        config: &ExecutionConfig,
        sink: &mut dyn LogSink,
        diagnostics: &mut Vec<String>,
        unit_results: &mut Vec<UnitResult>,
    ) -> Result<bool> {
        config.validate()?;
        if self.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let (type_label, units) = self.load_units(config)?;

        sink.line(&format!("Executed kernel : {}", config.kernel.to_uppercase()));
        sink.line(&format!("Language : {}", config.server_name.to_uppercase()));
        sink.line(&format!("Platform : {}", std::env::consts::OS.to_uppercase()));
        sink.line(&format!("Type : {type_label}"));
        sink.line("Output :");

        let mut session = self.connector.connect(config)?;
        *self.current_kill.lock().unwrap() = Some(session.kill_handle());

        let outcome = self.run_units(config, &mut session, &units, sink, diagnostics, unit_results);

        *self.current_kill.lock().unwrap() = None;
        // Guaranteed release on every exit path out of the running phase.
        session.close();

        outcome
    }

    /// Normalize the configured source into ordered units plus a label for
    /// the run header.
    fn load_units(&self, config: &ExecutionConfig) -> Result<(String, Vec<CodeUnit>)> {
        match &config.source {
            SourceSpec::Inline { code } => {
                Ok(("TEXT".to_string(), vec![notebook::inline_unit(code.as_str())]))
            }
            SourceSpec::File { path } => {
                if path.trim().is_empty() {
                    // Nothing to execute, as opposed to a malformed document.
                    return Err(Error::Config("file path is empty".to_string()));
                }
                let resolved = self.workspace.join(path);
                let format = SourceFormat::from_path(&resolved);
                let units = notebook::parse_path(&resolved)?;
                Ok((format.to_string().to_uppercase(), units))
            }
        }
    }

    /// Execute units strictly in sequence order, stopping at the first
    /// fault. Skip units are recorded without a kernel round trip.
    fn run_units(
        &self,
        config: &ExecutionConfig,
        session: &mut InterpreterSession,
        units: &[CodeUnit],
        sink: &mut dyn LogSink,
        diagnostics: &mut Vec<String>,
        unit_results: &mut Vec<UnitResult>,
    ) -> Result<bool> {
        let mut all_succeeded = true;

        for unit in units {
            if self.is_cancelled() {
                return Err(Error::Cancelled);
            }

            if unit.skip {
                unit_results.push(UnitResult::skipped(unit.sequence));
                continue;
            }

            tracing::debug!(unit = unit.sequence, "executing unit");
            let result = session.execute(unit, &config.task, sink)?;
            let fault = match &result.outcome {
                UnitOutcome::Fault { message } => Some(message.clone()),
                UnitOutcome::Success => None,
            };
            let sequence = result.sequence;
            unit_results.push(result);

            if let Some(message) = fault {
                // Later units may depend on state this one failed to produce.
                diagnostics.push(format!("kernel fault at unit {sequence}: {message}"));
                all_succeeded = false;
                break;
            }
        }

        Ok(all_succeeded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct UnreachableConnector;

    impl Connector for UnreachableConnector {
        fn connect(&self, config: &ExecutionConfig) -> Result<InterpreterSession> {
            Err(Error::Connect {
                kernel: config.kernel.clone(),
                message: "unreachable".to_string(),
            })
        }
    }

    fn orchestrator() -> Orchestrator {
        Orchestrator::with_connector("/tmp/ws", Box::new(UnreachableConnector))
    }

    #[test]
    fn test_cancel_handle_clone_shares_state() {
        let orchestrator = orchestrator();
        let handle = orchestrator.cancel_handle();
        let clone = handle.clone();

        assert!(!handle.is_cancelled());
        clone.cancel();
        assert!(handle.is_cancelled());
    }

    #[test]
    fn test_cancel_handle_reset() {
        let orchestrator = orchestrator();
        let handle = orchestrator.cancel_handle();

        handle.cancel();
        assert!(handle.is_cancelled());
        handle.reset();
        assert!(!handle.is_cancelled());
    }

    #[test]
    fn test_run_never_panics_on_connect_failure() {
        let orchestrator = orchestrator();
        let config = ExecutionConfig {
            kernel: "python3".to_string(),
            server_name: "IPython".to_string(),
            command: None,
            args: Vec::new(),
            launch_timeout: std::time::Duration::from_millis(10),
            exec_timeout: None,
            max_results: 10,
            source: SourceSpec::Inline {
                code: "print(1)".to_string(),
            },
            task: "smoke".to_string(),
        };

        let mut sink: Vec<String> = Vec::new();
        let report = orchestrator.run(&config, &mut sink);
        assert!(!report.succeeded());
        assert!(report.diagnostics.iter().any(|d| d.contains("python3")));
    }
}

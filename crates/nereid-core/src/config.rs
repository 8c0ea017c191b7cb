//! Run configuration and the kernel registry.
//!
//! The host job system registers kernel endpoints once (typically from a
//! JSON settings file) and builds one immutable [`ExecutionConfig`] per run
//! from a resolved registry entry plus the job's own settings.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{Error, Result};

fn default_launch_timeout_ms() -> u64 {
    60_000
}

fn default_max_results() -> u64 {
    10_000
}

/// One registered kernel endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct KernelServer {
    /// Display name of the language or server, shown in run headers.
    #[serde(rename = "serverName")]
    pub server_name: String,

    /// Kernel identifier jobs select by.
    pub kernel: String,

    /// Launcher command. When absent the kernel identifier is looked up on
    /// the PATH instead.
    #[serde(default)]
    pub command: Option<String>,

    /// Extra launcher arguments.
    #[serde(default)]
    pub args: Vec<String>,

    /// Budget for establishing the session, in milliseconds.
    #[serde(rename = "launchTimeout", default = "default_launch_timeout_ms")]
    pub launch_timeout_ms: u64,

    /// Optional per-unit response deadline, in milliseconds. When unset a
    /// hung unit is only detected through transport loss.
    #[serde(rename = "execTimeout", default)]
    pub exec_timeout_ms: Option<u64>,

    /// Maximum captured output lines per unit.
    #[serde(rename = "maxResults", default = "default_max_results")]
    pub max_results: u64,
}

/// Ordered set of registered kernels.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct KernelRegistry {
    pub servers: Vec<KernelServer>,
}

impl KernelRegistry {
    /// Create a registry from already-built entries.
    pub fn new(servers: Vec<KernelServer>) -> Self {
        Self { servers }
    }

    /// Resolve a kernel by identifier.
    ///
    /// `None` selects the first registered entry. An unknown identifier is
    /// a configuration error naming the kernel, never a panic.
    pub fn resolve(&self, kernel: Option<&str>) -> Result<&KernelServer> {
        match kernel {
            None => self
                .servers
                .first()
                .ok_or_else(|| Error::Config("no kernels registered".to_string())),
            Some(name) => self
                .servers
                .iter()
                .find(|server| server.kernel == name)
                .ok_or_else(|| Error::Config(format!("no valid kernel registered for `{name}`"))),
        }
    }

    /// Load a registry from a JSON document.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::Config(format!("invalid kernel registry: {e}")))
    }

    /// Load a registry from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path.as_ref())?;
        Self::from_json(&raw)
    }
}

/// Where a run's source comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceSpec {
    /// Code supplied inline by the job definition.
    Inline { code: String },

    /// A file path resolved against the job workspace root.
    File { path: String },
}

/// Immutable per-run configuration.
#[derive(Debug, Clone)]
pub struct ExecutionConfig {
    /// Kernel identifier the session is bound to.
    pub kernel: String,

    /// Display name of the language or server.
    pub server_name: String,

    /// Launcher command override from the registry entry.
    pub command: Option<String>,

    /// Launcher arguments.
    pub args: Vec<String>,

    /// Budget for establishing the session.
    pub launch_timeout: Duration,

    /// Optional per-unit response deadline.
    pub exec_timeout: Option<Duration>,

    /// Maximum captured output lines per unit.
    pub max_results: u64,

    /// Source of the code to execute.
    pub source: SourceSpec,

    /// Task label used to tag the run's output.
    pub task: String,
}

impl ExecutionConfig {
    /// Build a run configuration from a resolved registry entry plus
    /// job-level settings.
    pub fn for_server(server: &KernelServer, source: SourceSpec, task: impl Into<String>) -> Self {
        Self {
            kernel: server.kernel.clone(),
            server_name: server.server_name.clone(),
            command: server.command.clone(),
            args: server.args.clone(),
            launch_timeout: Duration::from_millis(server.launch_timeout_ms),
            exec_timeout: server.exec_timeout_ms.map(Duration::from_millis),
            max_results: server.max_results,
            source,
            task: task.into(),
        }
    }

    /// Check the fields that must be present before execution begins.
    ///
    /// Absence here is a configuration error, not a runtime error. An empty
    /// file path is deliberately not checked here; it is reported by the
    /// run itself as "nothing to execute".
    pub fn validate(&self) -> Result<()> {
        if self.kernel.trim().is_empty() {
            return Err(Error::Config("kernel identifier is empty".to_string()));
        }
        if self.task.trim().is_empty() {
            return Err(Error::Config("task label is empty".to_string()));
        }
        if let SourceSpec::Inline { code } = &self.source
            && code.trim().is_empty()
        {
            return Err(Error::Config("inline code is empty".to_string()));
        }
        Ok(())
    }
}

//! Core engine for Nereid remote-kernel run orchestration.
//!
//! This crate provides:
//! - Kernel registry and immutable per-run configuration
//! - Session lifecycle over a child-process kernel transport
//! - Strictly sequential run orchestration with fail-fast fault handling
//! - Sealed execution reports for the host job system
//!
//! # Architecture
//!
//! ```text
//! ExecutionConfig ──► Orchestrator::run
//!                         │
//!                         ├── nereid-notebook: source ──► Vec<CodeUnit>
//!                         │
//!                         ├── Connector ──► InterpreterSession
//!                         │                     │
//!                         │                     └── KernelTransport (child process)
//!                         │
//!                         └── ExecutionReport (+ streamed LogSink output)
//! ```

pub mod config;
pub mod error;
pub mod kernel;
pub mod orchestrator;
pub mod report;
pub mod sink;

pub use config::{ExecutionConfig, KernelRegistry, KernelServer, SourceSpec};
pub use error::{Error, Result};
pub use kernel::{
    ChildTransport, Connector, InterpreterSession, KernelKillHandle, KernelRequest,
    KernelResponse, KernelTransport, ProcessConnector,
};
pub use orchestrator::{Orchestrator, RunCancelHandle};
pub use report::{ExecutionReport, RunOutcome, UnitOutcome, UnitResult};
pub use sink::{LogSink, WriterSink};

//! Kernel session layer: wire protocol, transport, and session lifecycle.
//!
//! The remote interpreter is an opaque endpoint reached through
//! [`KernelTransport`]. The production transport launches it as a child
//! process and frames messages over stdio; anything that can pass protocol
//! messages (an in-memory fake, a socket bridge) can stand in behind the
//! same trait.

pub mod protocol;
mod session;
mod transport;

pub use protocol::{KernelRequest, KernelResponse, read_message, write_message};
pub use session::{Connector, InterpreterSession, ProcessConnector};
pub use transport::{ChildTransport, KernelKillHandle, KernelTransport};

//! Wire protocol for kernel launcher processes.
//!
//! Uses length-prefixed JSON messages over stdin/stdout.
//! Format: 4-byte length (u32 LE) + JSON-encoded message.
//!
//! The kernel answers an `Execute` request with a stream of `Output` lines
//! terminated by either `Completed` or `Fault`.

use std::io::{Read, Write};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Upper bound on a single message body.
const MAX_MESSAGE_BYTES: usize = 64 * 1024 * 1024;

/// Request sent to the kernel process.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum KernelRequest {
    /// Liveness probe. The connect handshake waits for the matching Pong.
    Ping,

    /// Submit one code unit for execution under the given task label.
    Execute { code: String, task: String },

    /// Ask the kernel to exit cleanly.
    Shutdown,
}

/// Response received from the kernel process.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum KernelResponse {
    /// Reply to [`KernelRequest::Ping`].
    Pong,

    /// One line of captured output from the running unit.
    Output { text: String },

    /// The current unit finished without a fault.
    Completed,

    /// The kernel reported a runtime fault for the current unit.
    Fault { message: String },

    /// Acknowledgement of a shutdown request.
    ShuttingDown,
}

/// Write a message using length-prefixed JSON encoding.
pub fn write_message<W: Write>(writer: &mut W, message: &impl Serialize) -> Result<()> {
    let bytes = serde_json::to_vec(message)
        .map_err(|e| Error::Serialization(format!("failed to encode message: {e}")))?;

    let len = bytes.len() as u32;
    writer
        .write_all(&len.to_le_bytes())
        .map_err(|e| Error::Transport(format!("failed to write message length: {e}")))?;
    writer
        .write_all(&bytes)
        .map_err(|e| Error::Transport(format!("failed to write message body: {e}")))?;
    writer
        .flush()
        .map_err(|e| Error::Transport(format!("failed to flush stream: {e}")))?;

    Ok(())
}

/// Read a message using length-prefixed JSON encoding.
pub fn read_message<R: Read, T: for<'de> Deserialize<'de>>(reader: &mut R) -> Result<T> {
    let mut len_bytes = [0u8; 4];
    reader
        .read_exact(&mut len_bytes)
        .map_err(|e| Error::Transport(format!("failed to read message length: {e}")))?;
    let len = u32::from_le_bytes(len_bytes) as usize;

    if len > MAX_MESSAGE_BYTES {
        return Err(Error::Transport(format!("message too large: {len} bytes")));
    }

    let mut bytes = vec![0u8; len];
    reader
        .read_exact(&mut bytes)
        .map_err(|e| Error::Transport(format!("failed to read message body: {e}")))?;

    serde_json::from_slice(&bytes)
        .map_err(|e| Error::Serialization(format!("failed to decode message: {e}")))
}

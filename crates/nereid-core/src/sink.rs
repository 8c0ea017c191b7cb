//! Line-oriented log sink for run output.

use std::io::Write;

/// Receives progress lines and captured kernel output as they are produced.
///
/// The host owns the sink and decides where lines go (build log, file,
/// memory). The orchestrator streams into it during the run rather than
/// batching everything into the final report.
pub trait LogSink {
    /// Append one line of output.
    fn line(&mut self, text: &str);
}

/// Sink that writes each line to an [`std::io::Write`] target.
pub struct WriterSink<W: Write> {
    writer: W,
}

impl<W: Write> WriterSink<W> {
    /// Wrap a writer.
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Unwrap the inner writer.
    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> LogSink for WriterSink<W> {
    fn line(&mut self, text: &str) {
        // Log delivery must never fail the run.
        if let Err(e) = writeln!(self.writer, "{text}") {
            tracing::warn!("failed to write log line: {e}");
        }
    }
}

/// In-memory sink, mainly for tests.
impl LogSink for Vec<String> {
    fn line(&mut self, text: &str) {
        self.push(text.to_string());
    }
}

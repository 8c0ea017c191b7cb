//! Notebook decoding for Nereid.
//!
//! Turns raw source bytes plus a declared format into an ordered sequence of
//! executable [`CodeUnit`]s, filtering non-executable content.
//!
//! # Architecture
//!
//! ```text
//! bytes + SourceFormat ─────► parse_units ─────► Vec<CodeUnit> (document order)
//!                                 │
//!                                 ├── ipynb: code cells only
//!                                 ├── zeppelin: markdown paragraphs marked skip
//!                                 └── plain text: whole content as one unit
//! ```
//!
//! Decoding is pure: the same bytes and format always yield the same units,
//! and unit order is document order.

mod error;
mod format;
mod ipynb;
mod unit;
mod zeppelin;

pub use error::{NotebookError, NotebookResult};
pub use format::SourceFormat;
pub use unit::CodeUnit;

use std::fs;
use std::path::Path;

/// Decode source bytes in the given format into ordered code units.
///
/// Fails with [`NotebookError::Format`] when the bytes cannot be decoded as
/// the declared format, and with [`NotebookError::Structure`] when the
/// document decodes but a required substructure is absent.
pub fn parse_units(format: SourceFormat, bytes: &[u8]) -> NotebookResult<Vec<CodeUnit>> {
    match format {
        SourceFormat::Ipynb => ipynb::parse(bytes),
        SourceFormat::ZeppelinJson => zeppelin::parse(bytes),
        SourceFormat::PlainText => parse_plain(bytes),
    }
}

/// Wrap inline code as the single unit of a text-mode run.
pub fn inline_unit(code: impl Into<String>) -> CodeUnit {
    CodeUnit::code(0, code)
}

/// Read a file and decode it, deriving the format from its extension.
pub fn parse_path(path: impl AsRef<Path>) -> NotebookResult<Vec<CodeUnit>> {
    let path = path.as_ref();
    let bytes = fs::read(path).map_err(|e| NotebookError::Read {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    parse_units(SourceFormat::from_path(path), &bytes)
}

fn parse_plain(bytes: &[u8]) -> NotebookResult<Vec<CodeUnit>> {
    let text = std::str::from_utf8(bytes)
        .map_err(|e| NotebookError::Format(format!("source is not valid UTF-8: {e}")))?;
    Ok(vec![CodeUnit::code(0, text)])
}

//! Source format resolution.

use std::fmt;
use std::path::Path;

/// The set of recognized input formats.
///
/// Unknown or absent file extensions resolve to [`SourceFormat::PlainText`]
/// rather than an error, so unrecognized files degrade to whole-file
/// execution instead of aborting the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    /// Jupyter notebook document (`.ipynb`).
    Ipynb,
    /// Zeppelin note document (`.json`).
    ZeppelinJson,
    /// Plain text, executed as a single unit.
    PlainText,
}

impl SourceFormat {
    /// Resolve a format from a file extension.
    ///
    /// The match is case-sensitive over the known set (`ipynb`, `json`,
    /// `txt`); anything else falls back to plain text.
    pub fn from_extension(extension: Option<&str>) -> Self {
        match extension {
            Some("ipynb") => SourceFormat::Ipynb,
            Some("json") => SourceFormat::ZeppelinJson,
            // `txt` and everything unrecognized degrade to plain text.
            _ => SourceFormat::PlainText,
        }
    }

    /// Resolve a format from a file path's extension.
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        Self::from_extension(path.as_ref().extension().and_then(|e| e.to_str()))
    }
}

impl fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SourceFormat::Ipynb => "ipynb",
            SourceFormat::ZeppelinJson => "zeppelin",
            SourceFormat::PlainText => "text",
        };
        f.write_str(name)
    }
}

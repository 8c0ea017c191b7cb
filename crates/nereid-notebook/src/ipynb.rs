//! Jupyter notebook (`.ipynb`) decoding.
//!
//! Reads a deliberately narrow view of the document: only `cell_type` and
//! `source` per cell. Everything else (outputs, metadata, format versions)
//! is irrelevant to execution and left undecoded.

use serde::Deserialize;

use crate::error::{NotebookError, NotebookResult};
use crate::unit::CodeUnit;

/// A Jupyter notebook, narrowed to the fields execution needs.
#[derive(Debug, Deserialize)]
struct JupyterNotebook {
    #[serde(default)]
    cells: Option<Vec<JupyterCell>>,
}

/// A single notebook cell.
#[derive(Debug, Deserialize)]
struct JupyterCell {
    /// Cell kind marker (`code`, `markdown`, `raw`).
    cell_type: String,

    /// Cell source, required for code cells.
    #[serde(default)]
    source: Option<CellSource>,
}

/// Cell source, stored either as one string or as a list of lines.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CellSource {
    Text(String),
    Lines(Vec<String>),
}

impl CellSource {
    fn into_text(self) -> String {
        match self {
            CellSource::Text(text) => text,
            CellSource::Lines(lines) => lines.concat(),
        }
    }
}

/// Decode an ipynb document into executable units.
///
/// One unit per code cell, in document order. Non-code cells are omitted
/// entirely; their content is not independently meaningful as a code unit.
/// Every cell consumes a sequence position whether or not it yields a unit.
pub fn parse(bytes: &[u8]) -> NotebookResult<Vec<CodeUnit>> {
    let notebook: JupyterNotebook =
        serde_json::from_slice(bytes).map_err(NotebookError::from_json)?;
    let cells = notebook.cells.ok_or_else(|| {
        NotebookError::Structure("notebook document has no `cells` field".to_string())
    })?;

    let mut units = Vec::new();
    for (position, cell) in cells.into_iter().enumerate() {
        if cell.cell_type != "code" {
            continue;
        }
        let source = cell.source.ok_or_else(|| {
            NotebookError::Structure(format!("code cell {position} has no `source` field"))
        })?;
        units.push(CodeUnit::code(position, source.into_text()));
    }

    tracing::debug!(units = units.len(), "decoded ipynb document");
    Ok(units)
}

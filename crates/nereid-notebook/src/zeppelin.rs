//! Zeppelin note decoding.
//!
//! A note is an ordered sequence of paragraphs, each carrying a text payload
//! and an editor-mode tag. Markdown paragraphs are kept as `skip` units so
//! the report can account for every paragraph position, but they are never
//! submitted for execution.

use serde::Deserialize;

use crate::error::{NotebookError, NotebookResult};
use crate::unit::CodeUnit;

/// Editor mode Zeppelin assigns to markdown paragraphs.
const MARKDOWN_EDITOR_MODE: &str = "ace/mode/markdown";

/// A Zeppelin note, narrowed to the fields execution needs.
#[derive(Debug, Deserialize)]
struct ZeppelinNote {
    #[serde(default)]
    paragraphs: Option<Vec<ZeppelinParagraph>>,
}

/// A single note paragraph.
#[derive(Debug, Deserialize)]
struct ZeppelinParagraph {
    /// Paragraph payload, required for executable paragraphs.
    #[serde(default)]
    text: Option<String>,

    /// Paragraph settings; only the editor mode is read.
    #[serde(default)]
    config: ParagraphConfig,
}

#[derive(Debug, Default, Deserialize)]
struct ParagraphConfig {
    #[serde(rename = "editorMode")]
    editor_mode: Option<String>,
}

/// Decode a Zeppelin note into executable units.
///
/// Paragraphs tagged with the markdown editor mode become `skip` units;
/// every other paragraph must carry a `text` payload and becomes a code
/// unit in document order.
pub fn parse(bytes: &[u8]) -> NotebookResult<Vec<CodeUnit>> {
    let note: ZeppelinNote = serde_json::from_slice(bytes).map_err(NotebookError::from_json)?;
    let paragraphs = note.paragraphs.ok_or_else(|| {
        NotebookError::Structure("zeppelin note has no `paragraphs` field".to_string())
    })?;

    let mut units = Vec::with_capacity(paragraphs.len());
    for (position, paragraph) in paragraphs.into_iter().enumerate() {
        if paragraph.config.editor_mode.as_deref() == Some(MARKDOWN_EDITOR_MODE) {
            units.push(CodeUnit::documentation(
                position,
                paragraph.text.unwrap_or_default(),
            ));
            continue;
        }
        let text = paragraph.text.ok_or_else(|| {
            NotebookError::Structure(format!("paragraph {position} has no `text` field"))
        })?;
        units.push(CodeUnit::code(position, text));
    }

    tracing::debug!(units = units.len(), "decoded zeppelin note");
    Ok(units)
}

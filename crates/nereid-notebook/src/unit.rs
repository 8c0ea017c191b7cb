//! Executable code units.

/// One independently submittable fragment of source code.
///
/// Units are produced in document order. `sequence` is the 0-based document
/// position of the element the unit came from; elements that produce no unit
/// still consume a position, so sequence numbers always reflect where a unit
/// sat in the source document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeUnit {
    /// 0-based document position.
    pub sequence: usize,

    /// Source text submitted to the kernel.
    pub source: String,

    /// Non-executable content, retained for diagnostics only.
    pub skip: bool,
}

impl CodeUnit {
    /// Create an executable unit.
    pub fn code(sequence: usize, source: impl Into<String>) -> Self {
        Self {
            sequence,
            source: source.into(),
            skip: false,
        }
    }

    /// Create a non-executable unit retained for diagnostics.
    pub fn documentation(sequence: usize, source: impl Into<String>) -> Self {
        Self {
            sequence,
            source: source.into(),
            skip: true,
        }
    }
}

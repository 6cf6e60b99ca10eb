use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A 1-based line/column position in the surface document a blueprint was
/// parsed from.
#[derive(
    Clone, Copy, Debug, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq, PartialOrd, Ord,
)]
pub struct SourcePoint {
    pub line: usize,
    pub column: usize,
}

impl SourcePoint {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

/// Position metadata attached to schema-tree nodes by the surface-syntax
/// parser. The end position is optional; consumers that need a full range
/// should go through [`SourceMeta::range`].
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SourceMeta {
    pub start: SourcePoint,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<SourcePoint>,
}

impl SourceMeta {
    pub fn new(line: usize, column: usize) -> Self {
        Self {
            start: SourcePoint::new(line, column),
            end: None,
        }
    }

    pub fn with_end(line: usize, column: usize, end_line: usize, end_column: usize) -> Self {
        Self {
            start: SourcePoint::new(line, column),
            end: Some(SourcePoint::new(end_line, end_column)),
        }
    }

    /// Produces the diagnostic range for this position, synthesising an end
    /// position of `(start.line + 1, start.column)` when the parser did not
    /// record one.
    pub fn range(&self) -> DiagnosticRange {
        DiagnosticRange {
            start: self.start,
            end: self.end.unwrap_or(SourcePoint {
                line: self.start.line + 1,
                column: self.start.column,
            }),
        }
    }
}

/// Resolved start/end range carried by diagnostics and load errors.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct DiagnosticRange {
    pub start: SourcePoint,
    pub end: SourcePoint,
}

/// Convenience for optional metadata on schema nodes: a range when present,
/// `None` otherwise.
pub(crate) fn optional_range(meta: &Option<SourceMeta>) -> Option<DiagnosticRange> {
    meta.as_ref().map(SourceMeta::range)
}

//! Text diffing of manifests.
//!
//! Diffs are character-level and know nothing about YAML. Spans come back
//! in order, so concatenating the equal and deleted spans rebuilds the old
//! text, and the equal and inserted spans rebuild the new one.

use colored::Colorize;
use std::fmt;

/// Kind of a diff span.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffOp {
    /// Present in both texts.
    Equal,
    /// Only in the new text.
    Insert,
    /// Only in the old text.
    Delete,
}

/// A run of text with a single operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffSpan {
    /// Operation.
    pub op: DiffOp,
    /// Text of the span.
    pub text: String,
}

/// How a diff is printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffStyle {
    /// Inserts in green, deletes in red.
    Ansi,
    /// Inserts as `{+text+}`, deletes as `[-text-]`.
    Markers,
}

impl DiffStyle {
    /// Chooses `Ansi` when colored output is enabled, `Markers` otherwise.
    #[must_use]
    pub fn detect() -> Self {
        if colored::control::SHOULD_COLORIZE.should_colorize() {
            Self::Ansi
        } else {
            Self::Markers
        }
    }
}

/// Diff between the deployed and the candidate manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManifestDiff {
    spans: Vec<DiffSpan>,
}

impl ManifestDiff {
    /// Computes the diff from `old` to `new`.
    #[must_use]
    pub fn compute(old: &str, new: &str) -> Self {
        let spans = dissimilar::diff(old, new)
            .into_iter()
            .map(|chunk| match chunk {
                dissimilar::Chunk::Equal(text) => DiffSpan {
                    op: DiffOp::Equal,
                    text: text.to_string(),
                },
                dissimilar::Chunk::Insert(text) => DiffSpan {
                    op: DiffOp::Insert,
                    text: text.to_string(),
                },
                dissimilar::Chunk::Delete(text) => DiffSpan {
                    op: DiffOp::Delete,
                    text: text.to_string(),
                },
            })
            .collect();
        Self { spans }
    }

    /// Spans in order.
    #[must_use]
    pub fn spans(&self) -> &[DiffSpan] {
        &self.spans
    }

    /// Returns true if both texts are identical.
    #[must_use]
    pub fn is_unchanged(&self) -> bool {
        self.spans.iter().all(|span| span.op == DiffOp::Equal)
    }

    /// Number of inserted characters.
    #[must_use]
    pub fn inserted(&self) -> usize {
        self.count(DiffOp::Insert)
    }

    /// Number of deleted characters.
    #[must_use]
    pub fn deleted(&self) -> usize {
        self.count(DiffOp::Delete)
    }

    fn count(&self, op: DiffOp) -> usize {
        self.spans
            .iter()
            .filter(|span| span.op == op)
            .map(|span| span.text.chars().count())
            .sum()
    }

    /// Renders the diff for display.
    #[must_use]
    pub fn pretty(&self, style: DiffStyle) -> String {
        let mut out = String::new();
        for span in &self.spans {
            match (span.op, style) {
                (DiffOp::Equal, _) => out.push_str(&span.text),
                (DiffOp::Insert, DiffStyle::Ansi) => out.push_str(&span.text.green().to_string()),
                (DiffOp::Delete, DiffStyle::Ansi) => out.push_str(&span.text.red().to_string()),
                (DiffOp::Insert, DiffStyle::Markers) => {
                    out.push_str("{+");
                    out.push_str(&span.text);
                    out.push_str("+}");
                }
                (DiffOp::Delete, DiffStyle::Markers) => {
                    out.push_str("[-");
                    out.push_str(&span.text);
                    out.push_str("-]");
                }
            }
        }
        out
    }

    /// Rebuilds the old text.
    #[must_use]
    pub fn old_text(&self) -> String {
        self.text_without(DiffOp::Insert)
    }

    /// Rebuilds the new text.
    #[must_use]
    pub fn new_text(&self) -> String {
        self.text_without(DiffOp::Delete)
    }

    fn text_without(&self, skipped: DiffOp) -> String {
        self.spans
            .iter()
            .filter(|span| span.op != skipped)
            .map(|span| span.text.as_str())
            .collect()
    }
}

impl fmt::Display for ManifestDiff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.pretty(DiffStyle::Markers))
    }
}

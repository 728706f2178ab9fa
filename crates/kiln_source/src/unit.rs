//! Source units: identifier, content bytes, and import edges.

use std::collections::BTreeSet;

use kiln_common::ContentHash;

use crate::position::SourcePosition;
use crate::unit_id::UnitId;

/// A single source unit handed to the engine by its caller.
///
/// Stores the raw content along with precomputed line-start offsets for
/// position lookup, and the set of units it depends on (its imports).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceUnit {
    /// The path-like identifier of this unit.
    pub id: UnitId,
    /// The raw content bytes.
    pub content: Vec<u8>,
    /// Identifiers of the units this unit imports.
    pub dependencies: BTreeSet<UnitId>,
    /// Hash of the content, computed once on construction.
    pub content_hash: ContentHash,
    /// Byte offsets of each line start (the first entry is always 0).
    line_starts: Vec<u32>,
}

impl SourceUnit {
    /// Creates a unit with no dependencies.
    pub fn new(id: impl Into<UnitId>, content: impl Into<Vec<u8>>) -> Self {
        let content = content.into();
        let line_starts = compute_line_starts(&content);
        let content_hash = ContentHash::from_bytes(&content);
        Self {
            id: id.into(),
            content,
            dependencies: BTreeSet::new(),
            content_hash,
            line_starts,
        }
    }

    /// Adds a dependency edge to this unit.
    pub fn with_dependency(mut self, dep: impl Into<UnitId>) -> Self {
        self.dependencies.insert(dep.into());
        self
    }

    /// Adds several dependency edges to this unit.
    pub fn with_dependencies<I, D>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = D>,
        D: Into<UnitId>,
    {
        self.dependencies.extend(deps.into_iter().map(Into::into));
        self
    }

    /// Converts a byte offset into a 1-indexed position.
    ///
    /// Offsets past the end of the content clamp to the last line.
    pub fn position_of(&self, byte_offset: u32) -> SourcePosition {
        let line_idx = match self.line_starts.binary_search(&byte_offset) {
            Ok(idx) => idx,
            Err(idx) => idx.saturating_sub(1),
        };
        let line = (line_idx as u32) + 1;
        let column = byte_offset - self.line_starts[line_idx] + 1;
        SourcePosition::new(line, column)
    }

    /// Returns the text of a 1-indexed line, if it exists and is valid UTF-8.
    pub fn line_text(&self, line: u32) -> Option<&str> {
        let idx = (line as usize).checked_sub(1)?;
        let start = *self.line_starts.get(idx)? as usize;
        let end = self
            .line_starts
            .get(idx + 1)
            .map(|&s| s as usize - 1)
            .unwrap_or(self.content.len());
        let text = std::str::from_utf8(&self.content[start..end]).ok()?;
        Some(text.strip_suffix('\r').unwrap_or(text))
    }
}

/// Computes the byte offsets of each line start in the given content.
fn compute_line_starts(content: &[u8]) -> Vec<u32> {
    let mut starts = vec![0u32];
    for (i, byte) in content.iter().enumerate() {
        if *byte == b'\n' {
            starts.push((i + 1) as u32);
        }
    }
    starts
}

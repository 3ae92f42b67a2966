use crate::document::Document;
use crate::Result;
use anchormark_store::BookmarkRecord;
use anchormark_syntax::find_markers;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::ops::Bound::{Excluded, Unbounded};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Next,
    Previous,
}

/// Lines of `doc` carrying a marker or a stored bookmark
pub fn bookmark_lines(doc: &dyn Document, records: &[BookmarkRecord]) -> Result<BTreeSet<usize>> {
    let mut lines: BTreeSet<usize> = find_markers(doc.text(), doc.language_id())?
        .into_iter()
        .map(|occurrence| occurrence.position.line)
        .collect();
    lines.extend(
        records
            .iter()
            .filter(|record| record.file_path == doc.file_path())
            .map(|record| record.line_number)
            .filter(|&line| line < doc.line_count()),
    );
    Ok(lines)
}

/// Nearest bookmarked line after (or before) `from`, wrapping around the file.
///
/// `None` when no line other than `from` is bookmarked.
#[must_use]
pub fn adjacent_line(lines: &BTreeSet<usize>, from: usize, direction: Direction) -> Option<usize> {
    let found = match direction {
        Direction::Next => lines
            .range((Excluded(from), Unbounded))
            .next()
            .or_else(|| lines.first()),
        Direction::Previous => lines.range(..from).next_back().or_else(|| lines.last()),
    };
    found.copied().filter(|&line| line != from)
}

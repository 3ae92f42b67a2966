//! # Anchormark Syntax
//!
//! Language-aware text primitives for line bookmarks.
//!
//! ## Pieces
//!
//! ```text
//! language id
//!     │
//!     ├──> Language table  (comment delimiters, keyword sets)
//!     │
//!     ├──> Scanner         (is the end of line N inside an open template?)
//!     │
//!     ├──> Marker codec    (mint `:xxxx;` ids, find them inside comments)
//!     │
//!     └──> Outline         (tree-sitter symbol hierarchy for breadcrumbs)
//! ```
//!
//! ## Example
//!
//! ```rust
//! use anchormark_syntax::{find_insertion_line, find_markers, marker_comment};
//!
//! let text = "let sql = `\n  select 1\n`;\nrun(sql);";
//! let point = find_insertion_line(text, 0);
//! assert_eq!(point.line, 2);
//!
//! let line = format!("{}{}", point.text, marker_comment("javascript", ":ab12;"));
//! assert_eq!(line, "`; // :ab12;");
//! assert_eq!(find_markers(&line, "javascript").unwrap().len(), 1);
//! ```

mod error;
mod language;
mod marker;
mod outline;
mod scanner;

use serde::{Deserialize, Serialize};

pub use error::{Result, SyntaxError};
pub use language::{
    comment_delimiters, keywords, language_id_for_extension, language_id_for_path,
    outline_language, CommentDelimiters, OutlineLanguage, DEFAULT_DELIMITERS,
};
pub use marker::{
    find_markers, is_marker, marker_comment, marker_pattern, new_marker, new_marker_with,
    strip_marker_comment, MarkerOccurrence, MARKER_CLOSE, MARKER_ID_LEN, MARKER_OPEN,
    MARKER_TOKEN,
};
pub use outline::{containing_path, outline_for, LineRange, OutlineBuilder, SymbolNode};
pub use scanner::{
    find_insertion_line, is_line_end_safe, line_end_states, InsertionPoint, LineScanner,
    ScanState,
};

/// Zero-based line and character (Unicode scalar) position
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Position {
    pub line: usize,
    pub character: usize,
}

impl Position {
    #[must_use]
    pub const fn new(line: usize, character: usize) -> Self {
        Self { line, character }
    }
}

/// Physical lines of `text`, split on `\n` with a trailing `\r` removed.
///
/// An empty text has one empty line and a trailing newline opens a final empty
/// line, matching how editors count lines.
pub fn split_lines(text: &str) -> impl Iterator<Item = &str> {
    text.split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
}

/// Byte offset where each line of `text` starts
#[must_use]
pub fn line_starts(text: &str) -> Vec<usize> {
    let mut starts = vec![0];
    starts.extend(
        text.bytes()
            .enumerate()
            .filter(|&(_, b)| b == b'\n')
            .map(|(i, _)| i + 1),
    );
    starts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_lines_matches_editor_line_count() {
        assert_eq!(split_lines("").count(), 1);
        assert_eq!(split_lines("a\nb").collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(split_lines("a\r\nb\n").collect::<Vec<_>>(), vec!["a", "b", ""]);
    }

    #[test]
    fn test_line_starts() {
        assert_eq!(line_starts("ab\ncd\n"), vec![0, 3, 6]);
    }
}

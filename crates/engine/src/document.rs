use crate::{EngineError, Result};
use anchormark_syntax::{line_starts, Position};

/// Half-open span between two positions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextRange {
    pub start: Position,
    pub end: Position,
}

impl TextRange {
    #[must_use]
    pub const fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }
}

/// An open text buffer as the host editor exposes it.
///
/// Positions are zero-based lines and Unicode scalar characters. Line text
/// never includes the line terminator.
pub trait Document: Send + Sync {
    /// Workspace-relative or absolute path identifying the file
    fn file_path(&self) -> &str;

    /// Workspace folder the file belongs to
    fn folder_path(&self) -> &str;

    fn language_id(&self) -> &str;

    fn text(&self) -> &str;

    fn line_count(&self) -> usize;

    fn line_text(&self, line: usize) -> Option<&str>;

    fn offset_at(&self, position: Position) -> usize;

    fn position_at(&self, offset: usize) -> Position;

    /// Replace `range` with `text` as one edit
    fn replace(&mut self, range: TextRange, text: &str) -> Result<()>;

    /// Range covering the whole of `line`, excluding its terminator
    fn line_range(&self, line: usize) -> Option<TextRange> {
        let text = self.line_text(line)?;
        Some(TextRange::new(
            Position::new(line, 0),
            Position::new(line, text.chars().count()),
        ))
    }

    /// Range covering the entire document
    fn full_range(&self) -> TextRange {
        let last = self.line_count().saturating_sub(1);
        let end = self
            .line_text(last)
            .map(|text| text.chars().count())
            .unwrap_or_default();
        TextRange::new(Position::new(0, 0), Position::new(last, end))
    }
}

/// In-memory document
#[derive(Debug, Clone)]
pub struct TextDocument {
    file_path: String,
    folder_path: String,
    language_id: String,
    text: String,
    line_starts: Vec<usize>,
}

impl TextDocument {
    pub fn new(
        file_path: impl Into<String>,
        folder_path: impl Into<String>,
        language_id: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        let text = text.into();
        Self {
            file_path: file_path.into(),
            folder_path: folder_path.into(),
            language_id: language_id.into(),
            line_starts: line_starts(&text),
            text,
        }
    }

    #[must_use]
    pub fn into_text(self) -> String {
        self.text
    }

    /// Byte span of `line` without its terminator
    fn line_bounds(&self, line: usize) -> Option<(usize, usize)> {
        let start = *self.line_starts.get(line)?;
        let mut end = self
            .line_starts
            .get(line + 1)
            .map_or(self.text.len(), |next| next - 1);
        if self.text[start..end].ends_with('\r') {
            end -= 1;
        }
        Some((start, end))
    }
}

impl Document for TextDocument {
    fn file_path(&self) -> &str {
        &self.file_path
    }

    fn folder_path(&self) -> &str {
        &self.folder_path
    }

    fn language_id(&self) -> &str {
        &self.language_id
    }

    fn text(&self) -> &str {
        &self.text
    }

    fn line_count(&self) -> usize {
        self.line_starts.len()
    }

    fn line_text(&self, line: usize) -> Option<&str> {
        let (start, end) = self.line_bounds(line)?;
        Some(&self.text[start..end])
    }

    fn offset_at(&self, position: Position) -> usize {
        let line = position.line.min(self.line_count().saturating_sub(1));
        let Some((start, end)) = self.line_bounds(line) else {
            return self.text.len();
        };
        self.text[start..end]
            .char_indices()
            .nth(position.character)
            .map_or(end, |(index, _)| start + index)
    }

    fn position_at(&self, offset: usize) -> Position {
        let mut offset = offset.min(self.text.len());
        while !self.text.is_char_boundary(offset) {
            offset -= 1;
        }
        let line = self.line_starts.partition_point(|&start| start <= offset) - 1;
        let start = self.line_starts[line];
        Position::new(line, self.text[start..offset].chars().count())
    }

    fn replace(&mut self, range: TextRange, text: &str) -> Result<()> {
        if range.end < range.start {
            return Err(EngineError::Other(format!(
                "edit range ends before it starts: {range:?}"
            )));
        }
        if range.start.line >= self.line_count() {
            return Err(EngineError::InvalidLine {
                line: range.start.line,
                line_count: self.line_count(),
            });
        }
        let start = self.offset_at(range.start);
        let end = self.offset_at(range.end).max(start);
        self.text.replace_range(start..end, text);
        self.line_starts = line_starts(&self.text);
        Ok(())
    }
}

use anchormark_syntax::Position;
use serde::{Deserialize, Serialize};

/// Why a bookmark exists.
///
/// Persisted as the integers `1` and `2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Generation {
    /// Placed directly on a line; needs no marker text in the document
    Explicit,
    /// Lives only while its marker text is present on the line
    Anchored,
}

impl Generation {
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        match self {
            Self::Explicit => 1,
            Self::Anchored => 2,
        }
    }
}

impl From<Generation> for u8 {
    fn from(generation: Generation) -> Self {
        generation.as_u8()
    }
}

impl TryFrom<u8> for Generation {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Explicit),
            2 => Ok(Self::Anchored),
            other => Err(format!("unknown bookmark generation {other}")),
        }
    }
}

/// A persisted bookmark.
///
/// `marker` is the primary key across the whole workspace. The line and
/// character are only a cache of the last known marker position; the live
/// document decides where a marker really is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookmarkRecord {
    pub marker: String,
    pub file_path: String,
    pub folder_path: String,
    pub line_number: usize,
    pub character_offset: usize,
    pub language_id: String,
    pub generation: Generation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cached_label: Option<String>,
}

impl BookmarkRecord {
    /// Record backed by marker text at `position`
    pub fn anchored(
        marker: impl Into<String>,
        file_path: impl Into<String>,
        folder_path: impl Into<String>,
        language_id: impl Into<String>,
        position: Position,
    ) -> Self {
        Self {
            marker: marker.into(),
            file_path: file_path.into(),
            folder_path: folder_path.into(),
            line_number: position.line,
            character_offset: position.character,
            language_id: language_id.into(),
            generation: Generation::Anchored,
            cached_label: None,
        }
    }

    /// Record placed on a line without marker text
    pub fn explicit(
        marker: impl Into<String>,
        file_path: impl Into<String>,
        folder_path: impl Into<String>,
        language_id: impl Into<String>,
        position: Position,
    ) -> Self {
        Self {
            generation: Generation::Explicit,
            ..Self::anchored(marker, file_path, folder_path, language_id, position)
        }
    }

    #[must_use]
    pub const fn position(&self) -> Position {
        Position::new(self.line_number, self.character_offset)
    }

    #[must_use]
    pub const fn is_anchored(&self) -> bool {
        matches!(self.generation, Generation::Anchored)
    }

    /// Builder: move to `position`
    #[must_use]
    pub const fn at(mut self, position: Position) -> Self {
        self.line_number = position.line;
        self.character_offset = position.character;
        self
    }
}

//! Lexical scan deciding whether a comment can be appended to the end of a line.
//!
//! The scanner is not a tokenizer. It tracks just enough state to know whether
//! the end of a physical line sits inside a construct that spans lines. String
//! and comment state is carried from one line to the next, so every query
//! replays the text from line 0.

use crate::split_lines;

/// Lexical state at a point in the text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScanState {
    Normal,
    InSingleQuote,
    InDoubleQuote,
    InTemplate,
    InBlockComment,
}

impl ScanState {
    /// Appending a line comment here cannot corrupt the text
    #[must_use]
    pub const fn is_safe_line_end(self) -> bool {
        !matches!(self, Self::InTemplate)
    }
}

/// Single-pass state machine fed one physical line at a time
#[derive(Debug, Clone)]
pub struct LineScanner {
    state: ScanState,
}

impl Default for LineScanner {
    fn default() -> Self {
        Self::new()
    }
}

impl LineScanner {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: ScanState::Normal,
        }
    }

    #[must_use]
    pub const fn state(&self) -> ScanState {
        self.state
    }

    /// Scan one physical line and return the state at its end.
    ///
    /// A trailing backslash joins the next physical line into the same logical
    /// line, which keeps quoted strings open across the break.
    pub fn feed_line(&mut self, line: &str) -> ScanState {
        let chars: Vec<char> = line.chars().collect();
        let mut continued = false;
        let mut i = 0;

        while i < chars.len() {
            let c = chars[i];
            let next = chars.get(i + 1).copied();

            if self.state == ScanState::InBlockComment {
                if c == '*' && next == Some('/') {
                    self.state = ScanState::Normal;
                    i += 2;
                } else {
                    i += 1;
                }
                continue;
            }

            if c == '\\' {
                if next.is_some() {
                    i += 2;
                    continue;
                }
                continued = true;
                break;
            }

            match self.state {
                ScanState::InSingleQuote if c == '\'' => self.state = ScanState::Normal,
                ScanState::InDoubleQuote if c == '"' => self.state = ScanState::Normal,
                ScanState::InTemplate if c == '`' => self.state = ScanState::Normal,
                ScanState::Normal => match (c, next) {
                    ('/', Some('/')) => break,
                    ('/', Some('*')) => {
                        self.state = ScanState::InBlockComment;
                        i += 2;
                        continue;
                    }
                    ('\'', _) => self.state = ScanState::InSingleQuote,
                    ('"', _) => self.state = ScanState::InDoubleQuote,
                    ('`', _) => self.state = ScanState::InTemplate,
                    _ => {}
                },
                _ => {}
            }
            i += 1;
        }

        if !continued
            && matches!(
                self.state,
                ScanState::InSingleQuote | ScanState::InDoubleQuote
            )
        {
            self.state = ScanState::Normal;
        }
        self.state
    }
}

/// State at the end of every line of `text`, in line order
#[must_use]
pub fn line_end_states(text: &str) -> Vec<ScanState> {
    let mut scanner = LineScanner::new();
    split_lines(text)
        .map(|line| scanner.feed_line(line))
        .collect()
}

/// True unless the end of `line_number` (0-based) sits inside an open template literal.
///
/// Lines past the end of the text report the verdict of the last line.
#[must_use]
pub fn is_line_end_safe(text: &str, line_number: usize) -> bool {
    let mut scanner = LineScanner::new();
    let mut state = ScanState::Normal;
    for line in split_lines(text).take(line_number.saturating_add(1)) {
        state = scanner.feed_line(line);
    }
    state.is_safe_line_end()
}

/// Line chosen for a marker insertion and its current text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertionPoint {
    pub line: usize,
    pub text: String,
}

/// First line at or after `from_line` whose end is safe for insertion.
///
/// Falls back to the last line: nothing follows it, so nothing can be corrupted.
#[must_use]
pub fn find_insertion_line(text: &str, from_line: usize) -> InsertionPoint {
    let lines: Vec<&str> = split_lines(text).collect();
    let states = line_end_states(text);

    let found = (from_line..lines.len()).find(|&line| states[line].is_safe_line_end());
    let line = found.unwrap_or_else(|| lines.len().saturating_sub(1));
    InsertionPoint {
        line,
        text: lines.get(line).copied().unwrap_or_default().to_string(),
    }
}

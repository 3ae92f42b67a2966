//! Human-readable bookmark labels.
//!
//! A label is built from the bookmarked line and the lines after it: marker
//! tokens, language keywords and comment debris are stripped, whitespace is
//! squeezed, and the result is prefixed with the line number and the
//! enclosing symbol path when those are available.

use crate::config::EngineConfig;
use crate::document::Document;
use crate::symbols::SymbolProvider;
use crate::Result;
use anchormark_store::BookmarkRecord;
use anchormark_syntax::{
    comment_delimiters, containing_path, keywords, SymbolNode, MARKER_TOKEN,
};
use log::{debug, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Shown when a label cannot be computed
pub const LABEL_PLACEHOLDER: &str = "(label unavailable)";

pub const BREADCRUMB_OPEN: &str = "‹";
pub const BREADCRUMB_CLOSE: &str = "›";
pub const BREADCRUMB_SEPARATOR: &str = " > ";

/// Internal stand-in for a line break while the text is being squeezed
const LINE_BREAK: char = '\u{E000}';
/// How a line break is rendered in the final label
const LINE_BREAK_ESCAPE: &str = "\\n";
/// Longest run of one repeated character kept in a label
const MAX_REPEAT: usize = 3;

static KEYWORD_PATTERNS: Lazy<Mutex<HashMap<String, Option<Regex>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

static REMNANT_PATTERNS: Lazy<Mutex<HashMap<String, Regex>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

fn keyword_pattern(language_id: &str) -> Result<Option<Regex>> {
    if let Ok(cache) = KEYWORD_PATTERNS.lock() {
        if let Some(pattern) = cache.get(language_id) {
            return Ok(pattern.clone());
        }
    }
    let words = keywords(language_id);
    let pattern = if words.is_empty() {
        None
    } else {
        let alternatives: Vec<String> = words.iter().map(|word| regex::escape(word)).collect();
        Some(Regex::new(&format!(r"\b(?:{})\b", alternatives.join("|")))?)
    };
    if let Ok(mut cache) = KEYWORD_PATTERNS.lock() {
        cache.insert(language_id.to_string(), pattern.clone());
    }
    Ok(pattern)
}

/// Matches a comment opener left with nothing after it (or an empty block comment)
fn remnant_pattern(language_id: &str) -> Result<Regex> {
    if let Ok(cache) = REMNANT_PATTERNS.lock() {
        if let Some(pattern) = cache.get(language_id) {
            return Ok(pattern.clone());
        }
    }
    let delimiters = comment_delimiters(language_id);
    let left = regex::escape(delimiters.left);
    let pattern = if delimiters.is_line_comment() {
        Regex::new(&format!(r"{left}\s*$"))?
    } else {
        let right = regex::escape(delimiters.right);
        Regex::new(&format!(r"{left}\s*{right}"))?
    };
    if let Ok(mut cache) = REMNANT_PATTERNS.lock() {
        cache.insert(language_id.to_string(), pattern.clone());
    }
    Ok(pattern)
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Shorten every run of one repeated character to at most three
fn collapse_repeats(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut previous = None;
    let mut run = 0;
    for c in text.chars() {
        if previous == Some(c) {
            run += 1;
        } else {
            previous = Some(c);
            run = 1;
        }
        if run <= MAX_REPEAT {
            out.push(c);
        }
    }
    out
}

/// Drop whitespace runs unless they separate two word characters; squeeze those to one space
fn squeeze_whitespace(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut i = 0;
    while i < chars.len() {
        if !chars[i].is_whitespace() {
            out.push(chars[i]);
            i += 1;
            continue;
        }
        let start = i;
        while i < chars.len() && chars[i].is_whitespace() {
            i += 1;
        }
        let before = start.checked_sub(1).map(|j| chars[j]);
        let after = chars.get(i).copied();
        if before.is_some_and(is_word_char) && after.is_some_and(is_word_char) {
            out.push(' ');
        }
    }
    out
}

/// Clean one physical line for display
pub fn clean_line(line: &str, language_id: &str) -> Result<String> {
    let without_markers = MARKER_TOKEN.replace_all(line, "");
    let mut text = collapse_repeats(&without_markers);
    if let Some(pattern) = keyword_pattern(language_id)? {
        text = pattern.replace_all(&text, "").into_owned();
    }
    text = squeeze_whitespace(&text);

    let remnant = remnant_pattern(language_id)?;
    loop {
        let stripped = remnant.replace_all(&text, "").trim().to_string();
        if stripped.len() == text.len() {
            break;
        }
        text = stripped;
    }
    Ok(text)
}

/// Enclosing symbol names for `line`, outermost first.
///
/// When the innermost symbol repeats its parent's name (an `impl` block and
/// its type, say) only one copy is kept.
#[must_use]
pub fn breadcrumb(roots: &[SymbolNode], line: usize) -> Option<String> {
    let mut names: Vec<&str> = containing_path(roots, line)
        .into_iter()
        .map(|node| node.name.as_str())
        .collect();
    if names.len() >= 2 && names[names.len() - 1] == names[names.len() - 2] {
        names.pop();
    }
    if names.is_empty() {
        return None;
    }
    Some(format!(
        "{BREADCRUMB_OPEN}{}{BREADCRUMB_CLOSE}",
        names.join(BREADCRUMB_SEPARATOR)
    ))
}

/// Computes labels for bookmarks in open documents
pub struct LabelGenerator {
    config: EngineConfig,
    symbols: Arc<dyn SymbolProvider>,
}

impl LabelGenerator {
    pub fn new(config: EngineConfig, symbols: Arc<dyn SymbolProvider>) -> Self {
        Self { config, symbols }
    }

    /// Cleaned text starting at `line`, spanning as many lines as the limits allow
    pub fn line_text(&self, doc: &dyn Document, line: usize) -> Result<String> {
        let language_id = doc.language_id();
        let mut gathered = String::new();
        let mut gathered_chars = 0;
        let last = doc.line_count().min(line.saturating_add(self.config.label_max_lines));

        for current in line..last {
            let Some(raw) = doc.line_text(current) else {
                break;
            };
            let cleaned = clean_line(raw, language_id)?;
            if cleaned.is_empty() {
                continue;
            }
            if !gathered.is_empty() {
                gathered.push(LINE_BREAK);
            }
            gathered_chars += cleaned.chars().count();
            gathered.push_str(&cleaned);
            if gathered_chars >= self.config.label_max_chars {
                break;
            }
        }

        let squeezed = gathered.split_whitespace().collect::<Vec<_>>().join(" ");
        Ok(squeezed.replace(LINE_BREAK, LINE_BREAK_ESCAPE))
    }

    /// Symbol outline for breadcrumbs, `None` when disabled, unsupported, slow or failing
    pub async fn outline(&self, doc: &dyn Document) -> Option<Vec<SymbolNode>> {
        if !self.config.breadcrumbs {
            return None;
        }
        match tokio::time::timeout(self.config.symbol_timeout(), self.symbols.outline(doc)).await
        {
            Ok(Ok(outline)) => outline,
            Ok(Err(e)) => {
                debug!("Symbol outline failed for {}: {e}", doc.file_path());
                None
            }
            Err(_) => {
                debug!(
                    "Symbol outline timed out after {:?} for {}",
                    self.config.symbol_timeout(),
                    doc.file_path()
                );
                None
            }
        }
    }

    /// Assemble a label for `line` from an already fetched outline
    pub fn compose(
        &self,
        doc: &dyn Document,
        line: usize,
        outline: Option<&[SymbolNode]>,
    ) -> Result<String> {
        let text = self.line_text(doc, line)?;
        let mut label = String::new();
        if self.config.label_line_numbers {
            label.push_str(&format!("{:<3} ", line + 1));
        }
        if let Some(crumb) = outline.and_then(|roots| breadcrumb(roots, line)) {
            label.push_str(&crumb);
            if !text.is_empty() {
                label.push(' ');
            }
        }
        label.push_str(&text);
        Ok(label.trim_end().to_string())
    }

    /// Label for one record; errors degrade to [`LABEL_PLACEHOLDER`]
    pub async fn label(&self, doc: &dyn Document, record: &BookmarkRecord) -> String {
        let outline = self.outline(doc).await;
        self.label_with_outline(doc, record, outline.as_deref())
    }

    /// Fill `cached_label` for every record, sharing one outline query
    pub async fn label_records(&self, doc: &dyn Document, records: &mut [BookmarkRecord]) {
        if records.is_empty() {
            return;
        }
        let outline = self.outline(doc).await;
        self.label_records_with(doc, records, outline.as_deref());
    }

    /// Fill `cached_label` for every record from an already fetched outline
    pub fn label_records_with(
        &self,
        doc: &dyn Document,
        records: &mut [BookmarkRecord],
        outline: Option<&[SymbolNode]>,
    ) {
        for record in records.iter_mut() {
            record.cached_label = Some(self.label_with_outline(doc, record, outline));
        }
    }

    fn label_with_outline(
        &self,
        doc: &dyn Document,
        record: &BookmarkRecord,
        outline: Option<&[SymbolNode]>,
    ) -> String {
        match self.compose(doc, record.line_number, outline) {
            Ok(label) => label,
            Err(e) => {
                warn!(
                    "Could not label {} in {}: {e}",
                    record.marker,
                    doc.file_path()
                );
                LABEL_PLACEHOLDER.to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::TextDocument;
    use crate::symbols::{NoSymbols, StaticSymbols, SymbolProvider};
    use crate::EngineError;
    use anchormark_syntax::{LineRange, Position};
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    fn generator(config: EngineConfig) -> LabelGenerator {
        LabelGenerator::new(config, Arc::new(NoSymbols))
    }

    fn doc(language_id: &str, lines: &[&str]) -> TextDocument {
        TextDocument::new("file", "/ws", language_id, lines.join("\n"))
    }

    fn record_at(line: usize) -> BookmarkRecord {
        BookmarkRecord::anchored(":ab12;", "file", "/ws", "javascript", Position::new(line, 0))
    }

    #[test]
    fn test_clean_line_strips_markers_keywords_and_comments() {
        assert_eq!(
            clean_line("const total = sum(a, b); // :ab12;", "javascript").unwrap(),
            "total=sum(a,b);"
        );
        assert_eq!(clean_line("return  user_name", "javascript").unwrap(), "user_name");
        assert_eq!(clean_line("  // :ab12;", "javascript").unwrap(), "");
    }

    #[test]
    fn test_clean_line_keeps_spaces_between_words() {
        assert_eq!(clean_line("foo   bar", "plaintext").unwrap(), "foo bar");
        assert_eq!(clean_line("constant = 1", "javascript").unwrap(), "constant=1");
    }

    #[test]
    fn test_clean_line_collapses_repeats() {
        assert_eq!(clean_line("// ==========", "javascript").unwrap(), "//===");
        assert_eq!(collapse_repeats("aaaaab"), "aaab");
    }

    #[test]
    fn test_clean_line_block_comment_remnants() {
        assert_eq!(clean_line("<p>hi</p> <!-- :ab12; -->", "html").unwrap(), "<p>hi</p>");
    }

    #[test]
    fn test_label_gathers_following_lines() {
        let doc = doc("javascript", &["if (ready) {", "  start();", "}"]);
        let label = generator(EngineConfig::minimal()).line_text(&doc, 0).unwrap();
        assert_eq!(label, "(ready){\\nstart();\\n}");
    }

    #[test]
    fn test_blank_lines_are_skipped() {
        let doc = doc("javascript", &["", "// :ab12;", "", "run();"]);
        let label = generator(EngineConfig::minimal()).line_text(&doc, 0).unwrap();
        assert_eq!(label, "run();");
    }

    #[test]
    fn test_line_limit_bounds_lookahead() {
        let config = EngineConfig {
            label_max_lines: 2,
            ..EngineConfig::minimal()
        };
        let doc = doc("javascript", &["", "", "far();"]);
        assert_eq!(generator(config).line_text(&doc, 0).unwrap(), "");
    }

    #[test]
    fn test_char_limit_stops_gathering() {
        let config = EngineConfig {
            label_max_chars: 5,
            ..EngineConfig::minimal()
        };
        let doc = doc("javascript", &["alpha_beta();", "gamma();"]);
        assert_eq!(generator(config).line_text(&doc, 0).unwrap(), "alpha_beta();");
    }

    #[test]
    fn test_line_number_prefix() {
        let config = EngineConfig {
            breadcrumbs: false,
            ..EngineConfig::default()
        };
        let doc = doc("javascript", &["a();", "b();"]);
        assert_eq!(generator(config).compose(&doc, 1, None).unwrap(), "2   b();");
    }

    #[test]
    fn test_breadcrumb_drops_repeated_innermost_name() {
        let roots = vec![SymbolNode::new("Cache", LineRange::new(0, 9))
            .with_child(SymbolNode::new("Cache", LineRange::new(2, 3)))];
        assert_eq!(breadcrumb(&roots, 2).unwrap(), "‹Cache›");

        let roots = vec![SymbolNode::new("Cache", LineRange::new(0, 9))
            .with_child(SymbolNode::new("get", LineRange::new(2, 3)))];
        assert_eq!(breadcrumb(&roots, 2).unwrap(), "‹Cache > get›");
        assert_eq!(breadcrumb(&roots, 12), None);
    }

    #[tokio::test]
    async fn test_label_with_breadcrumb() {
        let roots = vec![SymbolNode::new("main", LineRange::new(0, 2))];
        let generator =
            LabelGenerator::new(EngineConfig::default(), Arc::new(StaticSymbols::new(roots)));
        let doc = doc("javascript", &["function main() {", "  go(); // :ab12;", "}"]);
        assert_eq!(
            generator.label(&doc, &record_at(1)).await,
            "2   ‹main› go();\\n}"
        );
    }

    struct SlowSymbols;

    #[async_trait]
    impl SymbolProvider for SlowSymbols {
        async fn outline(&self, _doc: &dyn Document) -> Result<Option<Vec<SymbolNode>>> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(Some(vec![SymbolNode::new("late", LineRange::new(0, 9))]))
        }
    }

    struct FailingSymbols;

    #[async_trait]
    impl SymbolProvider for FailingSymbols {
        async fn outline(&self, _doc: &dyn Document) -> Result<Option<Vec<SymbolNode>>> {
            Err(EngineError::SymbolError("provider crashed".into()))
        }
    }

    #[tokio::test]
    async fn test_symbol_timeout_falls_back_to_plain_label() {
        let config = EngineConfig {
            symbol_timeout_ms: 20,
            ..EngineConfig::default()
        };
        let generator = LabelGenerator::new(config, Arc::new(SlowSymbols));
        let doc = doc("javascript", &["go();"]);
        assert_eq!(generator.label(&doc, &record_at(0)).await, "1   go();");
    }

    #[tokio::test]
    async fn test_symbol_failure_falls_back_to_plain_label() {
        let generator = LabelGenerator::new(EngineConfig::default(), Arc::new(FailingSymbols));
        let doc = doc("javascript", &["go();"]);
        assert_eq!(generator.label(&doc, &record_at(0)).await, "1   go();");
    }

    #[tokio::test]
    async fn test_label_records_fills_every_record() {
        let generator = generator(EngineConfig::minimal());
        let doc = doc("javascript", &["a();", "b();"]);
        let mut records = vec![record_at(0), record_at(1)];
        generator.label_records(&doc, &mut records).await;
        let labels: Vec<Option<String>> = records.into_iter().map(|r| r.cached_label).collect();
        assert_eq!(labels, vec![Some("a();\\nb();".into()), Some("b();".into())]);
    }
}

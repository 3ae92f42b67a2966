//! Marker ids and the patterns that find them inside comments.
//!
//! A marker is a 4-character lowercase base-36 id wrapped as `:xxxx;`. The
//! exact shape is part of the on-disk contract: documents written by one
//! session must be readable by the next.

use crate::error::{Result, SyntaxError};
use crate::language::{comment_delimiters, CommentDelimiters};
use crate::{line_starts, Position};
use getrandom::getrandom;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

pub const MARKER_OPEN: char = ':';
pub const MARKER_CLOSE: char = ';';
pub const MARKER_ID_LEN: usize = 4;

const ALPHABET: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const ID_SPACE: u32 = 36 * 36 * 36 * 36;
const RANDOM_ATTEMPTS: usize = 64;

const MARKER_BODY: &str = r":[0-9a-z]{4};";

/// Bare marker token, independent of any comment syntax
pub static MARKER_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(MARKER_BODY).expect("marker token regex"));

static EXACT_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!("^{MARKER_BODY}$")).expect("exact marker regex"));

static PATTERN_CACHE: Lazy<Mutex<HashMap<(CommentDelimiters, bool), Regex>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

static SPAN_CACHE: Lazy<Mutex<HashMap<CommentDelimiters, Regex>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

/// One marker found in a document during a scan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkerOccurrence {
    pub marker: String,
    pub position: Position,
}

/// True when `text` is exactly one well-formed marker
#[must_use]
pub fn is_marker(text: &str) -> bool {
    EXACT_MARKER.is_match(text)
}

fn encode_id(mut value: u32) -> String {
    let mut digits = [b'0'; MARKER_ID_LEN];
    for slot in digits.iter_mut().rev() {
        *slot = ALPHABET[(value % 36) as usize];
        value /= 36;
    }
    let mut marker = String::with_capacity(MARKER_ID_LEN + 2);
    marker.push(MARKER_OPEN);
    marker.extend(digits.iter().map(|&b| char::from(b)));
    marker.push(MARKER_CLOSE);
    marker
}

fn random_id_best_effort() -> Option<u32> {
    let mut bytes = [0u8; 4];
    getrandom(&mut bytes).ok()?;
    Some(u32::from_be_bytes(bytes) % ID_SPACE)
}

/// Mint a marker that `is_taken` rejects for no existing value.
///
/// Random draws first; once those keep colliding the id space is walked
/// sequentially from the last draw so a free id is always found if one exists.
pub fn new_marker_with(is_taken: impl Fn(&str) -> bool) -> Result<String> {
    let mut seed = 0;
    for _ in 0..RANDOM_ATTEMPTS {
        let Some(candidate) = random_id_best_effort() else {
            break;
        };
        seed = candidate;
        let marker = encode_id(candidate);
        if !is_taken(&marker) {
            return Ok(marker);
        }
    }

    for offset in 0..ID_SPACE {
        let marker = encode_id((seed + offset) % ID_SPACE);
        if !is_taken(&marker) {
            return Ok(marker);
        }
    }
    Err(SyntaxError::MarkerSpaceExhausted {
        attempts: RANDOM_ATTEMPTS + ID_SPACE as usize,
    })
}

/// Mint a marker absent from `existing`
pub fn new_marker(existing: &HashSet<String>) -> Result<String> {
    new_marker_with(|candidate| existing.contains(candidate))
}

fn build_pattern(delimiters: CommentDelimiters, anchored: bool) -> Result<Regex> {
    let left = regex::escape(delimiters.left);
    let mut pattern = format!(r"(?m){left}[^\n]*?(?P<marker>{MARKER_BODY})");
    if !delimiters.is_line_comment() {
        let right = regex::escape(delimiters.right);
        pattern.push_str(&format!(r"[^\n]*?{right}"));
    }
    if anchored {
        pattern.push_str(r"[ \t]*\r?$");
    }
    Ok(Regex::new(&pattern)?)
}

/// Pattern locating `left ... marker ... right` for a language.
///
/// Anchored patterns only match when the comment ends the line, which is what
/// placement needs. Unanchored patterns are meant for `captures_iter` over a
/// whole document. The `marker` capture group holds the marker itself.
pub fn marker_pattern(language_id: &str, anchored: bool) -> Result<Regex> {
    let delimiters = comment_delimiters(language_id);
    let key = (delimiters, anchored);
    if let Ok(cache) = PATTERN_CACHE.lock() {
        if let Some(regex) = cache.get(&key) {
            return Ok(regex.clone());
        }
    }
    let regex = build_pattern(delimiters, anchored)?;
    if let Ok(mut cache) = PATTERN_CACHE.lock() {
        cache.insert(key, regex.clone());
    }
    Ok(regex)
}

fn build_span_pattern(delimiters: CommentDelimiters) -> Result<Regex> {
    let left = regex::escape(delimiters.left);
    let pattern = if delimiters.is_line_comment() {
        format!(r"{left}[^\n]*")
    } else {
        let right = regex::escape(delimiters.right);
        format!(r"{left}[^\n]*?{right}")
    };
    Ok(Regex::new(&pattern)?)
}

/// Single-line comment spans of a language: line comments run to the end of
/// the line, block comments must close on the line they open.
fn comment_span_pattern(language_id: &str) -> Result<Regex> {
    let delimiters = comment_delimiters(language_id);
    if let Ok(cache) = SPAN_CACHE.lock() {
        if let Some(regex) = cache.get(&delimiters) {
            return Ok(regex.clone());
        }
    }
    let regex = build_span_pattern(delimiters)?;
    if let Ok(mut cache) = SPAN_CACHE.lock() {
        cache.insert(delimiters, regex.clone());
    }
    Ok(regex)
}

/// Every marker embedded in a comment of `text`, ascending by position.
///
/// A comment may hold several markers; each one is reported.
pub fn find_markers(text: &str, language_id: &str) -> Result<Vec<MarkerOccurrence>> {
    let spans = comment_span_pattern(language_id)?;
    let starts = line_starts(text);

    let mut found = Vec::new();
    for span in spans.find_iter(text) {
        for marker in MARKER_TOKEN.find_iter(span.as_str()) {
            let offset = span.start() + marker.start();
            let line = starts.partition_point(|&start| start <= offset) - 1;
            let character = text[starts[line]..offset].chars().count();
            found.push(MarkerOccurrence {
                marker: marker.as_str().to_string(),
                position: Position::new(line, character),
            });
        }
    }
    Ok(found)
}

/// Text appended to a line to embed `marker` in a trailing comment
#[must_use]
pub fn marker_comment(language_id: &str, marker: &str) -> String {
    let delimiters = comment_delimiters(language_id);
    if delimiters.is_line_comment() {
        format!(" {} {marker}", delimiters.left)
    } else {
        format!(" {} {marker} {}", delimiters.left, delimiters.right)
    }
}

/// Remove `marker` from `line`, dropping the comment too if nothing else is left in it
pub fn strip_marker_comment(line: &str, language_id: &str, marker: &str) -> Result<String> {
    let Some(at) = line.find(marker) else {
        return Ok(line.to_string());
    };
    let mut without = String::with_capacity(line.len());
    without.push_str(line[..at].trim_end_matches([' ', '\t']));
    without.push_str(&line[at + marker.len()..]);

    let delimiters = comment_delimiters(language_id);
    let left = regex::escape(delimiters.left);
    let remnant = if delimiters.is_line_comment() {
        Regex::new(&format!(r"[ \t]*{left}[ \t]*$"))?
    } else {
        let right = regex::escape(delimiters.right);
        Regex::new(&format!(r"[ \t]*{left}[ \t]*{right}[ \t]*$"))?
    };
    Ok(remnant.replace(&without, "").into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_new_marker_shape() {
        let marker = new_marker(&HashSet::new()).unwrap();
        assert!(is_marker(&marker), "{marker}");
        assert_eq!(marker.len(), 6);
    }

    #[test]
    fn test_new_marker_avoids_existing() {
        let mut existing = HashSet::new();
        for _ in 0..200 {
            let marker = new_marker(&existing).unwrap();
            assert!(!existing.contains(&marker));
            existing.insert(marker);
        }
    }

    #[test]
    fn test_new_marker_walks_space_when_random_collides() {
        let marker = new_marker_with(|candidate| candidate != ":zzzz;").unwrap();
        assert_eq!(marker, ":zzzz;");
    }

    #[test]
    fn test_is_marker() {
        assert!(is_marker(":ab12;"));
        assert!(!is_marker(":AB12;"));
        assert!(!is_marker(":ab1;"));
        assert!(!is_marker("x:ab12;"));
    }

    #[test]
    fn test_find_markers_line_comment() {
        let text = "fn a() {}\n\nlet x = 1; // :ab12;\nlet y = 2; // note :cd34;\n";
        let found = find_markers(text, "rust").unwrap();
        assert_eq!(
            found,
            vec![
                MarkerOccurrence {
                    marker: ":ab12;".into(),
                    position: Position::new(2, 14),
                },
                MarkerOccurrence {
                    marker: ":cd34;".into(),
                    position: Position::new(3, 19),
                },
            ]
        );
    }

    #[test]
    fn test_find_markers_ignores_bare_tokens() {
        let found = find_markers("label :ab12; outside comment", "rust").unwrap();
        assert!(found.is_empty());
    }

    #[test]
    fn test_find_markers_several_in_one_comment() {
        let found = find_markers("x(); // note :aaaa; :cccc;", "javascript").unwrap();
        let markers: Vec<&str> = found.iter().map(|o| o.marker.as_str()).collect();
        assert_eq!(markers, vec![":aaaa;", ":cccc;"]);
        assert_eq!(found[1].position, Position::new(0, 20));

        let found = find_markers("<p/> <!-- :aaaa; :bbbb; --> <!-- :cccc; -->", "html").unwrap();
        assert_eq!(found.len(), 3);
    }

    #[test]
    fn test_find_markers_block_comment() {
        let text = "<p>hi</p> <!-- :zz99; -->\n<p>no</p> <!-- :zz98;";
        let found = find_markers(text, "html").unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].marker, ":zz99;");
    }

    #[test]
    fn test_find_markers_counts_characters_not_bytes() {
        let found = find_markers("é = 1 # :a1b2;", "python").unwrap();
        assert_eq!(found[0].position, Position::new(0, 8));
    }

    #[test]
    fn test_anchored_pattern_requires_line_end() {
        let anchored = marker_pattern("rust", true).unwrap();
        assert!(anchored.is_match("x(); // :ab12;"));
        assert!(anchored.is_match("x(); // :ab12;  "));
        assert!(!anchored.is_match("x(); // :ab12; trailing"));
    }

    #[test]
    fn test_marker_comment_round_trip() {
        let line = format!("x = 1{}", marker_comment("python", ":ab12;"));
        assert_eq!(line, "x = 1 # :ab12;");
        assert_eq!(strip_marker_comment(&line, "python", ":ab12;").unwrap(), "x = 1");

        let css = format!("a {{}}{}", marker_comment("css", ":ab12;"));
        assert_eq!(css, "a {} /* :ab12; */");
        assert_eq!(strip_marker_comment(&css, "css", ":ab12;").unwrap(), "a {}");
    }

    #[test]
    fn test_strip_marker_keeps_other_comment_text() {
        let stripped = strip_marker_comment("x(); // keep me :ab12;", "rust", ":ab12;").unwrap();
        assert_eq!(stripped, "x(); // keep me");

        let line = "x(); // note :aaaa; :cccc;";
        let once = strip_marker_comment(line, "rust", ":aaaa;").unwrap();
        assert_eq!(once, "x(); // note :cccc;");
        assert_eq!(strip_marker_comment(&once, "rust", ":cccc;").unwrap(), "x(); // note");
    }
}

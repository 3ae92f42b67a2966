use crate::document::Document;
use crate::{EngineError, Result};
use anchormark_store::{BookmarkRecord, BookmarkStore, StoreChange};
use anchormark_syntax::{
    find_insertion_line, find_markers, marker_comment, strip_marker_comment, Position,
};
use log::{debug, info};
use serde::Serialize;
use std::collections::BTreeSet;

/// What a toggle did
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ToggleOutcome {
    Added { marker: String, line: usize },
    Removed { markers: Vec<String>, line: usize },
}

fn check_line(doc: &dyn Document, line: usize) -> Result<()> {
    if line >= doc.line_count() {
        return Err(EngineError::InvalidLine {
            line,
            line_count: doc.line_count(),
        });
    }
    Ok(())
}

/// Strip every marker on `line` and delete the bookmarks it held.
///
/// Returns the markers removed, `None` when the line had no bookmark.
async fn remove_line_bookmarks(
    store: &mut BookmarkStore,
    doc: &mut dyn Document,
    line: usize,
) -> Result<Option<Vec<String>>> {
    let language_id = doc.language_id().to_string();
    let file_path = doc.file_path().to_string();
    let text = doc
        .line_text(line)
        .ok_or(EngineError::InvalidLine {
            line,
            line_count: doc.line_count(),
        })?
        .to_string();

    let mut markers: BTreeSet<String> = store
        .all_for_file(&file_path)
        .into_iter()
        .filter(|record| record.line_number == line)
        .map(|record| record.marker)
        .collect();
    let in_text: Vec<String> = find_markers(&text, &language_id)?
        .into_iter()
        .map(|occurrence| occurrence.marker)
        .collect();
    markers.extend(in_text.iter().cloned());
    if markers.is_empty() {
        return Ok(None);
    }

    let mut stripped = text.clone();
    for marker in &in_text {
        stripped = strip_marker_comment(&stripped, &language_id, marker)?;
    }
    if stripped != text {
        if let Some(range) = doc.line_range(line) {
            doc.replace(range, &stripped)?;
        }
    }

    let changes = markers
        .iter()
        .filter(|marker| {
            store
                .get(marker)
                .is_some_and(|record| record.file_path == file_path)
        })
        .map(|marker| StoreChange::Delete(marker.clone()))
        .collect();
    store.apply(changes).await?;
    Ok(Some(markers.into_iter().collect()))
}

/// Add or remove the bookmark on `line`.
///
/// A line that has a bookmark (or whose insertion target has one) loses it
/// along with its marker text. Otherwise a fresh marker is appended to the
/// first line at or below `line` where a trailing comment cannot land inside
/// a multi-line string, and an anchored record is stored for it.
pub async fn toggle(
    store: &mut BookmarkStore,
    doc: &mut dyn Document,
    line: usize,
) -> Result<ToggleOutcome> {
    check_line(doc, line)?;
    let target = find_insertion_line(doc.text(), line);

    let mut candidates = vec![line];
    if target.line != line {
        candidates.push(target.line);
    }
    for candidate in candidates {
        if let Some(markers) = remove_line_bookmarks(store, doc, candidate).await? {
            info!(
                "Removed bookmark {} from {}:{}",
                markers.join(","),
                doc.file_path(),
                candidate + 1
            );
            return Ok(ToggleOutcome::Removed {
                markers,
                line: candidate,
            });
        }
    }

    let marker = store.new_marker()?;
    let appended = format!(
        "{}{}",
        target.text,
        marker_comment(doc.language_id(), &marker)
    );
    let character = appended
        .find(&marker)
        .map_or(0, |at| appended[..at].chars().count());
    let range = doc.line_range(target.line).ok_or(EngineError::InvalidLine {
        line: target.line,
        line_count: doc.line_count(),
    })?;
    doc.replace(range, &appended)?;

    if target.line != line {
        debug!(
            "Line {} ends inside a multi-line string; marker placed on line {}",
            line + 1,
            target.line + 1
        );
    }
    store
        .put(BookmarkRecord::anchored(
            marker.clone(),
            doc.file_path(),
            doc.folder_path(),
            doc.language_id(),
            Position::new(target.line, character),
        ))
        .await?;
    info!(
        "Added bookmark {marker} at {}:{}",
        doc.file_path(),
        target.line + 1
    );
    Ok(ToggleOutcome::Added {
        marker,
        line: target.line,
    })
}

/// Bookmark `line` without writing marker text.
///
/// Returns `None` when the line already has a bookmark.
pub async fn place_explicit(
    store: &mut BookmarkStore,
    doc: &dyn Document,
    line: usize,
) -> Result<Option<BookmarkRecord>> {
    check_line(doc, line)?;
    let taken = store
        .all_for_file(doc.file_path())
        .iter()
        .any(|record| record.line_number == line);
    let text = doc.line_text(line).unwrap_or_default();
    if taken || !find_markers(text, doc.language_id())?.is_empty() {
        debug!("{}:{} already has a bookmark", doc.file_path(), line + 1);
        return Ok(None);
    }

    let record = BookmarkRecord::explicit(
        store.new_marker()?,
        doc.file_path(),
        doc.folder_path(),
        doc.language_id(),
        Position::new(line, text.chars().count()),
    );
    store.put(record.clone()).await?;
    Ok(Some(record))
}

/// Strip all marker text from `doc` and forget its bookmarks; returns how many were removed
pub async fn clear_file(store: &mut BookmarkStore, doc: &mut dyn Document) -> Result<usize> {
    let language_id = doc.language_id().to_string();
    let occurrences = find_markers(doc.text(), &language_id)?;

    let mut lines: Vec<usize> = occurrences.iter().map(|o| o.position.line).collect();
    lines.dedup();
    for line in lines.into_iter().rev() {
        let Some(text) = doc.line_text(line) else {
            continue;
        };
        let mut stripped = text.to_string();
        for occurrence in occurrences.iter().filter(|o| o.position.line == line) {
            stripped = strip_marker_comment(&stripped, &language_id, &occurrence.marker)?;
        }
        if let Some(range) = doc.line_range(line) {
            doc.replace(range, &stripped)?;
        }
    }

    let removed = store.delete_file(doc.file_path()).await?;
    info!(
        "Cleared {} bookmarks and {} markers from {}",
        removed.len(),
        occurrences.len(),
        doc.file_path()
    );
    Ok(removed.len())
}

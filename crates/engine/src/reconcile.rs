//! Reconciliation of stored bookmarks against a live document.
//!
//! ```text
//! document text ──> find_markers ──┐
//!                                  ├──> plan_pass ──> label ──> diff ──> store.apply
//! store.all_for_file ──────────────┘        │
//!                                           └── relocate, pair per line, cap one per line
//! ```
//!
//! Passes for one document never overlap. A request arriving while a pass
//! runs is parked; when the pass ends the newest parked document is
//! reconciled once more after a short delay.

use crate::config::EngineConfig;
use crate::document::Document;
use crate::label::LabelGenerator;
use crate::Result;
use anchormark_store::{BookmarkRecord, BookmarkStore, FileSystem, Generation, StoreChange};
use anchormark_syntax::{find_markers, MarkerOccurrence};
use log::{debug, info, warn};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, Mutex as TokioMutex};

/// Summary of one completed pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileUpdate {
    pub file_path: String,
    /// Records new to this file (created, retyped to a new marker, or adopted)
    pub added: usize,
    /// Records of this file that no longer exist
    pub removed: usize,
    /// Records whose cached position changed
    pub moved: usize,
    pub retyped: usize,
    pub promoted: usize,
    pub adopted: usize,
    /// Records dropped to keep one bookmark per line
    pub collapsed: usize,
    /// Marker copies ignored because another record owns the text
    pub skipped_duplicates: usize,
    /// Records of this file after the pass
    pub bookmarks: usize,
    pub duration_ms: u64,
}

impl ReconcileUpdate {
    /// True when the pass wrote nothing but labels
    #[must_use]
    pub const fn is_structural_noop(&self) -> bool {
        self.added == 0 && self.removed == 0 && self.moved == 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    Completed(ReconcileUpdate),
    /// Folded into a pass already running for the same document
    Coalesced,
}

/// Markers found in the document whose records belong to other files
#[derive(Debug, Default)]
pub(crate) struct ForeignMarkers {
    /// Owner file still exists; the occurrence is a copy
    pub live: HashSet<String>,
    /// Owner file is gone; the record follows its marker here
    pub orphaned: HashMap<String, BookmarkRecord>,
}

#[derive(Debug)]
pub(crate) struct PassPlan {
    pub records: Vec<BookmarkRecord>,
    pub update: ReconcileUpdate,
}

struct Candidate {
    record: BookmarkRecord,
    existing: bool,
}

fn anchored_from(doc: &dyn Document, token: &MarkerOccurrence) -> BookmarkRecord {
    BookmarkRecord::anchored(
        token.marker.clone(),
        doc.file_path(),
        doc.folder_path(),
        doc.language_id(),
        token.position,
    )
}

/// Decide the record set of `doc` from its marker occurrences and stored records.
///
/// Pure: nothing is written. `records` are the file's stored records,
/// `foreign` classifies markers owned by other files.
pub(crate) fn plan_pass(
    doc: &dyn Document,
    occurrences: &[MarkerOccurrence],
    records: Vec<BookmarkRecord>,
    foreign: &ForeignMarkers,
) -> PassPlan {
    let mut update = ReconcileUpdate {
        file_path: doc.file_path().to_string(),
        ..Default::default()
    };
    let last_line = doc.line_count().saturating_sub(1);

    let mut by_text: HashMap<&str, Vec<usize>> = HashMap::new();
    for (index, occurrence) in occurrences.iter().enumerate() {
        by_text
            .entry(occurrence.marker.as_str())
            .or_default()
            .push(index);
    }

    // One occurrence per marker text takes part; copies are ignored.
    let mut participating = vec![false; occurrences.len()];
    let mut records = records;
    let mut owned: HashSet<String> = HashSet::new();
    for record in &mut records {
        owned.insert(record.marker.clone());
        if let Some(indices) = by_text.get(record.marker.as_str()) {
            let cached_line = record.line_number;
            let nearest = indices
                .iter()
                .copied()
                .min_by_key(|&i| (occurrences[i].position.line.abs_diff(cached_line), i))
                .unwrap_or(indices[0]);
            participating[nearest] = true;
            let position = occurrences[nearest].position;
            record.line_number = position.line;
            record.character_offset = position.character;
            update.skipped_duplicates += indices.len() - 1;
        } else if record.generation == Generation::Explicit && record.line_number > last_line {
            record.line_number = last_line;
            record.character_offset = 0;
        }
    }

    for (text, indices) in &by_text {
        if owned.contains(*text) {
            continue;
        }
        if foreign.live.contains(*text) {
            debug!(
                "Ignoring {} in {}: marker belongs to another file",
                text,
                doc.file_path()
            );
            update.skipped_duplicates += indices.len();
            continue;
        }
        let first = indices[0];
        if let Some(orphan) = foreign.orphaned.get(*text) {
            debug!(
                "Adopting {} from missing file {} into {}",
                text,
                orphan.file_path,
                doc.file_path()
            );
            records.push(BookmarkRecord {
                file_path: doc.file_path().to_string(),
                folder_path: doc.folder_path().to_string(),
                language_id: doc.language_id().to_string(),
                ..orphan.clone().at(occurrences[first].position)
            });
            update.adopted += 1;
        }
        participating[first] = true;
        update.skipped_duplicates += indices.len() - 1;
    }

    let tokens: Vec<&MarkerOccurrence> = occurrences
        .iter()
        .zip(&participating)
        .filter(|(_, take)| **take)
        .map(|(occurrence, _)| occurrence)
        .collect();
    records.sort_by(|a, b| {
        a.position()
            .cmp(&b.position())
            .then_with(|| a.marker.cmp(&b.marker))
    });

    // Bottom-up merge, one line at a time; both cursors move down together.
    let mut kept = Vec::new();
    let mut token_end = tokens.len();
    while token_end > 0 || !records.is_empty() {
        let token_line = token_end.checked_sub(1).map(|i| tokens[i].position.line);
        let record_line = records.last().map(|record| record.line_number);
        let Some(line) = token_line.max(record_line) else {
            break;
        };
        let token_start = tokens[..token_end].partition_point(|t| t.position.line < line);
        let record_start = records.partition_point(|r| r.line_number < line);
        let line_records = records.split_off(record_start);
        let line_tokens = tokens[token_start..token_end].to_vec();
        if let Some(keeper) = resolve_line(doc, line, line_tokens, line_records, &mut update) {
            kept.push(keeper);
        }
        token_end = token_start;
    }
    kept.reverse();

    PassPlan {
        records: kept,
        update,
    }
}

/// Pair the tokens and records of one line and keep at most one bookmark
fn resolve_line(
    doc: &dyn Document,
    line: usize,
    tokens: Vec<&MarkerOccurrence>,
    records: Vec<BookmarkRecord>,
    update: &mut ReconcileUpdate,
) -> Option<BookmarkRecord> {
    let mut survivors = Vec::new();
    let mut tokens = tokens;
    let mut unpaired = Vec::new();

    for record in records {
        match tokens.iter().position(|token| token.marker == record.marker) {
            Some(at) => {
                let token = tokens.remove(at);
                if record.generation == Generation::Explicit {
                    update.promoted += 1;
                    survivors.push(Candidate {
                        record: anchored_from(doc, token),
                        existing: true,
                    });
                } else {
                    survivors.push(Candidate {
                        record,
                        existing: true,
                    });
                }
            }
            None => unpaired.push(record),
        }
    }

    let mut tokens = tokens.into_iter();
    for record in unpaired {
        match (tokens.next(), record.generation) {
            (Some(token), Generation::Explicit) => {
                update.promoted += 1;
                survivors.push(Candidate {
                    record: anchored_from(doc, token),
                    existing: true,
                });
            }
            (Some(token), Generation::Anchored) => {
                debug!(
                    "Marker {} retyped to {} on line {}",
                    record.marker, token.marker, line
                );
                update.retyped += 1;
                survivors.push(Candidate {
                    record: BookmarkRecord {
                        marker: token.marker.clone(),
                        ..record.at(token.position)
                    },
                    existing: true,
                });
            }
            (None, Generation::Anchored) => {
                debug!("Dropping {}: marker text is gone", record.marker);
            }
            (None, Generation::Explicit) => survivors.push(Candidate {
                record,
                existing: true,
            }),
        }
    }
    for token in tokens {
        survivors.push(Candidate {
            record: anchored_from(doc, token),
            existing: false,
        });
    }

    if survivors.len() > 1 {
        update.collapsed += survivors.len() - 1;
    }
    let any_anchored = survivors.iter().any(|c| c.record.is_anchored());
    survivors
        .into_iter()
        .filter(|c| !any_anchored || c.record.is_anchored())
        .min_by(|a, b| {
            a.record
                .character_offset
                .cmp(&b.record.character_offset)
                .then(b.existing.cmp(&a.existing))
                .then_with(|| a.record.marker.cmp(&b.record.marker))
        })
        .map(|candidate| candidate.record)
}

/// Store changes turning `originals` into `finals`
fn diff_changes(
    originals: &[BookmarkRecord],
    finals: &[BookmarkRecord],
    update: &mut ReconcileUpdate,
) -> Vec<StoreChange> {
    let before: HashMap<&str, &BookmarkRecord> = originals
        .iter()
        .map(|record| (record.marker.as_str(), record))
        .collect();
    let after: HashSet<&str> = finals.iter().map(|record| record.marker.as_str()).collect();

    let mut changes = Vec::new();
    for record in originals {
        if !after.contains(record.marker.as_str()) {
            update.removed += 1;
            changes.push(StoreChange::Delete(record.marker.clone()));
        }
    }
    for record in finals {
        match before.get(record.marker.as_str()) {
            Some(previous) if *previous == record => {}
            Some(previous) => {
                if previous.position() != record.position() {
                    update.moved += 1;
                }
                changes.push(StoreChange::Put(record.clone()));
            }
            None => {
                update.added += 1;
                changes.push(StoreChange::Put(record.clone()));
            }
        }
    }
    changes
}

type RunningPasses = HashMap<String, Option<Arc<dyn Document>>>;

fn lock_running(running: &Mutex<RunningPasses>) -> MutexGuard<'_, RunningPasses> {
    match running.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Exclusive right to run passes for one file.
///
/// Dropping the claim releases the file, so a cancelled or failed pass
/// never leaves it locked.
struct Claim<'a> {
    running: &'a Mutex<RunningPasses>,
    file_path: String,
    released: bool,
}

impl<'a> Claim<'a> {
    /// Claim `doc`'s file, or park `doc` behind the pass already holding it
    fn acquire(running: &'a Mutex<RunningPasses>, doc: &Arc<dyn Document>) -> Option<Self> {
        let mut passes = lock_running(running);
        if let Some(parked) = passes.get_mut(doc.file_path()) {
            *parked = Some(doc.clone());
            return None;
        }
        passes.insert(doc.file_path().to_string(), None);
        Some(Self {
            running,
            file_path: doc.file_path().to_string(),
            released: false,
        })
    }

    /// Next parked document; releases the file in the same step when there is none
    fn take_parked_or_release(&mut self) -> Option<Arc<dyn Document>> {
        let mut passes = lock_running(self.running);
        if let Some(doc) = passes.get_mut(&self.file_path).and_then(Option::take) {
            return Some(doc);
        }
        passes.remove(&self.file_path);
        self.released = true;
        None
    }
}

impl Drop for Claim<'_> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        let parked = lock_running(self.running).remove(&self.file_path);
        if matches!(parked, Some(Some(_))) {
            debug!("Pass for {} abandoned; parked request dropped", self.file_path);
        }
    }
}

/// Runs reconciliation passes, one at a time per document
pub struct Reconciler {
    store: Arc<TokioMutex<BookmarkStore>>,
    fs: Arc<dyn FileSystem>,
    labels: Arc<LabelGenerator>,
    coalesce_delay: Duration,
    /// Documents with a pass in flight, with the newest parked re-run request
    running: Mutex<RunningPasses>,
    updates: broadcast::Sender<ReconcileUpdate>,
}

impl Reconciler {
    pub fn new(
        store: Arc<TokioMutex<BookmarkStore>>,
        fs: Arc<dyn FileSystem>,
        labels: Arc<LabelGenerator>,
        config: &EngineConfig,
    ) -> Self {
        let (updates, _) = broadcast::channel(64);
        Self {
            store,
            fs,
            labels,
            coalesce_delay: config.coalesce_delay(),
            running: Mutex::new(HashMap::new()),
            updates,
        }
    }

    /// Completion notifications, one per finished pass
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ReconcileUpdate> {
        self.updates.subscribe()
    }

    /// Bring the store in line with `doc`.
    ///
    /// Returns [`ReconcileOutcome::Coalesced`] when a pass for the same file
    /// is already running; that pass picks up `doc` when it finishes, even
    /// if its own pass fails.
    pub async fn reconcile(&self, doc: Arc<dyn Document>) -> Result<ReconcileOutcome> {
        let file_path = doc.file_path().to_string();
        let Some(mut claim) = Claim::acquire(&self.running, &doc) else {
            debug!("Reconcile of {file_path} coalesced into the running pass");
            return Ok(ReconcileOutcome::Coalesced);
        };

        let mut current = doc;
        loop {
            let result = self.run_pass(current.as_ref()).await;
            if let Ok(update) = &result {
                let _ = self.updates.send(update.clone());
            }
            let next = claim.take_parked_or_release();
            match (result, next) {
                (Ok(update), None) => return Ok(ReconcileOutcome::Completed(update)),
                (Err(e), None) => return Err(e),
                (Ok(_), Some(next)) => current = next,
                (Err(e), Some(next)) => {
                    warn!("Reconcile of {file_path} failed ({e}); running the parked document");
                    current = next;
                }
            }
            tokio::time::sleep(self.coalesce_delay).await;
        }
    }

    async fn run_pass(&self, doc: &dyn Document) -> Result<ReconcileUpdate> {
        let started = Instant::now();
        let occurrences = find_markers(doc.text(), doc.language_id())?;

        // Outline first: the store lock is never held across a symbol query.
        let has_records = self
            .store
            .lock()
            .await
            .records()
            .any(|record| record.file_path == doc.file_path());
        let outline = if has_records || !occurrences.is_empty() {
            self.labels.outline(doc).await
        } else {
            None
        };

        let mut store = self.store.lock().await;
        let originals = store.all_for_file(doc.file_path());

        let own: HashSet<&str> = originals.iter().map(|r| r.marker.as_str()).collect();
        let mut foreign = ForeignMarkers::default();
        for occurrence in &occurrences {
            if own.contains(occurrence.marker.as_str()) {
                continue;
            }
            let Some(owner) = store.get(&occurrence.marker) else {
                continue;
            };
            if self.fs.exists(&owner.file_path).await {
                foreign.live.insert(occurrence.marker.clone());
            } else {
                foreign
                    .orphaned
                    .insert(occurrence.marker.clone(), owner.clone());
            }
        }

        let PassPlan {
            mut records,
            mut update,
        } = plan_pass(doc, &occurrences, originals.clone(), &foreign);
        self.labels.label_records_with(doc, &mut records, outline.as_deref());

        let changes = diff_changes(&originals, &records, &mut update);
        let changed = !changes.is_empty();
        store.apply(changes).await?;

        update.bookmarks = records.len();
        update.duration_ms = started.elapsed().as_millis() as u64;
        if changed && !update.is_structural_noop() {
            info!(
                "Reconciled {}: +{} -{} moved {} ({} bookmarks, {}ms)",
                update.file_path,
                update.added,
                update.removed,
                update.moved,
                update.bookmarks,
                update.duration_ms
            );
        } else {
            debug!(
                "Reconciled {}: {} bookmarks, {}ms",
                update.file_path, update.bookmarks, update.duration_ms
            );
        }
        Ok(update)
    }
}

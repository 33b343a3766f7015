mod entry;
mod reconcile;
mod scanner;
mod store;

pub use entry::{build_entry, BuiltEntry, SUPPORTED_FORMATS};
pub use reconcile::build_reconciliation_map;
pub use scanner::{FolderScanner, FsScanner, RawEntry};
pub use store::{
    MemorySnapshotStore, RedbSnapshotStore, SnapshotStore, StoreError, SNAPSHOT_VERSION,
};

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use common::{normalize_path, Beat};
use futures_util::future::join_all;
use futures_util::stream::{FuturesUnordered, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio::task::JoinError;
use tracing::{debug, info, warn};

const BATCH_SIZE: usize = 24;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScanProgress {
    pub current: usize,
    pub total: usize,
    pub percentage: u8,
}

pub type ProgressFn = dyn Fn(ScanProgress) + Send + Sync;

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct ScanStats {
    pub files: usize,
    pub added: usize,
    pub carried: usize,
    pub degraded: usize,
}

#[derive(Debug, Default)]
pub struct ScanReport {
    pub beats: Vec<Beat>,
    pub errors: Vec<String>,
    pub stats: ScanStats,
}

#[derive(Debug)]
pub enum IndexError {
    Join(String),
    Store(StoreError),
}

impl std::fmt::Display for IndexError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IndexError::Join(err) => write!(f, "task join error: {}", err),
            IndexError::Store(err) => write!(f, "store error: {}", err),
        }
    }
}

impl std::error::Error for IndexError {}

impl From<JoinError> for IndexError {
    fn from(err: JoinError) -> Self {
        IndexError::Join(err.to_string())
    }
}

impl From<StoreError> for IndexError {
    fn from(err: StoreError) -> Self {
        IndexError::Store(err)
    }
}

pub struct Indexer {
    scanner: Arc<dyn FolderScanner>,
    store: Arc<dyn SnapshotStore>,
    scan_lock: Mutex<()>,
}

impl Indexer {
    pub fn new(scanner: Arc<dyn FolderScanner>, store: Arc<dyn SnapshotStore>) -> Self {
        Self {
            scanner,
            store,
            scan_lock: Mutex::new(()),
        }
    }

    pub fn open(index_path: &Path) -> Result<Self, StoreError> {
        let store = RedbSnapshotStore::open(index_path)?;
        Ok(Self::new(Arc::new(FsScanner), Arc::new(store)))
    }

    /// Scans the given roots and persists the result as the new snapshot.
    /// Folder and file level failures are collected into the report instead
    /// of aborting the run; only a task panic surfaces as `Err`.
    pub async fn scan(
        &self,
        folders: &[PathBuf],
        on_progress: Option<&ProgressFn>,
    ) -> Result<ScanReport, IndexError> {
        let _guard = self.scan_lock.lock().await;

        let prior = self.load_snapshot().await;
        let existing = Arc::new(build_reconciliation_map(prior, folders));

        let walks = folders
            .iter()
            .map(|folder| walk_folder(Arc::clone(&self.scanner), folder.clone()));
        let listings = join_all(walks).await;

        let mut errors = Vec::new();
        let mut entries = Vec::new();
        for listing in listings {
            entries.extend(listing.entries);
            errors.extend(listing.errors);
        }

        let total = entries.len();
        if total == 0 {
            report_progress(on_progress, 0, 0);
            self.persist(&[]).await;
            return Ok(ScanReport {
                beats: Vec::new(),
                errors,
                stats: ScanStats::default(),
            });
        }

        let mut batches = FuturesUnordered::new();
        let mut pending = entries;
        while !pending.is_empty() {
            let rest = pending.split_off(pending.len().min(BATCH_SIZE));
            let batch = std::mem::replace(&mut pending, rest);
            let existing = Arc::clone(&existing);
            batches.push(tokio::task::spawn_blocking(move || {
                process_batch(batch, &existing)
            }));
        }

        // batch results are drained here, in this task, so progress values
        // are handed to the callback strictly in order even though the
        // batches themselves complete concurrently
        let mut beats = Vec::new();
        let mut seen_paths = HashSet::new();
        let mut stats = ScanStats {
            files: total,
            ..ScanStats::default()
        };
        let mut processed = 0usize;
        while let Some(joined) = batches.next().await {
            let outcome = joined?;
            processed += outcome.files;
            report_progress(on_progress, processed, total);
            debug!("Indexed {}/{} files", processed, total);

            for item in outcome.built {
                let key = normalize_path(&item.beat.path);
                // overlapping roots can surface the same file twice; one
                // record per normalized path wins
                if !seen_paths.insert(key.clone()) {
                    continue;
                }
                if item.extraction_error.is_some() {
                    stats.degraded += 1;
                }
                if existing.contains_key(&key) {
                    stats.carried += 1;
                } else {
                    stats.added += 1;
                }
                if let Some(err) = item.extraction_error {
                    errors.push(err);
                }
                beats.push(item.beat);
            }
        }

        self.persist(&beats).await;
        info!(
            "Scan complete: {} files, {} new, {} carried forward, {} degraded",
            stats.files, stats.added, stats.carried, stats.degraded
        );

        Ok(ScanReport {
            beats,
            errors,
            stats,
        })
    }

    /// Persists a single edited record (typically a user-entered bpm or key)
    /// by rewriting the whole snapshot; the store has no finer granularity.
    pub async fn update_beat(&self, beat: Beat) -> Result<(), IndexError> {
        let _guard = self.scan_lock.lock().await;
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || {
            let mut beats = store.load()?;
            match beats.iter_mut().find(|existing| existing.id == beat.id) {
                Some(slot) => *slot = beat,
                None => beats.push(beat),
            }
            store.save(&beats)
        })
        .await??;
        Ok(())
    }

    async fn load_snapshot(&self) -> Vec<Beat> {
        let store = Arc::clone(&self.store);
        match tokio::task::spawn_blocking(move || store.load()).await {
            Ok(Ok(beats)) => beats,
            Ok(Err(err)) => {
                warn!("Failed to load snapshot: {}; starting empty", err);
                Vec::new()
            }
            Err(err) => {
                warn!("Snapshot load join error: {}", err);
                Vec::new()
            }
        }
    }

    async fn persist(&self, beats: &[Beat]) {
        let store = Arc::clone(&self.store);
        let beats = beats.to_vec();
        match tokio::task::spawn_blocking(move || store.save(&beats)).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => warn!("Failed to persist snapshot: {}", err),
            Err(err) => warn!("Snapshot save join error: {}", err),
        }
    }
}

struct FolderListing {
    entries: Vec<RawEntry>,
    errors: Vec<String>,
}

// explicit work queue instead of call-stack recursion; depth is unbounded
async fn walk_folder(scanner: Arc<dyn FolderScanner>, root: PathBuf) -> FolderListing {
    let mut entries = Vec::new();
    let mut errors = Vec::new();
    let mut pending = VecDeque::new();
    pending.push_back(root);

    while let Some(dir) = pending.pop_front() {
        match scanner.list_dir(&dir).await {
            Ok(listed) => {
                for item in listed {
                    if item.is_dir {
                        pending.push_back(item.path);
                    } else if item.is_file {
                        entries.push(item);
                    }
                }
            }
            Err(err) => errors.push(format!("{}: {}", dir.display(), err)),
        }
    }

    FolderListing { entries, errors }
}

struct BatchOutcome {
    files: usize,
    built: Vec<BuiltEntry>,
}

// sequential on purpose: each build may read a whole file into memory, so
// the batch is the unit of concurrency, not the file
fn process_batch(batch: Vec<RawEntry>, existing: &HashMap<String, Beat>) -> BatchOutcome {
    let files = batch.len();
    let mut built = Vec::with_capacity(files);
    for entry in &batch {
        let key = normalize_path(&entry.path.to_string_lossy());
        if let Some(result) = build_entry(entry, existing.get(&key)) {
            built.push(result);
        }
    }
    BatchOutcome { files, built }
}

fn report_progress(on_progress: Option<&ProgressFn>, current: usize, total: usize) {
    let Some(callback) = on_progress else {
        return;
    };
    let percentage = if total == 0 {
        100
    } else {
        ((current as f64 / total as f64) * 100.0).round() as u8
    };
    callback(ScanProgress {
        current,
        total,
        percentage,
    });
}

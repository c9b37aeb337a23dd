use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};

use crate::models::{NewScan, ScannedItem};

pub const DEFAULT_CAPACITY: usize = 100;
pub const STORAGE_FILE: &str = "scanned_items_history.json";

#[derive(Debug, Serialize, Deserialize, Default)]
struct HistoryRecord {
    items: Vec<ScannedItem>,
}

/// Newest-first log of scans, capped and mirrored to a JSON file.
///
/// Cloning yields another handle to the same history. Every mutation holds
/// the list lock until its persist has finished, so writes reach disk in the
/// order the mutations happened.
#[derive(Debug, Clone)]
pub struct ScanHistory {
    inner: Arc<Mutex<Vec<ScannedItem>>>,
    updates: Arc<watch::Sender<Vec<ScannedItem>>>,
    path: Option<PathBuf>,
    capacity: usize,
}

impl ScanHistory {
    pub fn in_memory(capacity: usize) -> Self {
        Self::from_parts(Vec::new(), None, capacity)
    }

    /// Loads `<dir>/scanned_items_history.json`.
    pub async fn hydrate_from_dir(dir: impl AsRef<Path>, capacity: usize) -> Self {
        Self::hydrate(dir.as_ref().join(STORAGE_FILE), capacity).await
    }

    /// Reads the persisted history once. A missing file, an unreadable file
    /// or a corrupted record all start the session with an empty history.
    pub async fn hydrate(path: impl AsRef<Path>, capacity: usize) -> Self {
        let path = path.as_ref().to_path_buf();
        let items = match tokio::fs::read(&path).await {
            Ok(bytes) => match serde_json::from_slice::<HistoryRecord>(&bytes) {
                Ok(record) => {
                    info!(count = record.items.len(), "loaded scan history");
                    record.items
                }
                Err(e) => {
                    warn!(error = %e, path = %path.display(), "failed to parse scan history, starting empty");
                    Vec::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no persisted scan history");
                Vec::new()
            }
            Err(e) => {
                warn!(error = %e, path = %path.display(), "failed to read scan history, starting empty");
                Vec::new()
            }
        };
        Self::from_parts(items, Some(path), capacity)
    }

    /// A capacity of zero would drop every entry on insert; it is raised to one.
    fn from_parts(mut items: Vec<ScannedItem>, path: Option<PathBuf>, capacity: usize) -> Self {
        if capacity == 0 {
            warn!("scan history capacity of 0 raised to 1");
        }
        let capacity = capacity.max(1);
        items.truncate(capacity);
        let (updates, _) = watch::channel(items.clone());
        Self {
            inner: Arc::new(Mutex::new(items)),
            updates: Arc::new(updates),
            path,
            capacity,
        }
    }

    /// Receiver that observes the full list after every mutation.
    pub fn subscribe(&self) -> watch::Receiver<Vec<ScannedItem>> {
        self.updates.subscribe()
    }

    pub async fn items(&self) -> Vec<ScannedItem> {
        self.inner.lock().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.is_empty()
    }

    /// Puts `item` at the front, dropping any older entry for the same
    /// barcode and location.
    pub async fn upsert(&self, item: ScannedItem) {
        let (barcode, location) = (item.barcode.clone(), item.location.clone());
        self.upsert_with(&barcode, &location, |_| item).await;
    }

    /// Like [`upsert`](Self::upsert), but builds the entry from whatever
    /// currently occupies the slot. Lookup and replacement happen under one
    /// lock, so a concurrent `clear` or `append` cannot slip in between.
    pub async fn upsert_with<F>(&self, barcode: &str, location: &str, build: F) -> ScannedItem
    where
        F: FnOnce(Option<&ScannedItem>) -> ScannedItem,
    {
        let mut items = self.inner.lock().await;
        let pos = items
            .iter()
            .position(|existing| existing.same_slot(barcode, location));
        let item = build(pos.map(|pos| &items[pos]));
        if let Some(pos) = pos {
            items.remove(pos);
        }
        items.insert(0, item.clone());
        self.after_mutation(&mut items).await;
        item
    }

    /// Records a manual scan and returns the stored entry.
    pub async fn append(&self, scan: NewScan) -> ScannedItem {
        let item = ScannedItem::from_scan(scan);
        let mut items = self.inner.lock().await;
        items.insert(0, item.clone());
        self.after_mutation(&mut items).await;
        item
    }

    pub async fn clear(&self) {
        let mut items = self.inner.lock().await;
        items.clear();
        self.updates.send_replace(Vec::new());
        if let Some(path) = &self.path {
            match tokio::fs::remove_file(path).await {
                Ok(()) => info!("scan history cleared"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!(error = %e, path = %path.display(), "failed to remove scan history"),
            }
        }
    }

    async fn after_mutation(&self, items: &mut Vec<ScannedItem>) {
        items.truncate(self.capacity);
        self.updates.send_replace(items.clone());
        if !items.is_empty() {
            self.persist(items.as_slice()).await;
        }
    }

    async fn persist(&self, items: &[ScannedItem]) {
        let Some(path) = &self.path else {
            debug!("scan history is in-memory only; skipping persist");
            return;
        };
        let keep = items.len().min(self.capacity);
        let record = HistoryRecord {
            items: items[..keep].to_vec(),
        };
        let bytes = match serde_json::to_vec(&record) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(error = %e, "failed to serialize scan history");
                return;
            }
        };
        if let Some(parent) = path.parent() {
            if let Err(e) = tokio::fs::create_dir_all(parent).await {
                debug!(error = %e, path = %parent.display(), "failed to create scan history dir");
            }
        }
        let tmp = path.with_extension("json.tmp");
        if let Err(e) = tokio::fs::write(&tmp, &bytes).await {
            warn!(error = %e, path = %tmp.display(), "failed to write scan history");
            return;
        }
        if let Err(e) = tokio::fs::rename(&tmp, path).await {
            warn!(error = %e, path = %path.display(), "failed to persist scan history");
        }
    }
}

// src/store.rs
//! Client-side read-through cache of every request in the backing store.

use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::backing_store::BackingStore;
use crate::request::Request;

pub type Snapshot = Arc<Vec<Request>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// Snapshot replaced; carries the new record count.
    Replaced(usize),
    /// Fetch failed; the previous snapshot is still in place.
    Retained,
}

/// Holds the last fetched snapshot. It is rebuilt wholesale on every refresh
/// and never patched; the backing store stays authoritative.
pub struct RequestStore<S: BackingStore + ?Sized> {
    backend: Arc<S>,
    snapshot: watch::Sender<Snapshot>,
}

impl<S: BackingStore + ?Sized> RequestStore<S> {
    pub fn new(backend: Arc<S>) -> Self {
        let (snapshot, _) = watch::channel(Arc::new(Vec::new()));
        Self { backend, snapshot }
    }

    pub fn backend(&self) -> &Arc<S> {
        &self.backend
    }

    /// Current snapshot, sorted ascending by date.
    pub fn snapshot(&self) -> Snapshot {
        self.snapshot.borrow().clone()
    }

    /// Notified every time a refresh replaces the snapshot.
    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.snapshot.subscribe()
    }

    /// Fetches everything and swaps the snapshot in one step. Failures are
    /// logged and leave the old snapshot visible.
    ///
    /// Concurrent refreshes are not ordered: whichever completes last wins,
    /// even if it started first.
    pub async fn refresh(&self) -> RefreshOutcome {
        let raw = match self.backend.fetch_all().await {
            Ok(raw) => raw,
            Err(e) => {
                error!("Refresh failed, keeping previous snapshot: {}", e);
                return RefreshOutcome::Retained;
            }
        };

        let requests = decode_collection(raw);
        let count = requests.len();
        self.snapshot.send_replace(Arc::new(requests));
        info!("Request store refreshed: {} records", count);
        RefreshOutcome::Replaced(count)
    }
}

/// Non-arrays become an empty collection; undecodable rows are skipped.
/// The result is sorted ascending by date, keeping fetch order for ties.
pub fn decode_collection(raw: serde_json::Value) -> Vec<Request> {
    let rows = match raw {
        serde_json::Value::Array(rows) => rows,
        other => {
            warn!(
                "Backing store returned a non-array payload; treating as empty: {}",
                other
            );
            return Vec::new();
        }
    };

    let mut requests: Vec<Request> = rows
        .into_iter()
        .enumerate()
        .filter_map(|(index, row)| match serde_json::from_value::<Request>(row) {
            Ok(request) => Some(request),
            Err(e) => {
                warn!("Skipping undecodable row {}: {}", index, e);
                None
            }
        })
        .collect();
    requests.sort_by_key(|r| r.date);
    debug!("Decoded {} requests", requests.len());
    requests
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backing_store::memory::MemoryBackingStore;
    use crate::request::{RequestId, RequestStatus};
    use serde_json::json;
    use std::sync::atomic::Ordering;

    fn row(no: i64, name: &str, date: &str) -> serde_json::Value {
        json!({"no": no, "name": name, "date": date, "in": "8:00", "out": "17:00", "reason": "r"})
    }

    #[tokio::test]
    async fn test_refresh_sorts_ascending_by_date() {
        let backend = Arc::new(MemoryBackingStore::with_rows(vec![
            row(3, "C", "2024-05-09"),
            row(1, "A", "2024-05-01"),
            row(2, "B", "2024-05-09"),
        ]));
        let store = RequestStore::new(backend);

        assert_eq!(store.refresh().await, RefreshOutcome::Replaced(3));
        let ids: Vec<i64> = store.snapshot().iter().map(|r| r.id.0).collect();
        assert_eq!(ids, vec![1, 3, 2], "ties keep fetch order");
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_previous_snapshot() {
        let backend = Arc::new(MemoryBackingStore::with_rows(vec![row(1, "A", "2024-05-01")]));
        let store = RequestStore::new(backend.clone());
        store.refresh().await;

        backend.fail_reads.store(true, Ordering::SeqCst);
        assert_eq!(store.refresh().await, RefreshOutcome::Retained);
        assert_eq!(store.snapshot().len(), 1);
        assert_eq!(store.snapshot()[0].id, RequestId(1));
    }

    #[tokio::test]
    async fn test_non_array_payload_empties_snapshot() {
        let backend = Arc::new(MemoryBackingStore::with_rows(vec![row(1, "A", "2024-05-01")]));
        let store = RequestStore::new(backend.clone());
        store.refresh().await;

        backend.non_array.store(true, Ordering::SeqCst);
        assert_eq!(store.refresh().await, RefreshOutcome::Replaced(0));
        assert!(store.snapshot().is_empty());
    }

    #[tokio::test]
    async fn test_bad_rows_are_skipped() {
        let backend = Arc::new(MemoryBackingStore::with_rows(vec![
            row(1, "A", "2024-05-01"),
            json!({"no": 2, "name": "B", "date": ""}),
            json!("header row"),
        ]));
        let store = RequestStore::new(backend);
        assert_eq!(store.refresh().await, RefreshOutcome::Replaced(1));
        assert_eq!(store.snapshot()[0].status, RequestStatus::Pending);
    }

    #[tokio::test]
    async fn test_subscribers_see_replacement_and_old_snapshot_is_stable() {
        let backend = Arc::new(MemoryBackingStore::with_rows(vec![row(1, "A", "2024-05-01")]));
        let store = RequestStore::new(backend.clone());
        let mut rx = store.subscribe();

        let before = store.snapshot();
        store.refresh().await;
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().len(), 1);
        assert!(before.is_empty(), "a handed-out snapshot never changes");

        // Refreshing twice with the same data is harmless.
        store.refresh().await;
        assert_eq!(store.snapshot().len(), 1);
    }
}

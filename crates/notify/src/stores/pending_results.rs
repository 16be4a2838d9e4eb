//! Holding area for results nobody was listening for.
//!
//! Entries are written through the `KeyValueStore` port as JSON under
//! `pending_result:<request_id>`. An in-memory index of arrival times drives
//! the size cap and the expiry sweep; it is rebuilt from storage by
//! `restore()` after a restart.
//!
//! Every operation holds the index lock for its whole read-modify-write, so
//! a claim can never hand the same result to two callers.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use lookbook_domain::{OperationOutcome, PendingResult, RequestId};
use tokio::sync::Mutex;

use crate::infrastructure::ports::{ClockPort, KeyValueStore, StorageError};

/// Storage key prefix for pending results.
pub const PENDING_KEY_PREFIX: &str = "pending_result:";

/// Expiry and size bounds for unclaimed results.
#[derive(Debug, Clone, Copy)]
pub struct PendingPolicy {
    pub ttl: chrono::Duration,
    pub max_entries: usize,
}

impl PendingPolicy {
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            // Out-of-range TTLs are effectively "never expire".
            ttl: chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::days(36_500)),
            max_entries: max_entries.max(1),
        }
    }
}

/// Unclaimed results keyed by request id. Last write wins.
pub struct PendingResultStore {
    storage: Arc<dyn KeyValueStore>,
    clock: Arc<dyn ClockPort>,
    policy: PendingPolicy,
    index: Mutex<HashMap<RequestId, IndexEntry>>,
    /// Insertion order, breaks ties between equal arrival times.
    sequence: AtomicU64,
}

#[derive(Debug, Clone, Copy)]
struct IndexEntry {
    arrived_at: DateTime<Utc>,
    seq: u64,
}

fn storage_key(request_id: &RequestId) -> String {
    format!("{}{}", PENDING_KEY_PREFIX, request_id)
}

impl PendingResultStore {
    pub fn new(
        storage: Arc<dyn KeyValueStore>,
        clock: Arc<dyn ClockPort>,
        policy: PendingPolicy,
    ) -> Self {
        Self {
            storage,
            clock,
            policy,
            index: Mutex::new(HashMap::new()),
            sequence: AtomicU64::new(0),
        }
    }

    fn entry(&self, arrived_at: DateTime<Utc>) -> IndexEntry {
        IndexEntry {
            arrived_at,
            seq: self.sequence.fetch_add(1, Ordering::Relaxed),
        }
    }

    /// Store `outcome` for later claim, replacing any earlier result for the
    /// same request. Returns `true` when an earlier result was superseded.
    pub async fn put(
        &self,
        request_id: &RequestId,
        outcome: OperationOutcome,
    ) -> Result<bool, StorageError> {
        let mut index = self.index.lock().await;
        let now = self.clock.now();
        let pending = PendingResult::new(request_id.clone(), outcome, now);
        let json = serde_json::to_string(&pending).map_err(StorageError::serialization)?;

        self.storage.set(&storage_key(request_id), &json).await?;
        let superseded = index.insert(request_id.clone(), self.entry(now)).is_some();
        if superseded {
            tracing::debug!(request_id = %request_id, "Pending result superseded");
        }

        while index.len() > self.policy.max_entries {
            // The result just written is never the one evicted.
            let Some(oldest) = index
                .iter()
                .filter(|(id, _)| *id != request_id)
                .min_by_key(|(_, entry)| (entry.arrived_at, entry.seq))
                .map(|(id, _)| id.clone())
            else {
                break;
            };
            index.remove(&oldest);
            if let Err(e) = self.storage.delete(&storage_key(&oldest)).await {
                tracing::error!(request_id = %oldest, error = %e, "Failed to delete evicted pending result");
            }
            tracing::warn!(
                request_id = %oldest,
                max_entries = self.policy.max_entries,
                "Evicted oldest pending result, store at capacity"
            );
        }

        Ok(superseded)
    }

    /// Atomically read and remove the result for `request_id`.
    ///
    /// Expired or unreadable entries are removed and reported as absent.
    pub async fn claim(
        &self,
        request_id: &RequestId,
    ) -> Result<Option<OperationOutcome>, StorageError> {
        let mut index = self.index.lock().await;
        let key = storage_key(request_id);

        let Some(raw) = self.storage.get(&key).await? else {
            index.remove(request_id);
            return Ok(None);
        };
        self.storage.delete(&key).await?;
        index.remove(request_id);

        let Some(pending) = self.decode(request_id, &raw) else {
            return Ok(None);
        };
        tracing::info!(request_id = %request_id, "Pending result claimed");
        Ok(Some(pending.outcome))
    }

    /// Whether a live (unexpired) result is waiting for `request_id`.
    pub async fn contains(&self, request_id: &RequestId) -> Result<bool, StorageError> {
        let mut index = self.index.lock().await;
        let key = storage_key(request_id);

        let Some(raw) = self.storage.get(&key).await? else {
            return Ok(false);
        };
        if self.decode(request_id, &raw).is_some() {
            return Ok(true);
        }

        self.storage.delete(&key).await?;
        index.remove(request_id);
        Ok(false)
    }

    /// Remove every expired entry. Returns how many were dropped.
    pub async fn purge_expired(&self) -> Result<usize, StorageError> {
        let mut index = self.index.lock().await;
        let now = self.clock.now();
        let expired: Vec<RequestId> = index
            .iter()
            .filter(|(_, entry)| now - entry.arrived_at >= self.policy.ttl)
            .map(|(id, _)| id.clone())
            .collect();

        for request_id in &expired {
            self.storage.delete(&storage_key(request_id)).await?;
            index.remove(request_id);
            tracing::info!(request_id = %request_id, "Expired pending result purged");
        }
        Ok(expired.len())
    }

    /// Rebuild the index from storage, dropping expired or corrupt entries.
    /// Returns how many results are claimable afterwards.
    pub async fn restore(&self) -> Result<usize, StorageError> {
        let mut index = self.index.lock().await;
        index.clear();

        for key in self.storage.keys(PENDING_KEY_PREFIX).await? {
            let Some(raw) = self.storage.get(&key).await? else {
                continue;
            };
            match serde_json::from_str::<PendingResult>(&raw) {
                Ok(pending) if !pending.is_expired(self.clock.now(), self.policy.ttl) => {
                    index.insert(pending.request_id, self.entry(pending.arrived_at));
                }
                Ok(pending) => {
                    tracing::info!(request_id = %pending.request_id, "Dropping expired pending result on restore");
                    self.storage.delete(&key).await?;
                }
                Err(e) => {
                    tracing::warn!(key = %key, error = %e, "Dropping unreadable pending result on restore");
                    self.storage.delete(&key).await?;
                }
            }
        }

        tracing::debug!(count = index.len(), "Pending results restored");
        Ok(index.len())
    }

    /// Drop every pending result. Returns how many were removed.
    pub async fn clear(&self) -> Result<usize, StorageError> {
        let mut index = self.index.lock().await;
        let keys = self.storage.keys(PENDING_KEY_PREFIX).await?;
        for key in &keys {
            self.storage.delete(key).await?;
        }
        index.clear();
        Ok(keys.len())
    }

    pub async fn len(&self) -> usize {
        self.index.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.index.lock().await.is_empty()
    }

    /// Parse a stored entry, returning `None` for corrupt or expired ones.
    fn decode(&self, request_id: &RequestId, raw: &str) -> Option<PendingResult> {
        let pending = match serde_json::from_str::<PendingResult>(raw) {
            Ok(pending) => pending,
            Err(e) => {
                tracing::warn!(request_id = %request_id, error = %e, "Discarding unreadable pending result");
                return None;
            }
        };
        if pending.is_expired(self.clock.now(), self.policy.ttl) {
            tracing::info!(
                request_id = %request_id,
                arrived_at = %pending.arrived_at,
                "Pending result expired before claim"
            );
            return None;
        }
        Some(pending)
    }
}

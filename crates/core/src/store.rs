//! Job record store.
//!
//! [`JobStore`] is the seam between the orchestrator and wherever records
//! live. [`MemoryJobStore`] keeps them in process memory; records are never
//! evicted, so the map grows for the lifetime of the process.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::CoreError;
use crate::job::{JobRecord, JobState, JobStatus};
use crate::types::JobId;

#[async_trait]
pub trait JobStore: Send + Sync {
    /// Snapshot of a record, or `None` for an unknown id.
    async fn get(&self, id: &JobId) -> Option<JobRecord>;

    /// Insert or replace a record wholesale.
    async fn put(&self, record: JobRecord);

    /// Replace the state of `id` with `next` if its current status equals
    /// `expected`.
    ///
    /// Returns `Ok(false)` when the status differs, or when `next` would move
    /// the record backwards in the lifecycle. Terminal records never change.
    async fn compare_and_swap_status(
        &self,
        id: &JobId,
        expected: JobStatus,
        next: JobState,
    ) -> Result<bool, CoreError>;

    /// Number of records held.
    async fn len(&self) -> usize;
}

/// In-memory [`JobStore`] behind a `tokio` `RwLock`.
///
/// Readers receive clones taken under the lock, so a record is never seen
/// half-written.
#[derive(Default)]
pub struct MemoryJobStore {
    records: RwLock<HashMap<JobId, JobRecord>>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn get(&self, id: &JobId) -> Option<JobRecord> {
        self.records.read().await.get(id).cloned()
    }

    async fn put(&self, record: JobRecord) {
        self.records
            .write()
            .await
            .insert(record.id.clone(), record);
    }

    async fn compare_and_swap_status(
        &self,
        id: &JobId,
        expected: JobStatus,
        next: JobState,
    ) -> Result<bool, CoreError> {
        let mut records = self.records.write().await;
        let record = records
            .get_mut(id)
            .ok_or_else(|| CoreError::job_not_found(id))?;

        let current = record.status();
        if current != expected || current.is_terminal() {
            return Ok(false);
        }
        if next.status().rank() < current.rank() {
            return Ok(false);
        }

        record.state = next;
        record.updated_at = chrono::Utc::now();
        Ok(true)
    }

    async fn len(&self) -> usize {
        self.records.read().await.len()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

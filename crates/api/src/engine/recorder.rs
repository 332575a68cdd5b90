//! Single writer of job records after submission.
//!
//! Consumes [`JobEvent`]s from every background task and applies them to the
//! store with compare-and-swap. Progress is clamped to `[last, 100]` and
//! dropped for records no longer in `processing`.

use std::sync::Arc;

use docdesk_core::job::{JobState, JobStatus};
use docdesk_core::progress::{EventReceiver, JobEvent, JobOutcome};
use docdesk_core::store::JobStore;
use docdesk_core::types::JobId;
use tokio::task::JoinHandle;

/// Applies lifecycle events to the record store.
pub struct Recorder {
    store: Arc<dyn JobStore>,
}

impl Recorder {
    pub fn new(store: Arc<dyn JobStore>) -> Self {
        Self { store }
    }

    /// Spawn the recorder loop. It ends once every event sender is dropped.
    pub fn spawn(self, events: EventReceiver) -> JoinHandle<()> {
        tokio::spawn(self.run(events))
    }

    pub async fn run(self, mut events: EventReceiver) {
        tracing::debug!("Job recorder started");
        while let Some(event) = events.recv().await {
            self.apply(event).await;
        }
        tracing::debug!("Job recorder stopped, all senders dropped");
    }

    /// Apply one event.
    pub async fn apply(&self, event: JobEvent) {
        match event {
            JobEvent::Started { id } => {
                self.swap(&id, JobStatus::Uploading, JobState::Processing { pct: 0 })
                    .await;
            }

            JobEvent::Progress { id, pct } => {
                let Some(record) = self.store.get(&id).await else {
                    return;
                };
                let JobState::Processing { pct: last } = record.state else {
                    tracing::debug!(
                        job_id = %id,
                        pct,
                        status = %record.status(),
                        "Progress ignored"
                    );
                    return;
                };
                let next = pct.clamp(last, 100);
                if next != last {
                    self.swap(&id, JobStatus::Processing, JobState::Processing { pct: next })
                        .await;
                }
            }

            JobEvent::Finished { id, outcome } => {
                let next = match outcome {
                    JobOutcome::Succeeded(output) => JobState::Done {
                        artifact: output.artifact,
                        warnings: output.warnings,
                    },
                    JobOutcome::Failed(message) => JobState::Error { message },
                };
                let status = next.status();
                if self.swap(&id, JobStatus::Processing, next).await {
                    tracing::info!(job_id = %id, status = %status, "Job finished");
                }
            }
        }
    }

    /// Compare-and-swap, logging when the transition does not apply.
    async fn swap(&self, id: &JobId, expected: JobStatus, next: JobState) -> bool {
        match self.store.compare_and_swap_status(id, expected, next).await {
            Ok(true) => true,
            Ok(false) => {
                tracing::warn!(job_id = %id, expected = %expected, "Stale job transition skipped");
                false
            }
            Err(e) => {
                tracing::warn!(job_id = %id, error = %e, "Job transition failed");
                false
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

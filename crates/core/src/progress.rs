//! Job lifecycle events and the progress sink handed to job bodies.
//!
//! Background tasks never touch the record store. They emit [`JobEvent`]s on
//! an unbounded channel; a single recorder task consumes them and performs
//! every write after submission.

use tokio::sync::mpsc;

use crate::body::JobOutput;
use crate::types::JobId;

/// Sender half of the lifecycle event channel.
pub type EventSender = mpsc::UnboundedSender<JobEvent>;

/// Receiver half of the lifecycle event channel.
pub type EventReceiver = mpsc::UnboundedReceiver<JobEvent>;

/// A lifecycle event emitted by a job's background task.
#[derive(Debug)]
pub enum JobEvent {
    /// The body is about to be invoked.
    Started { id: JobId },
    /// The body reported a percentage.
    Progress { id: JobId, pct: u8 },
    /// The body returned or failed.
    Finished { id: JobId, outcome: JobOutcome },
}

/// Final result of a job body run.
#[derive(Debug)]
pub enum JobOutcome {
    Succeeded(JobOutput),
    /// The failure message, captured verbatim.
    Failed(String),
}

/// Create a lifecycle event channel.
pub fn event_channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}

/// Percentage sink bound to one job.
///
/// Cheap to clone so it can move into blocking sections. Reports are
/// forwarded as-is; clamping happens where they are recorded. A sink that
/// outlives its job is harmless: its reports are ignored once the record is
/// terminal.
#[derive(Debug, Clone)]
pub struct ProgressSink {
    id: JobId,
    events: EventSender,
}

impl ProgressSink {
    pub fn new(id: JobId, events: EventSender) -> Self {
        Self { id, events }
    }

    pub fn job_id(&self) -> &JobId {
        &self.id
    }

    /// Publish a percentage. Values above 100 are capped.
    pub fn report(&self, pct: u32) {
        let pct = pct.min(100) as u8;
        if self
            .events
            .send(JobEvent::Progress {
                id: self.id.clone(),
                pct,
            })
            .is_err()
        {
            tracing::debug!(job_id = %self.id, pct, "Progress dropped, recorder gone");
        }
    }

    /// Report `done` out of `total` steps, truncated like an integer
    /// percentage. A zero total counts as complete.
    pub fn report_step(&self, done: usize, total: usize) {
        self.report(percent(done, total));
    }
}

/// `done / total * 100`, truncated.
pub fn percent(done: usize, total: usize) -> u32 {
    if total == 0 {
        return 100;
    }
    ((done.min(total) * 100) / total) as u32
}

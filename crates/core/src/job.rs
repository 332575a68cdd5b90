//! Job record model and lifecycle state machine.
//!
//! A job moves `uploading -> processing -> {done | partial | error}` and never
//! back. [`JobState`] is a tagged union so a record cannot carry both a result
//! and an error; `partial` is a [`JobState::Done`] with non-empty warnings.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::{JobId, Timestamp};

// ---------------------------------------------------------------------------
// Kind
// ---------------------------------------------------------------------------

/// Category of background work; selects which job body runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobKind {
    Merge,
    Extract,
    Harvest,
}

/// What happens to a job's workspace once its body returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkspacePolicy {
    /// Inputs are transient; the workspace is removed right after the run,
    /// whatever the outcome. The artifact lives in the output directory.
    DisposeAfterRun,
    /// The artifact is written inside the workspace, which therefore stays
    /// until the artifact has been delivered.
    KeepUntilDelivered,
}

impl JobKind {
    pub const ALL: [JobKind; 3] = [JobKind::Merge, JobKind::Extract, JobKind::Harvest];

    pub fn as_str(self) -> &'static str {
        match self {
            JobKind::Merge => "merge",
            JobKind::Extract => "extract",
            JobKind::Harvest => "harvest",
        }
    }

    /// Whether a submission of this kind must carry at least one file.
    pub fn consumes_uploads(self) -> bool {
        match self {
            JobKind::Merge | JobKind::Extract => true,
            JobKind::Harvest => false,
        }
    }

    pub fn workspace_policy(self) -> WorkspacePolicy {
        match self {
            JobKind::Merge => WorkspacePolicy::DisposeAfterRun,
            JobKind::Extract | JobKind::Harvest => WorkspacePolicy::KeepUntilDelivered,
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        JobKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| {
                CoreError::Validation(format!(
                    "Unknown job kind '{s}'. Valid kinds: merge, extract, harvest"
                ))
            })
    }
}

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Externally visible job status, derived from [`JobState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Uploading,
    Processing,
    Done,
    Partial,
    Error,
}

impl JobStatus {
    /// Position in the lifecycle. Terminal statuses share the top rank.
    pub fn rank(self) -> u8 {
        match self {
            JobStatus::Uploading => 0,
            JobStatus::Processing => 1,
            JobStatus::Done | JobStatus::Partial | JobStatus::Error => 2,
        }
    }

    pub fn is_terminal(self) -> bool {
        self.rank() == 2
    }

    /// `done` or `partial`: the job produced a downloadable artifact.
    pub fn is_success(self) -> bool {
        matches!(self, JobStatus::Done | JobStatus::Partial)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Uploading => "uploading",
            JobStatus::Processing => "processing",
            JobStatus::Done => "done",
            JobStatus::Partial => "partial",
            JobStatus::Error => "error",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// Status-specific payload of a job record.
#[derive(Debug, Clone, PartialEq)]
pub enum JobState {
    Uploading,
    Processing {
        pct: u8,
    },
    Done {
        artifact: PathBuf,
        warnings: Vec<String>,
    },
    Error {
        message: String,
    },
}

impl JobState {
    pub fn status(&self) -> JobStatus {
        match self {
            JobState::Uploading => JobStatus::Uploading,
            JobState::Processing { .. } => JobStatus::Processing,
            JobState::Done { warnings, .. } if warnings.is_empty() => JobStatus::Done,
            JobState::Done { .. } => JobStatus::Partial,
            JobState::Error { .. } => JobStatus::Error,
        }
    }

    /// Progress percentage; `None` for error records, which carry no
    /// progress at all.
    pub fn pct(&self) -> Option<u8> {
        match self {
            JobState::Uploading => Some(0),
            JobState::Processing { pct } => Some(*pct),
            JobState::Done { .. } => Some(100),
            JobState::Error { .. } => None,
        }
    }

    pub fn artifact(&self) -> Option<&Path> {
        match self {
            JobState::Done { artifact, .. } => Some(artifact),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Record
// ---------------------------------------------------------------------------

/// One submitted job.
#[derive(Debug, Clone)]
pub struct JobRecord {
    pub id: JobId,
    pub kind: JobKind,
    /// Workspace directory holding the job's inputs. Never exposed over HTTP.
    pub workspace: PathBuf,
    pub state: JobState,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl JobRecord {
    /// A freshly issued record in `uploading`.
    pub fn new(id: JobId, kind: JobKind, workspace: PathBuf) -> Self {
        let now = chrono::Utc::now();
        Self {
            id,
            kind,
            workspace,
            state: JobState::Uploading,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn status(&self) -> JobStatus {
        self.state.status()
    }

    /// Wire representation served by the progress endpoint.
    pub fn snapshot(&self) -> JobSnapshot {
        let mut snapshot = JobSnapshot {
            task_id: self.id.clone(),
            kind: self.kind,
            status: self.status(),
            pct: self.state.pct(),
            file: None,
            warnings: None,
            unpaired: None,
            error: None,
        };

        match &self.state {
            JobState::Done { artifact, warnings } => {
                snapshot.file = artifact
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned());
                if !warnings.is_empty() {
                    snapshot.warnings = Some(warnings.clone());
                }
                // The browser client reads merge leftovers under this name.
                if self.kind == JobKind::Merge {
                    snapshot.unpaired = Some(warnings.clone());
                }
            }
            JobState::Error { message } => snapshot.error = Some(message.clone()),
            JobState::Uploading | JobState::Processing { .. } => {}
        }

        snapshot
    }
}

/// Serializable view of a [`JobRecord`].
#[derive(Debug, Clone, Serialize)]
pub struct JobSnapshot {
    pub task_id: JobId,
    #[serde(rename = "type")]
    pub kind: JobKind,
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pct: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unpaired: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

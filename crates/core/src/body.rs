//! Contract between the orchestrator and the domain-specific job bodies.
//!
//! A body receives its workspace, the directory it must write its artifact
//! into, typed parameters and a progress sink. It returns the artifact path
//! plus warnings, or a [`JobError`] whose message is recorded verbatim.

use std::path::PathBuf;

use async_trait::async_trait;

use crate::error::CoreError;
use crate::job::JobKind;
use crate::params::JobParams;
use crate::progress::ProgressSink;
use crate::types::JobId;

/// Everything a body needs for one run.
#[derive(Debug)]
pub struct JobContext {
    pub id: JobId,
    /// Directory holding the uploaded inputs.
    pub work_dir: PathBuf,
    /// Directory the artifact must be written to. Equal to `work_dir` for
    /// kinds that keep their workspace until delivery.
    pub artifact_dir: PathBuf,
    pub params: JobParams,
    pub progress: ProgressSink,
}

/// Successful result of a body run.
#[derive(Debug, Clone, PartialEq)]
pub struct JobOutput {
    pub artifact: PathBuf,
    /// Non-empty means partial success.
    pub warnings: Vec<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("{0}")]
    Failed(String),

    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("{kind} job received parameters for another kind")]
    WrongParams { kind: JobKind },

    #[error("job task aborted: {0}")]
    Aborted(String),
}

impl From<tokio::task::JoinError> for JobError {
    fn from(err: tokio::task::JoinError) -> Self {
        JobError::Aborted(err.to_string())
    }
}

/// A domain-specific job implementation.
#[async_trait]
pub trait JobBody: Send + Sync {
    fn kind(&self) -> JobKind;

    /// Kind-specific parameter checks beyond parsing, run at submission.
    fn validate(&self, _params: &JobParams) -> Result<(), CoreError> {
        Ok(())
    }

    async fn run(&self, ctx: JobContext) -> Result<JobOutput, JobError>;
}

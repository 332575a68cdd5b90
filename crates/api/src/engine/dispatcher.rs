//! Job submission, background execution and result lookup.
//!
//! [`Orchestrator::submit`] registers a record, persists the uploads and
//! spawns one task per job, returning before the job body runs. The task
//! reports through the event channel only; the [`Recorder`] performs every
//! record write after submission.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;

use axum::body::Bytes;
use docdesk_core::body::{JobBody, JobContext};
use docdesk_core::error::CoreError;
use docdesk_core::job::{JobKind, JobRecord, JobSnapshot, JobState, JobStatus, WorkspacePolicy};
use docdesk_core::params::{JobParams, ParamDefaults};
use docdesk_core::progress::{event_channel, EventSender, JobEvent, JobOutcome, ProgressSink};
use docdesk_core::store::JobStore;
use docdesk_core::types::JobId;
use docdesk_core::workspace::{self, sanitize_relative_path, Workspace};
use docdesk_pipeline::JobBodies;
use futures::FutureExt;
use tokio::task::JoinHandle;

use super::delivery::{ArtifactGuard, Delivery};
use super::recorder::Recorder;

/// One uploaded file: its relative name and contents.
#[derive(Debug, Clone)]
pub struct Upload {
    pub name: String,
    pub data: Bytes,
}

/// Filesystem locations and parameter defaults.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Parent of the per-job workspaces.
    pub work_root: PathBuf,
    /// Artifact directory for kinds that dispose their workspace after the run.
    pub output_dir: PathBuf,
    pub param_defaults: ParamDefaults,
}

/// Owns the record store, the job bodies and the event channel.
pub struct Orchestrator {
    store: Arc<dyn JobStore>,
    bodies: JobBodies,
    events: EventSender,
    config: OrchestratorConfig,
}

impl Orchestrator {
    /// Create the orchestrator and spawn its recorder task.
    ///
    /// Must be called inside a Tokio runtime.
    pub fn start(
        store: Arc<dyn JobStore>,
        bodies: JobBodies,
        config: OrchestratorConfig,
    ) -> (Self, JoinHandle<()>) {
        let (events, receiver) = event_channel();
        let recorder = Recorder::new(Arc::clone(&store)).spawn(receiver);
        let orchestrator = Self {
            store,
            bodies,
            events,
            config,
        };
        (orchestrator, recorder)
    }

    /// Register a job and start it in the background.
    ///
    /// Fails with `Validation` for bad parameters, bad upload names or a
    /// missing upload, before any record exists. Fails with `Internal` if the
    /// workspace cannot be created or an upload cannot be written; in the
    /// latter case the record is left in `error`.
    pub async fn submit(
        &self,
        kind: JobKind,
        uploads: Vec<Upload>,
        fields: &HashMap<String, String>,
    ) -> Result<JobId, CoreError> {
        let body = self
            .bodies
            .get(kind)
            .ok_or_else(|| CoreError::Validation(format!("Job kind '{kind}' is not available")))?;

        let params = JobParams::parse(kind, fields, &self.config.param_defaults)?;
        body.validate(&params)?;

        let uploads = if kind.consumes_uploads() {
            let mut kept = Vec::with_capacity(uploads.len());
            for upload in uploads {
                if sanitize_relative_path(&upload.name)?.is_some() {
                    kept.push(upload);
                }
            }
            if kept.is_empty() {
                return Err(CoreError::Validation("No files received".to_string()));
            }
            kept
        } else {
            if !uploads.is_empty() {
                tracing::debug!(
                    kind = %kind,
                    count = uploads.len(),
                    "Ignoring uploads for job kind without inputs"
                );
            }
            Vec::new()
        };

        let id = JobId::new();
        let workspace = Workspace::create(&self.config.work_root, kind, &id).await?;
        self.store
            .put(JobRecord::new(id.clone(), kind, workspace.path().to_path_buf()))
            .await;

        for upload in &uploads {
            if let Err(e) = workspace.save(&upload.name, &upload.data).await {
                tracing::error!(job_id = %id, error = %e, "Failed to persist upload");
                let _ = self
                    .store
                    .compare_and_swap_status(
                        &id,
                        JobStatus::Uploading,
                        JobState::Error {
                            message: e.to_string(),
                        },
                    )
                    .await;
                workspace.dispose().await;
                return Err(CoreError::Internal(e.to_string()));
            }
        }

        let artifact_dir = match kind.workspace_policy() {
            WorkspacePolicy::DisposeAfterRun => self.config.output_dir.clone(),
            WorkspacePolicy::KeepUntilDelivered => workspace.path().to_path_buf(),
        };
        let ctx = JobContext {
            id: id.clone(),
            work_dir: workspace.into_path(),
            artifact_dir,
            params,
            progress: ProgressSink::new(id.clone(), self.events.clone()),
        };

        tracing::info!(job_id = %id, kind = %kind, files = uploads.len(), "Job submitted");
        tokio::spawn(execute(body, ctx, self.events.clone()));

        Ok(id)
    }

    /// Current snapshot of a job.
    pub async fn progress(&self, id: &JobId) -> Result<JobSnapshot, CoreError> {
        self.store
            .get(id)
            .await
            .map(|record| record.snapshot())
            .ok_or_else(|| CoreError::job_not_found(id))
    }

    /// Open a finished job's artifact for one-time delivery.
    pub async fn fetch(&self, id: &JobId) -> Result<Delivery, CoreError> {
        let record = self
            .store
            .get(id)
            .await
            .ok_or_else(|| CoreError::job_not_found(id))?;

        let artifact = match &record.state {
            JobState::Done { artifact, .. } => artifact.clone(),
            _ => return Err(CoreError::NotReady("not ready".to_string())),
        };

        let file = match tokio::fs::File::open(&artifact).await {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(CoreError::Gone("file missing".to_string()));
            }
            Err(e) => return Err(CoreError::Internal(format!("Failed to open artifact: {e}"))),
        };
        let len = file
            .metadata()
            .await
            .map_err(|e| CoreError::Internal(format!("Failed to stat artifact: {e}")))?
            .len();

        let workspace = match record.kind.workspace_policy() {
            WorkspacePolicy::KeepUntilDelivered => Some(record.workspace),
            WorkspacePolicy::DisposeAfterRun => None,
        };
        Ok(Delivery::new(
            file,
            len,
            ArtifactGuard::new(record.id, artifact, workspace),
        ))
    }

    /// Number of records held.
    pub async fn job_count(&self) -> usize {
        self.store.len().await
    }
}

/// Background task for one job.
async fn execute(body: Arc<dyn JobBody>, ctx: JobContext, events: EventSender) {
    let id = ctx.id.clone();
    let kind = body.kind();
    let work_dir = ctx.work_dir.clone();
    let progress = ctx.progress.clone();

    let _ = events.send(JobEvent::Started { id: id.clone() });

    if kind.workspace_policy() == WorkspacePolicy::DisposeAfterRun {
        if let Err(e) = tokio::fs::create_dir_all(&ctx.artifact_dir).await {
            tracing::warn!(job_id = %id, error = %e, "Failed to create output directory");
        }
    }

    let outcome = match AssertUnwindSafe(body.run(ctx)).catch_unwind().await {
        Ok(Ok(output)) => {
            progress.report(100);
            tracing::info!(
                job_id = %id,
                kind = %kind,
                warnings = output.warnings.len(),
                "Job body succeeded"
            );
            JobOutcome::Succeeded(output)
        }
        Ok(Err(e)) => {
            tracing::warn!(job_id = %id, kind = %kind, error = %e, "Job body failed");
            JobOutcome::Failed(e.to_string())
        }
        Err(panic) => {
            let message = panic_message(panic.as_ref());
            tracing::error!(job_id = %id, kind = %kind, error = %message, "Job body panicked");
            JobOutcome::Failed(message)
        }
    };

    // Nothing will be delivered from a failed job, so its workspace goes too.
    let dispose = matches!(outcome, JobOutcome::Failed(_))
        || kind.workspace_policy() == WorkspacePolicy::DisposeAfterRun;

    let _ = events.send(JobEvent::Finished { id, outcome });

    if dispose {
        workspace::remove_dir(&work_dir).await;
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "job body panicked".to_string()
    }
}

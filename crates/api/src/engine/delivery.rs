//! One-shot artifact delivery.
//!
//! A [`Delivery`] owns the opened artifact and an [`ArtifactGuard`]. The
//! guard travels with the response body stream; when the stream is dropped,
//! whether fully sent or cut off, the artifact is deleted, together with
//! the workspace for kinds that keep one until delivery.

use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::task::{Context, Poll};

use axum::body::Bytes;
use docdesk_core::types::JobId;
use futures::Stream;
use tokio::fs::File;
use tokio_util::io::ReaderStream;

/// Deletes an artifact, and optionally its workspace, on drop.
#[derive(Debug)]
pub struct ArtifactGuard {
    job_id: JobId,
    artifact: PathBuf,
    workspace: Option<PathBuf>,
}

impl ArtifactGuard {
    pub fn new(job_id: JobId, artifact: PathBuf, workspace: Option<PathBuf>) -> Self {
        Self {
            job_id,
            artifact,
            workspace,
        }
    }
}

impl Drop for ArtifactGuard {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.artifact) {
            Ok(()) => {
                tracing::info!(
                    job_id = %self.job_id,
                    artifact = %self.artifact.display(),
                    "Artifact delivered and removed"
                );
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(
                    job_id = %self.job_id,
                    error = %e,
                    "Failed to remove delivered artifact"
                );
            }
        }

        if let Some(workspace) = self.workspace.take() {
            match tokio::runtime::Handle::try_current() {
                Ok(handle) => {
                    handle.spawn(async move {
                        docdesk_core::workspace::remove_dir(&workspace).await;
                    });
                }
                Err(_) => {
                    if let Err(e) = std::fs::remove_dir_all(&workspace) {
                        if e.kind() != io::ErrorKind::NotFound {
                            tracing::warn!(
                                path = %workspace.display(),
                                error = %e,
                                "Failed to remove workspace"
                            );
                        }
                    }
                }
            }
        }
    }
}

/// An opened artifact, ready to stream.
#[derive(Debug)]
pub struct Delivery {
    file_name: String,
    len: u64,
    file: File,
    guard: ArtifactGuard,
}

impl Delivery {
    pub fn new(file: File, len: u64, guard: ArtifactGuard) -> Self {
        let file_name = file_name_of(&guard.artifact);
        Self {
            file_name,
            len,
            file,
            guard,
        }
    }

    /// Name the client should save the file under.
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Size in bytes.
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Byte stream of the artifact. Dropping it triggers cleanup.
    pub fn into_stream(self) -> DeliveryStream {
        DeliveryStream {
            inner: ReaderStream::new(self.file),
            _guard: self.guard,
        }
    }
}

/// Artifact byte stream holding the cleanup guard.
pub struct DeliveryStream {
    inner: ReaderStream<File>,
    _guard: ArtifactGuard,
}

impl Stream for DeliveryStream {
    type Item = io::Result<Bytes>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "download".to_string())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

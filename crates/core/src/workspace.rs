//! Per-job workspace directories.
//!
//! Each job gets `<root>/<kind>_<id>`, created exclusively so no two jobs can
//! share a path. Uploaded files keep their relative paths inside it.

use std::path::{Component, Path, PathBuf};

use crate::error::CoreError;
use crate::job::JobKind;
use crate::types::JobId;

/// Maximum directory depth accepted in an upload's relative path.
pub const MAX_UPLOAD_DEPTH: usize = 16;

/// Exclusively owned job directory.
#[derive(Debug)]
pub struct Workspace {
    path: PathBuf,
}

impl Workspace {
    /// Directory a job of `kind` with `id` uses under `root`.
    pub fn path_for(root: &Path, kind: JobKind, id: &JobId) -> PathBuf {
        root.join(format!("{kind}_{id}"))
    }

    /// Create the workspace. Fails if the directory already exists.
    pub async fn create(root: &Path, kind: JobKind, id: &JobId) -> Result<Self, CoreError> {
        tokio::fs::create_dir_all(root)
            .await
            .map_err(|e| CoreError::Internal(format!("Failed to create work root: {e}")))?;

        let path = Self::path_for(root, kind, id);
        tokio::fs::create_dir(&path)
            .await
            .map_err(|e| CoreError::Internal(format!("Failed to create workspace: {e}")))?;

        tracing::debug!(job_id = %id, path = %path.display(), "Workspace created");
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Persist one uploaded file under its relative name.
    ///
    /// Returns `Ok(None)` for hidden/system files, which are skipped.
    pub async fn save(&self, name: &str, data: &[u8]) -> Result<Option<PathBuf>, CoreError> {
        let Some(relative) = sanitize_relative_path(name)? else {
            return Ok(None);
        };

        let dest = self.path.join(relative);
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                CoreError::Internal(format!("Failed to create {}: {e}", parent.display()))
            })?;
        }
        tokio::fs::write(&dest, data)
            .await
            .map_err(|e| CoreError::Internal(format!("Failed to write {}: {e}", dest.display())))?;

        Ok(Some(dest))
    }

    /// Remove the workspace and everything in it.
    pub async fn dispose(self) {
        remove_dir(&self.path).await;
    }

    /// Give up ownership without deleting anything.
    pub fn into_path(self) -> PathBuf {
        self.path
    }
}

/// Remove a workspace directory, logging instead of failing.
pub async fn remove_dir(path: &Path) {
    match tokio::fs::remove_dir_all(path).await {
        Ok(()) => tracing::debug!(path = %path.display(), "Workspace removed"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(path = %path.display(), error = %e, "Failed to remove workspace"),
    }
}

/// Returns `true` if the file name represents a hidden or system file.
pub fn is_hidden_or_system(file_name: &str) -> bool {
    file_name.starts_with('.')
        || file_name == "Thumbs.db"
        || file_name == "desktop.ini"
        || file_name == ".DS_Store"
}

/// Validate an upload name and turn it into a relative path.
///
/// Browsers send folder uploads as `dir/sub/file.pdf`; backslashes are
/// treated as separators too. Absolute paths, `..` components and overly
/// deep paths are rejected. Returns `Ok(None)` when the final component is a
/// hidden or system file.
pub fn sanitize_relative_path(name: &str) -> Result<Option<PathBuf>, CoreError> {
    let normalized = name.replace('\\', "/");
    if normalized.starts_with('/') {
        return Err(CoreError::Validation(format!(
            "Upload name must be relative: '{name}'"
        )));
    }

    let mut relative = PathBuf::new();
    for component in Path::new(&normalized).components() {
        match component {
            Component::Normal(part) => relative.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(CoreError::Validation(format!(
                    "Upload name must not escape the workspace: '{name}'"
                )));
            }
        }
    }

    let depth = relative.components().count();
    if depth == 0 {
        return Err(CoreError::Validation("Upload name is empty".to_string()));
    }
    if depth > MAX_UPLOAD_DEPTH {
        return Err(CoreError::Validation(format!(
            "Upload name nests deeper than {MAX_UPLOAD_DEPTH} levels: '{name}'"
        )));
    }

    let basename = relative
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    if is_hidden_or_system(&basename) {
        return Ok(None);
    }

    Ok(Some(relative))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

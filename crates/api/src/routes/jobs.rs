//! Route definitions for job submission, progress and download.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::{downloads, jobs};
use crate::state::AppState;

/// Routes mounted at `/api`.
///
/// ```text
/// POST   /{kind}              -> submit_job        (merge | extract | harvest)
/// GET    /progress/{id}       -> get_progress
/// GET    /download/{id}       -> download_artifact
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{kind}", post(jobs::submit_job))
        .route("/progress/{id}", get(jobs::get_progress))
        .route("/download/{id}", get(downloads::download_artifact))
}

//! Handlers for job submission and progress polling.

use std::collections::HashMap;

use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::Json;
use docdesk_core::job::{JobKind, JobSnapshot};
use docdesk_core::types::JobId;
use serde::Serialize;

use crate::engine::Upload;
use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// Response to an accepted submission.
#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub task_id: JobId,
}

// ---------------------------------------------------------------------------
// Submit
// ---------------------------------------------------------------------------

/// POST /api/{kind}
///
/// Multipart body: file fields (the file name is the relative path inside
/// the uploaded folder) plus text fields carrying the job parameters.
/// Answers `202` as soon as the job is registered.
pub async fn submit_job(
    State(state): State<AppState>,
    Path(kind): Path<String>,
    mut multipart: Multipart,
) -> AppResult<(StatusCode, Json<SubmitResponse>)> {
    let kind: JobKind = kind.parse()?;

    let mut uploads = Vec::new();
    let mut fields = HashMap::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
    {
        let field_name = field.name().unwrap_or_default().to_string();

        if let Some(file_name) = field.file_name().map(str::to_string) {
            let data = field
                .bytes()
                .await
                .map_err(|e| AppError::BadRequest(e.to_string()))?;
            uploads.push(Upload {
                name: file_name,
                data,
            });
        } else {
            let value = field
                .text()
                .await
                .map_err(|e| AppError::BadRequest(e.to_string()))?;
            fields.insert(field_name, value);
        }
    }

    let task_id = state.orchestrator.submit(kind, uploads, &fields).await?;

    Ok((StatusCode::ACCEPTED, Json(SubmitResponse { task_id })))
}

// ---------------------------------------------------------------------------
// Progress
// ---------------------------------------------------------------------------

/// GET /api/progress/{id}
pub async fn get_progress(
    State(state): State<AppState>,
    Path(id): Path<JobId>,
) -> AppResult<Json<JobSnapshot>> {
    let snapshot = state.orchestrator.progress(&id).await?;
    Ok(Json(snapshot))
}

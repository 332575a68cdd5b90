//! Handler for one-time artifact download.

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::header;
use axum::response::Response;
use docdesk_core::types::JobId;

use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// GET /api/download/{id}
///
/// Streams the artifact as an attachment. The artifact is deleted once the
/// response body is dropped, so a second download answers `410`.
pub async fn download_artifact(
    State(state): State<AppState>,
    Path(id): Path<JobId>,
) -> AppResult<Response> {
    let delivery = state.orchestrator.fetch(&id).await?;

    let content_type = content_type_for(delivery.file_name());
    let disposition = format!(
        "attachment; filename=\"{}\"",
        delivery.file_name().replace(['"', '\\'], "_")
    );
    let length = delivery.len();

    Response::builder()
        .header(header::CONTENT_TYPE, content_type)
        .header(header::CONTENT_LENGTH, length.to_string())
        .header(header::CONTENT_DISPOSITION, disposition)
        .body(Body::from_stream(delivery.into_stream()))
        .map_err(|e| AppError::InternalError(e.to_string()))
}

/// Guess a MIME type from the file extension.
fn content_type_for(file_name: &str) -> &'static str {
    let ext = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "pdf" => "application/pdf",
        "txt" => "text/plain; charset=utf-8",
        "csv" => "text/csv; charset=utf-8",
        "json" => "application/json",
        _ => "application/octet-stream",
    }
}

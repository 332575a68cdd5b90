pub mod health;
pub mod jobs;

use axum::Router;

use crate::state::AppState;

/// Build the `/api` route tree.
///
/// ```text
/// /{kind}                  submit a merge, extract or harvest job
/// /progress/{id}           poll a job
/// /download/{id}           fetch a finished job's artifact, once
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new().merge(jobs::router())
}

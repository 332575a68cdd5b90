use std::sync::Arc;

use crate::config::ServerConfig;
use crate::engine::Orchestrator;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable; everything lives behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Job submission, progress and delivery.
    pub orchestrator: Arc<Orchestrator>,
}

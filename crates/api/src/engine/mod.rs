//! Job execution engine.
//!
//! The dispatcher accepts jobs and runs their bodies in background tasks,
//! the recorder applies their lifecycle events to the record store, and
//! delivery streams a finished artifact exactly once.

pub mod delivery;
pub mod dispatcher;
pub mod recorder;

pub use dispatcher::{Orchestrator, OrchestratorConfig, Upload};

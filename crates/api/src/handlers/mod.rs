//! Request handlers.
//!
//! Handlers parse the request, delegate to the [`Orchestrator`] and map
//! errors via [`AppError`].
//!
//! [`Orchestrator`]: crate::engine::Orchestrator
//! [`AppError`]: crate::error::AppError

pub mod downloads;
pub mod jobs;

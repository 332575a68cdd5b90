//! Core building blocks of the document job service.
//!
//! - [`job`]: job kinds, statuses and the record state machine.
//! - [`store`]: the injectable [`JobStore`](store::JobStore) and its
//!   in-memory implementation.
//! - [`progress`]: lifecycle events and the progress sink.
//! - [`body`]: the contract every job body implements.
//! - [`workspace`]: per-job temporary directories.

pub mod body;
pub mod error;
pub mod job;
pub mod params;
pub mod progress;
pub mod store;
pub mod types;
pub mod workspace;

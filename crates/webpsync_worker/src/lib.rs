//! Persistent synchronization worker.
//!
//! Owns the run's single database connection and serves the four
//! synchronization requests over an in-process channel: variant lookup,
//! per-item repointing, batched URL replacement, and cache invalidation.
//! One request is in flight at a time; the caller blocks on each reply.
//! Per-request failures come back as `ERROR` replies and never take the
//! worker down.

pub mod error;
pub mod metadata;
pub mod replacer;
pub mod session;
pub mod worker;

pub use error::WorkerError;
pub use replacer::ReplacementMap;
pub use session::Session;
pub use worker::{Worker, WorkerConfig, WorkerHandle};

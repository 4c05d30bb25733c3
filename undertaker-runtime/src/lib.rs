//! Container runtime access with pluggable backends
//!
//! This crate provides a trait-based abstraction over the container runtime
//! for fetching snapshots and removing what the engine selected, including
//! a Docker implementation and an in-memory one.

#![warn(missing_docs, clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(
    clippy::module_name_repetitions,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod backend;
pub mod canonical;
pub mod docker;
pub mod reaper;

pub use backend::{MemoryRuntime, RuntimeBackend};
pub use docker::DockerRuntime;
pub use reaper::{ReapFailure, ReapReport, Reaper};

// Re-export commonly used types
pub use undertaker_engine::{ClassificationResult, Snapshot};

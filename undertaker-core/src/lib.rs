//! Undertaker Core - Records, identifiers, errors and diagnostic events
//!
//! This crate provides the vocabulary shared by the classification engine,
//! the runtime backends and the command-line driver.

#![warn(missing_docs, clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod events;
pub mod types;

pub use error::{Error, Result};
pub use events::ReclaimEvent;
pub use types::{
    Candidates, ContainerId, ContainerRecord, ContainerStatus, ImageId, ImageRecord, ImageRef,
};

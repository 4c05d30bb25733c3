//! Reclamation engine
//!
//! Decides, from a snapshot of container and image records, which stopped
//! containers and which images may be removed. The engine is a pure
//! function of its inputs:
//! - [`pattern`] - regex exclude/include policies
//! - [`in_use`] - image identity resolution and the in-use set
//! - [`containers`] - exited container classification
//! - [`images`] - image classification
//! - [`classify`] - the pipeline tying the stages together

#![warn(missing_docs, clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]

pub mod classify;
pub mod containers;
pub mod images;
pub mod in_use;
pub mod pattern;

pub use classify::{ClassificationResult, ClassificationStats, Classifier, Snapshot};
pub use containers::{ContainerOutcome, ContainerToReclaim, Retention, classify_containers};
pub use images::{ImageOutcome, ImageToReclaim, classify_images};
pub use in_use::{ImageIndex, InUseSeed, InUseSet, Inconsistency, seed_in_use};
pub use pattern::{Pattern, Policies, PolicySet};

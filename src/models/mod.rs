//! Domain models for scope-watch
//!
//! This module contains the core domain models used throughout the pipeline.

pub mod cycle;
pub mod notification;
pub mod snapshot;

// Re-export commonly used types
pub use cycle::{CycleOutcome, CycleStage};
pub use notification::{ChunkSequence, NotificationMessage};
pub use snapshot::{ChangeSet, Snapshot};

//! Watcher cycle outcome model

use serde::{Deserialize, Serialize};
use std::fmt;

/// Pipeline stage a watcher cycle passes through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleStage {
    /// Fetching the current inventory
    Collecting,
    /// Building the unique item set
    Deduping,
    /// Reading the previous snapshot
    LoadingBaseline,
    /// Computing the change set
    Diffing,
    /// Publishing notifications
    Notifying,
    /// Writing the current snapshot
    Persisting,
}

impl fmt::Display for CycleStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CycleStage::Collecting => "collecting",
            CycleStage::Deduping => "deduping",
            CycleStage::LoadingBaseline => "loading_baseline",
            CycleStage::Diffing => "diffing",
            CycleStage::Notifying => "notifying",
            CycleStage::Persisting => "persisting",
        };
        f.write_str(name)
    }
}

/// How one watcher cycle ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CycleOutcome {
    /// The cycle stopped early; the stored baseline was left untouched
    Aborted {
        /// Stage that failed
        stage: CycleStage,
        /// Error message
        reason: String,
    },
    /// No baseline existed; the current set was stored without diffing
    Seeded {
        /// Unique items collected
        items: usize,
        /// Whether the snapshot write succeeded
        persisted: bool,
    },
    /// The current set was compared against the baseline
    Compared {
        /// Unique items collected
        items: usize,
        /// Items added since the baseline
        added: usize,
        /// Items removed since the baseline
        removed: usize,
        /// Whether the snapshot write succeeded
        persisted: bool,
    },
}

impl CycleOutcome {
    /// Short label used for logs and metrics
    pub fn label(&self) -> &'static str {
        match self {
            CycleOutcome::Aborted { .. } => "aborted",
            CycleOutcome::Seeded { .. } => "seeded",
            CycleOutcome::Compared { added: 0, removed: 0, .. } => "unchanged",
            CycleOutcome::Compared { .. } => "changed",
        }
    }

    /// Whether the cycle reached its end
    pub fn is_complete(&self) -> bool {
        !matches!(self, CycleOutcome::Aborted { .. })
    }
}

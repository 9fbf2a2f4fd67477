//! Pure set operations over collected items
//!
//! - [`dedupe`]: order-preserving duplicate removal
//! - [`diff`]: added/removed delta between two snapshots

mod dedupe;
mod diff;

pub use dedupe::dedupe;
pub use diff::diff;

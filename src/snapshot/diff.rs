use crate::models::{ChangeSet, Snapshot};

/// Compute the items added and removed between two snapshots.
///
/// Runs in O(|previous| + |current|). Output order follows each input
/// snapshot's item order.
pub fn diff(previous: &Snapshot, current: &Snapshot) -> ChangeSet {
    let previous_set = previous.item_set();
    let current_set = current.item_set();

    let added = current
        .items()
        .iter()
        .filter(|item| !previous_set.contains(item.as_str()))
        .cloned()
        .collect();

    let removed = previous
        .items()
        .iter()
        .filter(|item| !current_set.contains(item.as_str()))
        .cloned()
        .collect();

    ChangeSet { added, removed }
}

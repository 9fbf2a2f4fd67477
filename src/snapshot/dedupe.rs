use std::collections::HashSet;

/// Remove duplicate items, keeping the first occurrence of each.
///
/// Items compare by exact string equality; no normalization is applied.
pub fn dedupe(items: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::with_capacity(items.len());
    items
        .into_iter()
        .filter(|item| seen.insert(item.clone()))
        .collect()
}

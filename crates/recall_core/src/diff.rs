use std::collections::{HashMap, HashSet};

use crate::fingerprint::{fingerprint, Fingerprint};
use crate::FeedItem;

/// Classification of the current item list against the previous one.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ChangeSet {
    pub new: Vec<FeedItem>,
    pub changed: Vec<FeedItem>,
    pub removed: Vec<FeedItem>,
    pub unchanged: usize,
}

impl ChangeSet {
    pub fn has_changes(&self) -> bool {
        !(self.new.is_empty() && self.changed.is_empty() && self.removed.is_empty())
    }
}

/// Diff two item lists by id and fingerprint.
///
/// Duplicate ids within one list resolve last-write-wins for the fingerprint;
/// each id is emitted once, at its first position. Input order is kept.
pub fn detect_changes(previous: &[FeedItem], current: &[FeedItem]) -> ChangeSet {
    let previous_map = fingerprint_map(previous);
    let current_map = fingerprint_map(current);

    let mut set = ChangeSet::default();
    let mut seen = HashSet::new();
    for item in current {
        if !seen.insert(item.id.as_str()) {
            continue;
        }
        match previous_map.get(item.id.as_str()) {
            None => set.new.push(item.clone()),
            Some(before) if current_map.get(item.id.as_str()) != Some(before) => {
                set.changed.push(item.clone())
            }
            Some(_) => set.unchanged += 1,
        }
    }

    let mut seen = HashSet::new();
    for item in previous {
        if seen.insert(item.id.as_str()) && !current_map.contains_key(item.id.as_str()) {
            set.removed.push(item.clone());
        }
    }
    set
}

fn fingerprint_map(items: &[FeedItem]) -> HashMap<&str, Fingerprint> {
    items
        .iter()
        .map(|item| (item.id.as_str(), fingerprint(item)))
        .collect()
}

use std::collections::HashMap;
use std::sync::Mutex;

use recall_core::DistributorInfo;

/// Link-keyed store of detail-page data. Best effort: a miss only costs a fetch.
pub trait DetailCache: Send + Sync {
    fn get(&self, link: &str) -> Option<DistributorInfo>;
    fn insert(&self, link: String, info: DistributorInfo);
}

/// In-process cache without expiry.
#[derive(Debug, Default)]
pub struct MemoryDetailCache {
    entries: Mutex<HashMap<String, DistributorInfo>>,
}

impl MemoryDetailCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl DetailCache for MemoryDetailCache {
    fn get(&self, link: &str) -> Option<DistributorInfo> {
        self.entries.lock().ok()?.get(link).cloned()
    }

    fn insert(&self, link: String, info: DistributorInfo) {
        // A poisoned lock just means this entry is not cached.
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(link, info);
        }
    }
}

//! In-memory fakes for the timeline store (testing only)
//!
//! Provides `MemoryTimelineStore`, satisfying the trait contract without
//! any external dependencies.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::StoreResult;
use crate::store::{CachedTimeline, TimelineStore};

/// In-memory timeline store backed by a `HashMap<issue_number, entry>`.
#[derive(Debug, Default)]
pub struct MemoryTimelineStore {
    entries: Mutex<HashMap<u64, CachedTimeline>>,
}

impl MemoryTimelineStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cached entries, for test assertions.
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl TimelineStore for MemoryTimelineStore {
    async fn get(&self, issue_number: u64) -> StoreResult<Option<CachedTimeline>> {
        let entries = self.entries.lock().unwrap();
        Ok(entries.get(&issue_number).cloned())
    }

    async fn put(&self, cached: CachedTimeline) -> StoreResult<()> {
        let mut entries = self.entries.lock().unwrap();
        entries.insert(cached.issue_number, cached);
        Ok(())
    }

    async fn delete(&self, issue_number: u64) -> StoreResult<()> {
        let mut entries = self.entries.lock().unwrap();
        entries.remove(&issue_number);
        Ok(())
    }
}

use std::collections::HashMap;
use std::sync::RwLock;

use crate::types::BoardSet;

/// Per-context cache of loaded board sets.
///
/// Entries live until invalidated or the owning service is dropped. A
/// poisoned lock is treated as an empty cache rather than a panic; the next
/// load simply goes back to storage.
#[derive(Debug, Default)]
pub struct BoardCache {
    entries: RwLock<HashMap<String, BoardSet>>,
}

impl BoardCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, context: &str) -> Option<BoardSet> {
        self.entries
            .read()
            .ok()
            .and_then(|entries| entries.get(context).cloned())
    }

    pub fn insert(&self, set: BoardSet) {
        if let Ok(mut entries) = self.entries.write() {
            entries.insert(set.context.clone(), set);
        }
    }

    pub fn invalidate(&self, context: &str) -> bool {
        self.entries
            .write()
            .map(|mut entries| entries.remove(context).is_some())
            .unwrap_or(false)
    }

    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.write() {
            entries.clear();
        }
    }

    pub fn contexts(&self) -> Vec<String> {
        let mut contexts: Vec<String> = self
            .entries
            .read()
            .map(|entries| entries.keys().cloned().collect())
            .unwrap_or_default();
        contexts.sort();
        contexts
    }
}

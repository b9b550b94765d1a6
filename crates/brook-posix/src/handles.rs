//! Thread-safe handle registry for stateful resources
//!
//! Provides numeric handles for resources that are created on one thread and
//! consumed on another, such as pending HTTP requests accepted by a
//! connection thread and answered from the dispatcher.

use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe registry mapping numeric handles to values.
///
/// Handles are auto-incrementing u64 IDs starting at 1 and are never reused.
pub struct HandleRegistry<T> {
    map: DashMap<u64, T>,
    next_id: AtomicU64,
}

impl<T> HandleRegistry<T> {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            map: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Insert a value and return its handle.
    pub fn insert(&self, value: T) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.map.insert(id, value);
        id
    }

    /// Get a reference to a value by handle.
    pub fn get(&self, id: u64) -> Option<dashmap::mapref::one::Ref<'_, u64, T>> {
        self.map.get(&id)
    }

    /// Remove a value by handle, returning it.
    pub fn remove(&self, id: u64) -> Option<T> {
        self.map.remove(&id).map(|(_, value)| value)
    }

    /// Whether the handle is still registered.
    #[cfg(test)]
    fn contains(&self, id: u64) -> bool {
        self.map.contains_key(&id)
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.map.len()
    }

    #[cfg(test)]
    fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

impl<T> Default for HandleRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

//! Handle-indexed storage for wgpu objects

use std::collections::HashMap;

/// Owns every live object of one kind and hands out the ids backing the
/// opaque handles. Ids are never reused.
pub(super) struct Pool<T> {
    items: HashMap<u64, T>,
    next_id: u64,
}

impl<T> Pool<T> {
    pub fn new() -> Self {
        Self {
            items: HashMap::new(),
            next_id: 1,
        }
    }

    /// Take an id without storing anything under it
    pub fn reserve(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub fn insert(&mut self, item: T) -> u64 {
        let id = self.reserve();
        self.items.insert(id, item);
        id
    }

    pub fn get(&self, id: u64) -> Option<&T> {
        self.items.get(&id)
    }

    pub fn remove(&mut self, id: u64) -> Option<T> {
        self.items.remove(&id)
    }

    pub fn retain(&mut self, mut keep: impl FnMut(&T) -> bool) {
        self.items.retain(|_, item| keep(item));
    }
}

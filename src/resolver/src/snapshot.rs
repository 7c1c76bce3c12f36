//! Published index snapshot
//!
//! Readers take an `Arc` to the current index with one atomic load and keep
//! using it for the whole resolution; a reload replaces the pointer with one
//! atomic store. No lock is shared between the two paths.

use crate::index::MappingIndex;
use arc_swap::ArcSwapOption;
use std::sync::Arc;

#[derive(Debug, Default)]
pub struct IndexHandle {
    current: ArcSwapOption<MappingIndex>,
}

impl IndexHandle {
    /// Handle with nothing published yet
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle with an initial index already published
    pub fn with_index(index: MappingIndex) -> Self {
        Self {
            current: ArcSwapOption::from_pointee(index),
        }
    }

    /// Current snapshot, if any build has succeeded
    pub fn load(&self) -> Option<Arc<MappingIndex>> {
        self.current.load_full()
    }

    /// Replace the current snapshot, returning the previous one
    pub fn publish(&self, index: Arc<MappingIndex>) -> Option<Arc<MappingIndex>> {
        self.current.swap(Some(index))
    }

    pub fn is_ready(&self) -> bool {
        self.current.load().is_some()
    }

    /// Generation of the current snapshot (0 when nothing is published)
    pub fn generation(&self) -> u64 {
        match &*self.current.load() {
            Some(index) => index.generation(),
            None => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::IndexBuilder;

    #[test]
    fn test_publish_and_load() {
        let handle = IndexHandle::new();
        assert!(!handle.is_ready());
        assert!(handle.load().is_none());
        assert_eq!(handle.generation(), 0);

        let previous = handle.publish(Arc::new(IndexBuilder::new("aws").build(1)));
        assert!(previous.is_none());
        assert_eq!(handle.generation(), 1);

        let held = handle.load().unwrap();
        let previous = handle.publish(Arc::new(IndexBuilder::new("aws").build(2)));
        assert_eq!(previous.unwrap().generation(), 1);

        // A reader holding the old snapshot keeps it
        assert_eq!(held.generation(), 1);
        assert_eq!(handle.generation(), 2);
    }
}

//! Persistent tree cache shared between workspaces.

use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;
use parking_lot::Mutex;

use crate::export::TreeMeta;

const DEFAULT_CAPACITY: usize = 64;

/// What a tree was built into; enough to reopen it without rebuilding.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedTree {
    pub meta: TreeMeta,
    pub outline: String,
}

/// Cheap to clone; all clones see the same entries.
#[derive(Debug, Clone)]
pub struct TreeCache {
    inner: Arc<Mutex<LruCache<String, CachedTree>>>,
}

impl Default for TreeCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl TreeCache {
    /// A zero capacity is bumped to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Arc::new(Mutex::new(LruCache::new(capacity))),
        }
    }

    pub fn get(&self, key: &str) -> Option<CachedTree> {
        self.inner.lock().get(key).cloned()
    }

    pub fn put(&self, key: impl Into<String>, tree: CachedTree) {
        self.inner.lock().put(key.into(), tree);
    }

    pub fn evict(&self, key: &str) -> Option<CachedTree> {
        self.inner.lock().pop(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.inner.lock().contains(key)
    }

    pub fn clear(&self) {
        self.inner.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}

//! Process-wide cache of opened stages, addressed by integer id.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex, OnceLock};

use crate::stage::{Stage, StageError, StageResult};

/// Stages shared between readers by id.
#[derive(Default)]
pub struct StageCache {
    next_id: AtomicI64,
    stages: Mutex<HashMap<i64, Arc<Stage>>>,
}

impl StageCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The shared process-wide cache.
    pub fn global() -> &'static StageCache {
        static CACHE: OnceLock<StageCache> = OnceLock::new();
        CACHE.get_or_init(StageCache::new)
    }

    /// Store a stage and return its id. Ids start at 1.
    pub fn insert(&self, stage: Arc<Stage>) -> i64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        self.stages
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(id, stage);
        id
    }

    pub fn find(&self, id: i64) -> StageResult<Arc<Stage>> {
        self.stages
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&id)
            .cloned()
            .ok_or(StageError::UnknownCacheId(id))
    }

    /// Remove a stage; readers holding it keep their reference.
    pub fn erase(&self, id: i64) -> bool {
        self.stages
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&id)
            .is_some()
    }

    pub fn len(&self) -> usize {
        self.stages.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_find_erase() {
        let cache = StageCache::new();
        let stage = Arc::new(Stage::from_string("#usda 1.0\ndef Xform \"A\" {}\n").unwrap());

        let id = cache.insert(stage.clone());
        assert_eq!(id, 1);
        assert!(Arc::ptr_eq(&cache.find(id).unwrap(), &stage));

        assert!(cache.erase(id));
        assert!(matches!(cache.find(id), Err(StageError::UnknownCacheId(1))));
        assert!(cache.is_empty());
    }
}

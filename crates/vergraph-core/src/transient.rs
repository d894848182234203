//! Per-snapshot memoization of derived values

use crate::entity::{Entity, EntityId};
use crate::layer::{read, write};
use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Derived computations that may be cached against an entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransientKey {
    ParentWayCount,
    ParentRelationCount,
    ChildCount,
    Extent,
    IsClosed,
}

struct CacheEntry {
    /// The entity value the cached result was computed against
    entity: Entity,
    value: Arc<dyn Any + Send + Sync>,
}

/// Memo table owned by a single snapshot
#[derive(Default)]
pub struct TransientCache {
    entries: RwLock<HashMap<(EntityId, TransientKey), CacheEntry>>,
}

impl TransientCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached value for `(entity, key)`, computing it on a miss
    ///
    /// A hit only counts when the cached entry was computed against an
    /// entity equal to `entity`. The lock is not held while `compute` runs,
    /// so computations may themselves memoize.
    pub fn get_or_compute<T, F>(&self, entity: &Entity, key: TransientKey, compute: F) -> T
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce() -> T,
    {
        let slot = (entity.id.clone(), key);
        {
            let entries = read(&self.entries);
            if let Some(entry) = entries.get(&slot) {
                if entry.entity == *entity {
                    if let Some(value) = entry.value.downcast_ref::<T>() {
                        return value.clone();
                    }
                }
            }
        }

        let value = compute();
        write(&self.entries).insert(
            slot,
            CacheEntry {
                entity: entity.clone(),
                value: Arc::new(value.clone()),
            },
        );
        value
    }

    /// Drop every cached value for the given ids
    pub fn invalidate<'a, I>(&self, ids: I)
    where
        I: IntoIterator<Item = &'a EntityId>,
    {
        let ids: Vec<&EntityId> = ids.into_iter().collect();
        if ids.is_empty() {
            return;
        }
        write(&self.entries).retain(|(id, _), _| !ids.contains(&id));
    }

    pub fn clear(&self) {
        write(&self.entries).clear();
    }

    pub fn len(&self) -> usize {
        read(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for TransientCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransientCache")
            .field("entries", &self.len())
            .finish()
    }
}

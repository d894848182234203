//! Base and local storage layers
//!
//! A snapshot reads through its private [`LocalLayer`] first and falls back
//! to the [`BaseLayer`] it shares with the rest of its chain. Both layers
//! carry entity records and reverse indices; the local indices are deltas on
//! top of the base ones.

use crate::entity::{Entity, EntityId, EntityType};
use crate::error::{Error, Result};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Which reverse index a composite entity lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum ParentKind {
    Way,
    Relation,
}

impl ParentKind {
    pub(crate) const ALL: [ParentKind; 2] = [ParentKind::Way, ParentKind::Relation];

    pub(crate) fn of(entity: &Entity) -> Option<Self> {
        match entity.entity_type() {
            EntityType::Node => None,
            EntityType::Way => Some(Self::Way),
            EntityType::Relation => Some(Self::Relation),
        }
    }
}

/// Child id -> ordered set of parent ids
pub(crate) type ParentIndex = HashMap<EntityId, Vec<EntityId>>;

/// Local adjustments to one child's base parent set
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct ParentDelta {
    pub added: Vec<EntityId>,
    pub removed: Vec<EntityId>,
}

impl ParentDelta {
    pub(crate) fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// Entity records and reverse indices shared by a chain of snapshots
#[derive(Debug, Default)]
pub(crate) struct BaseLayer {
    pub entities: HashMap<EntityId, Arc<Entity>>,
    pub parent_ways: ParentIndex,
    pub parent_rels: ParentIndex,
}

impl BaseLayer {
    pub(crate) fn index(&self, kind: ParentKind) -> &ParentIndex {
        match kind {
            ParentKind::Way => &self.parent_ways,
            ParentKind::Relation => &self.parent_rels,
        }
    }

    pub(crate) fn index_mut(&mut self, kind: ParentKind) -> &mut ParentIndex {
        match kind {
            ParentKind::Way => &mut self.parent_ways,
            ParentKind::Relation => &mut self.parent_rels,
        }
    }
}

/// Overrides private to one snapshot
#[derive(Debug, Clone, Default)]
pub(crate) struct LocalLayer {
    /// `None` is a tombstone.
    pub entities: HashMap<EntityId, Option<Arc<Entity>>>,
    pub parent_ways: HashMap<EntityId, ParentDelta>,
    pub parent_rels: HashMap<EntityId, ParentDelta>,
}

impl LocalLayer {
    pub(crate) fn deltas(&self, kind: ParentKind) -> &HashMap<EntityId, ParentDelta> {
        match kind {
            ParentKind::Way => &self.parent_ways,
            ParentKind::Relation => &self.parent_rels,
        }
    }

    pub(crate) fn deltas_mut(&mut self, kind: ParentKind) -> &mut HashMap<EntityId, ParentDelta> {
        match kind {
            ParentKind::Way => &mut self.parent_ways,
            ParentKind::Relation => &mut self.parent_rels,
        }
    }

    /// Resolve `id` through this layer, then `base`
    pub(crate) fn lookup<'a>(&'a self, base: &'a BaseLayer, id: &str) -> Option<&'a Arc<Entity>> {
        match self.entities.get(id) {
            Some(local) => local.as_ref(),
            None => base.entities.get(id),
        }
    }

    pub(crate) fn must_lookup(&self, base: &BaseLayer, id: &str) -> Result<Arc<Entity>> {
        self.lookup(base, id)
            .cloned()
            .ok_or_else(|| Error::MissingEntity(EntityId::new(id)))
    }

    /// Resolve a way's nodes in order, repeats included
    pub(crate) fn child_nodes(&self, base: &BaseLayer, way: &Entity) -> Result<Vec<Arc<Entity>>> {
        way.way_nodes()
            .iter()
            .map(|id| self.must_lookup(base, id.as_str()))
            .collect()
    }

    /// Effective parent ids of `child`: base parents minus local removals,
    /// followed by local additions
    pub(crate) fn parent_ids(&self, base: &BaseLayer, child: &str, kind: ParentKind) -> Vec<EntityId> {
        let delta = self.deltas(kind).get(child);
        let mut ids: Vec<EntityId> = base
            .index(kind)
            .get(child)
            .map(|parents| {
                parents
                    .iter()
                    .filter(|p| delta.map_or(true, |d| !d.removed.contains(p)))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        if let Some(delta) = delta {
            for parent in &delta.added {
                if !ids.contains(parent) {
                    ids.push(parent.clone());
                }
            }
        }
        ids
    }

    /// Resolve parent ids to live entities
    pub(crate) fn parents(&self, base: &BaseLayer, child: &str, kind: ParentKind) -> Vec<Arc<Entity>> {
        self.parent_ids(base, child, kind)
            .iter()
            .filter_map(|id| self.lookup(base, id.as_str()).cloned())
            .collect()
    }

    /// All live entities, local shadowing base, sorted by id
    pub(crate) fn live_entities(&self, base: &BaseLayer) -> Vec<Arc<Entity>> {
        let mut all: Vec<Arc<Entity>> = base
            .entities
            .iter()
            .filter(|(id, _)| !self.entities.contains_key(*id))
            .map(|(_, e)| Arc::clone(e))
            .chain(self.entities.values().flatten().cloned())
            .collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        all
    }
}

/// Read-lock a layer; a poisoned lock still holds consistent data because
/// every writer finishes its update before releasing.
pub(crate) fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

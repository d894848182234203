//! Graph snapshots
//!
//! A [`Graph`] is one frozen version of the entity universe. Edits never
//! touch the receiver: they return a new snapshot that shares the same base
//! layer and carries its own copy of the local overrides. Cloning a `Graph`
//! clones a handle to the same snapshot, so [`Graph::ptr_eq`] is the identity
//! comparison callers use to detect "nothing changed".

use crate::batch::GraphBuilder;
use crate::entity::{Entity, EntityId};
use crate::error::Result;
use crate::layer::{read, BaseLayer, LocalLayer, ParentKind};
use crate::transient::{TransientCache, TransientKey};
use std::sync::{Arc, RwLock};

pub(crate) struct Snapshot {
    base: Arc<RwLock<BaseLayer>>,
    local: RwLock<LocalLayer>,
    transients: TransientCache,
}

/// An immutable snapshot of the entity graph
#[derive(Clone)]
pub struct Graph {
    inner: Arc<Snapshot>,
}

/// Local overrides of a snapshot compared against its base layer
#[derive(Debug, Clone, Default)]
pub struct Changes {
    pub created: Vec<Arc<Entity>>,
    pub modified: Vec<Arc<Entity>>,
    /// Base versions of the entities deleted locally
    pub deleted: Vec<Arc<Entity>>,
}

impl Changes {
    pub fn is_empty(&self) -> bool {
        self.created.is_empty() && self.modified.is_empty() && self.deleted.is_empty()
    }

    pub fn len(&self) -> usize {
        self.created.len() + self.modified.len() + self.deleted.len()
    }
}

impl Graph {
    pub(crate) fn from_layers(base: Arc<RwLock<BaseLayer>>, local: LocalLayer) -> Self {
        Self {
            inner: Arc::new(Snapshot {
                base,
                local: RwLock::new(local),
                transients: TransientCache::new(),
            }),
        }
    }

    /// Empty graph with a fresh base layer
    pub fn new() -> Self {
        Self::from_layers(Arc::default(), LocalLayer::default())
    }

    /// Frozen graph whose base layer holds `entities`
    ///
    /// Entities fetched as deleted are skipped and the first of several
    /// entities with the same id wins, exactly as in a rebase.
    pub fn from_entities<I>(entities: I) -> Result<Self>
    where
        I: IntoIterator<Item = Entity>,
    {
        Ok(GraphBuilder::from_entities(entities)?.freeze())
    }

    /// Mutable graph whose base layer holds `entities`
    pub fn builder<I>(entities: I) -> Result<GraphBuilder>
    where
        I: IntoIterator<Item = Entity>,
    {
        GraphBuilder::from_entities(entities)
    }

    /// New snapshot over the same base with a copy of this one's overrides
    pub fn fork(&self) -> Graph {
        Self::from_layers(Arc::clone(&self.inner.base), read(&self.inner.local).clone())
    }

    /// Mutable copy of this snapshot
    pub fn to_builder(&self) -> GraphBuilder {
        GraphBuilder::from_layers(Arc::clone(&self.inner.base), read(&self.inner.local).clone())
    }

    /// Whether two handles refer to the same snapshot
    pub fn ptr_eq(a: &Graph, b: &Graph) -> bool {
        Arc::ptr_eq(&a.inner, &b.inner)
    }

    /// Whether both snapshots read through the same base layer
    pub fn shares_base_with(&self, other: &Graph) -> bool {
        Arc::ptr_eq(&self.inner.base, &other.inner.base)
    }

    pub(crate) fn base_handle(&self) -> &Arc<RwLock<BaseLayer>> {
        &self.inner.base
    }

    pub(crate) fn local_lock(&self) -> &RwLock<LocalLayer> {
        &self.inner.local
    }

    pub(crate) fn transients(&self) -> &TransientCache {
        &self.inner.transients
    }

    fn with_layers<R>(&self, f: impl FnOnce(&BaseLayer, &LocalLayer) -> R) -> R {
        let base = read(&self.inner.base);
        let local = read(&self.inner.local);
        f(&base, &local)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Lookups
    // ─────────────────────────────────────────────────────────────────────────

    /// The live entity with this id, if any
    pub fn has_entity(&self, id: &str) -> Option<Arc<Entity>> {
        self.with_layers(|base, local| local.lookup(base, id).cloned())
    }

    /// The live entity with this id, failing with `MissingEntity`
    pub fn entity(&self, id: &str) -> Result<Arc<Entity>> {
        self.with_layers(|base, local| local.must_lookup(base, id))
    }

    /// Every live entity, sorted by id
    pub fn entities(&self) -> Vec<Arc<Entity>> {
        self.with_layers(|base, local| local.live_entities(base))
    }

    pub fn len(&self) -> usize {
        self.entities().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of ids overridden (or tombstoned) by this snapshot
    pub fn local_len(&self) -> usize {
        read(&self.inner.local).entities.len()
    }

    /// Number of entities in the shared base layer
    pub fn base_len(&self) -> usize {
        read(&self.inner.base).entities.len()
    }

    /// Whether this snapshot overrides `id`, including by tombstone
    pub fn is_overridden(&self, id: &str) -> bool {
        read(&self.inner.local).entities.contains_key(id)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Reverse indices
    // ─────────────────────────────────────────────────────────────────────────

    /// Ways referencing `entity`
    pub fn parent_ways(&self, entity: &Entity) -> Vec<Arc<Entity>> {
        self.with_layers(|base, local| local.parents(base, entity.id.as_str(), ParentKind::Way))
    }

    /// Relations with `entity` as a member
    pub fn parent_relations(&self, entity: &Entity) -> Vec<Arc<Entity>> {
        self.with_layers(|base, local| {
            local.parents(base, entity.id.as_str(), ParentKind::Relation)
        })
    }

    /// Parent relations tagged `type=multipolygon`
    pub fn parent_multipolygons(&self, entity: &Entity) -> Vec<Arc<Entity>> {
        self.parent_relations(entity)
            .into_iter()
            .filter(|r| r.is_multipolygon())
            .collect()
    }

    /// A way's nodes resolved in order; fails if any node is missing
    pub fn child_nodes(&self, way: &Entity) -> Result<Vec<Arc<Entity>>> {
        self.with_layers(|base, local| local.child_nodes(base, way))
    }

    /// Memoized derived value for `entity` in this snapshot
    pub fn memoize<T, F>(&self, entity: &Entity, key: TransientKey, compute: F) -> T
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce() -> T,
    {
        self.inner.transients.get_or_compute(entity, key, compute)
    }

    /// Created, modified and deleted entities relative to the base layer
    pub fn local_changes(&self) -> Changes {
        self.with_layers(|base, local| {
            let mut changes = Changes::default();
            for (id, head) in &local.entities {
                match (base.entities.get(id), head) {
                    (None, Some(entity)) => changes.created.push(Arc::clone(entity)),
                    (Some(original), Some(entity)) if original != entity => {
                        changes.modified.push(Arc::clone(entity))
                    }
                    (Some(original), None) => changes.deleted.push(Arc::clone(original)),
                    _ => {}
                }
            }
            for list in [&mut changes.created, &mut changes.modified, &mut changes.deleted] {
                list.sort_by(|a, b| a.id.cmp(&b.id));
            }
            changes
        })
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Edits
    // ─────────────────────────────────────────────────────────────────────────

    /// Snapshot with `entity` in place of whatever held its id
    ///
    /// Returns this very snapshot when the graph already holds an equal
    /// entity.
    pub fn replace(&self, entity: Entity) -> Graph {
        if self.has_entity(entity.id.as_str()).as_deref() == Some(&entity) {
            return self.clone();
        }
        let mut builder = self.to_builder();
        builder.replace(entity);
        builder.freeze()
    }

    /// Snapshot with `entity` tombstoned
    pub fn remove(&self, entity: &Entity) -> Graph {
        let mut builder = self.to_builder();
        builder.remove(entity);
        builder.freeze()
    }

    /// Snapshot with the local override of `id` discarded
    ///
    /// Returns this very snapshot when there is no override.
    pub fn revert(&self, id: &str) -> Graph {
        if !self.is_overridden(id) {
            return self.clone();
        }
        let mut builder = self.to_builder();
        builder.revert(id);
        builder.freeze()
    }

    /// Ids of the snapshot's overridden entities
    pub fn overridden_ids(&self) -> Vec<EntityId> {
        let mut ids: Vec<EntityId> = read(&self.inner.local).entities.keys().cloned().collect();
        ids.sort();
        ids
    }
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Graph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Graph")
            .field("base_entities", &self.base_len())
            .field("local_entities", &self.local_len())
            .field("transients", &self.inner.transients)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{EntityType, Member};

    fn node(id: &str) -> Entity {
        Entity::node(id, [0.0, 0.0])
    }

    fn member_of(ids: &[&str]) -> Vec<Member> {
        ids.iter()
            .map(|id| Member::new(*id, EntityType::Node, ""))
            .collect()
    }

    fn ids(entities: &[Arc<Entity>]) -> Vec<String> {
        let mut ids: Vec<String> = entities.iter().map(|e| e.id.to_string()).collect();
        ids.sort();
        ids
    }

    #[test]
    fn test_construct_from_entities() {
        let n = node("n1");
        let graph = Graph::from_entities(vec![n.clone()]).unwrap();
        assert_eq!(graph.entity("n1").unwrap().as_ref(), &n);
        assert_eq!(graph.base_len(), 1);
        assert_eq!(graph.local_len(), 0);
    }

    #[test]
    fn test_fork_shares_base_and_copies_local() {
        let graph = Graph::from_entities(vec![node("n1")]).unwrap().replace(node("n2"));
        let forked = graph.fork();

        assert!(forked.shares_base_with(&graph));
        assert!(!Graph::ptr_eq(&forked, &graph));
        assert_eq!(forked.local_len(), graph.local_len());
        assert!(!std::ptr::eq(forked.local_lock(), graph.local_lock()));
        assert!(forked.has_entity("n2").is_some());
    }

    #[test]
    fn test_has_entity_and_entity() {
        let graph = Graph::from_entities(vec![node("n1")]).unwrap();
        assert!(graph.has_entity("n1").is_some());
        assert!(graph.has_entity("n9").is_none());
        assert!(matches!(
            graph.entity("n9"),
            Err(crate::Error::MissingEntity(id)) if id.as_str() == "n9"
        ));
    }

    #[test]
    fn test_replace_identical_is_noop() {
        let graph = Graph::from_entities(vec![node("n1")]).unwrap();
        let same = graph.replace(node("n1"));
        assert!(Graph::ptr_eq(&same, &graph));
    }

    #[test]
    fn test_replace_returns_new_graph_without_touching_receiver() {
        let n1 = node("n1");
        let n2 = n1.clone().with_tag("amenity", "bench");
        let graph = Graph::from_entities(vec![n1.clone()]).unwrap();
        let next = graph.replace(n2.clone());

        assert!(!Graph::ptr_eq(&next, &graph));
        assert_eq!(next.entity("n1").unwrap().as_ref(), &n2);
        assert_eq!(graph.entity("n1").unwrap().as_ref(), &n1);
    }

    #[test]
    fn test_replace_adds_parent_ways_without_duplicates() {
        let n = node("n");
        let w = Entity::way("w", ["n", "n2", "n"]);
        let graph = Graph::from_entities(vec![n.clone()]).unwrap().replace(w.clone());
        assert_eq!(ids(&graph.parent_ways(&n)), vec!["w"]);

        let again = Graph::from_entities(vec![n.clone(), w.clone()])
            .unwrap()
            .replace(w.clone().with_tag("highway", "path"));
        assert_eq!(ids(&again.parent_ways(&n)), vec!["w"]);
        assert!(graph.parent_ways(&w).is_empty());
    }

    #[test]
    fn test_replace_adds_parent_relations() {
        let n = node("n");
        let r = Entity::relation("r", member_of(&["n"]));
        let graph = Graph::from_entities(vec![n.clone()]).unwrap().replace(r);
        assert_eq!(ids(&graph.parent_relations(&n)), vec!["r"]);
        assert!(graph.parent_relations(&node("other")).is_empty());
    }

    #[test]
    fn test_remove() {
        let n = node("n");
        let w = Entity::way("w", ["n"]);
        let r = Entity::relation("r", member_of(&["n"]));
        let graph = Graph::from_entities(vec![n.clone(), w.clone(), r.clone()]).unwrap();

        let removed = graph.remove(&n);
        assert!(!Graph::ptr_eq(&removed, &graph));
        assert!(removed.has_entity("n").is_none());
        assert!(graph.has_entity("n").is_some());

        assert!(graph.remove(&w).parent_ways(&n).is_empty());
        assert!(graph.remove(&r).parent_relations(&n).is_empty());
    }

    #[test]
    fn test_revert_noop_without_override() {
        let graph = Graph::from_entities(vec![node("n")]).unwrap();
        assert!(Graph::ptr_eq(&graph.revert("n"), &graph));
    }

    #[test]
    fn test_revert_restores_base_version() {
        let n1 = node("n");
        let n2 = n1.clone().with_loc([5.0, 5.0]);
        let graph = Graph::from_entities(vec![n1.clone()]).unwrap().replace(n2.clone());
        let reverted = graph.revert("n");

        assert!(!Graph::ptr_eq(&reverted, &graph));
        assert_eq!(reverted.entity("n").unwrap().as_ref(), &n1);
        assert_eq!(graph.entity("n").unwrap().as_ref(), &n2);
    }

    #[test]
    fn test_revert_removes_new_entity() {
        let graph = Graph::new().replace(node("n")).revert("n");
        assert!(graph.has_entity("n").is_none());
    }

    #[test]
    fn test_remove_then_revert_round_trip() {
        let n = node("n");
        let graph = Graph::from_entities(vec![n.clone()]).unwrap();
        let restored = graph.remove(&n).revert("n");
        assert_eq!(restored.entity("n").unwrap().as_ref(), &n);
    }

    #[test]
    fn test_revert_reconciles_parents() {
        let n = node("n");
        let w1 = Entity::way("w", ["n"]);
        let w2 = w1.clone().remove_node("n");
        let r1 = Entity::relation("r", member_of(&["n"]));
        let r2 = r1.clone().remove_members_with_id("n");

        // new parents disappear
        let created = Graph::new().replace(n.clone()).replace(w1.clone()).revert("w");
        assert!(created.parent_ways(&n).is_empty());
        let created = Graph::new().replace(n.clone()).replace(r1.clone()).revert("r");
        assert!(created.parent_relations(&n).is_empty());

        // updated and deleted parents come back
        let base = Graph::from_entities(vec![n.clone(), w1.clone(), r1.clone()]).unwrap();
        let updated = base.replace(w2).replace(r2);
        assert!(updated.parent_ways(&n).is_empty());
        assert!(updated.parent_relations(&n).is_empty());
        let reverted = updated.revert("w").revert("r");
        assert_eq!(ids(&reverted.parent_ways(&n)), vec!["w"]);
        assert_eq!(ids(&reverted.parent_relations(&n)), vec!["r"]);

        let deleted = base.remove(&w1).remove(&r1).revert("w").revert("r");
        assert_eq!(ids(&deleted.parent_ways(&n)), vec!["w"]);
        assert_eq!(ids(&deleted.parent_relations(&n)), vec!["r"]);
        assert_eq!(deleted.local_len(), 0);
    }

    #[test]
    fn test_child_nodes() {
        let n1 = node("n1");
        let way = Entity::way("w1", ["n1", "n2"]);
        let graph = Graph::from_entities(vec![n1.clone(), way.clone()]).unwrap();
        assert!(matches!(
            graph.child_nodes(&way),
            Err(crate::Error::MissingEntity(_))
        ));

        let graph = graph.replace(node("n2"));
        assert_eq!(ids(&graph.child_nodes(&way).unwrap()), vec!["n1", "n2"]);
        assert!(graph.child_nodes(&n1).unwrap().is_empty());
    }

    #[test]
    fn test_parent_multipolygons() {
        let w = Entity::way("w", ["n"]);
        let mp = Entity::relation("r1", vec![Member::new("w", EntityType::Way, "outer")])
            .with_tag("type", "multipolygon");
        let route = Entity::relation("r2", vec![Member::new("w", EntityType::Way, "")])
            .with_tag("type", "route");
        let graph = Graph::from_entities(vec![w.clone(), mp, route]).unwrap();

        assert_eq!(ids(&graph.parent_relations(&w)), vec!["r1", "r2"]);
        assert_eq!(ids(&graph.parent_multipolygons(&w)), vec!["r1"]);
    }

    #[test]
    fn test_local_changes() {
        let a = node("a");
        let b = node("b");
        let graph = Graph::from_entities(vec![a.clone(), b.clone()])
            .unwrap()
            .replace(a.clone().with_tag("name", "A"))
            .remove(&b)
            .replace(node("c"));

        let changes = graph.local_changes();
        assert_eq!(ids(&changes.created), vec!["c"]);
        assert_eq!(ids(&changes.modified), vec!["a"]);
        assert_eq!(ids(&changes.deleted), vec!["b"]);
        assert_eq!(changes.len(), 3);
        assert_eq!(graph.overridden_ids().len(), 3);
        assert_eq!(ids(&graph.entities()), vec!["a", "c"]);
    }

    #[test]
    fn test_memoize_is_per_snapshot() {
        let n = node("n");
        let graph = Graph::from_entities(vec![n.clone(), Entity::way("w", ["n"])]).unwrap();
        let count = |g: &Graph| g.memoize(&n, TransientKey::ParentWayCount, || g.parent_ways(&n).len());

        assert_eq!(count(&graph), 1);
        let next = graph.replace(Entity::way("w2", ["n"]));
        assert_eq!(count(&next), 2);
        assert_eq!(count(&graph), 1);
    }
}

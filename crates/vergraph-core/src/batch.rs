//! Mutable graph mode and batched edits
//!
//! A [`GraphBuilder`] is a snapshot that is still being built. Edits apply in
//! place; [`GraphBuilder::freeze`] turns it into a [`Graph`]. A frozen graph
//! can only be edited by thawing a copy, so in-place mutation of a published
//! snapshot is ruled out by the types.

use crate::entity::{Entity, EntityId};
use crate::error::{Error, Result};
use crate::graph::Graph;
use crate::index;
use crate::layer::{read, BaseLayer, LocalLayer, ParentKind};
use crate::rebase::{merge_into_base, RebaseStats};
use crate::validation::{validate_entity, validate_entity_id, validate_rebase_batch};
use std::sync::{Arc, RwLock};

/// One edit in a batch
pub type Mutation<'a> = Box<dyn FnOnce(&mut GraphBuilder) -> Result<()> + 'a>;

/// A graph in mutable mode
pub struct GraphBuilder {
    base: Arc<RwLock<BaseLayer>>,
    local: LocalLayer,
}

impl GraphBuilder {
    /// Empty builder over a fresh base layer
    pub fn new() -> Self {
        Self::from_layers(Arc::default(), LocalLayer::default())
    }

    pub(crate) fn from_layers(base: Arc<RwLock<BaseLayer>>, local: LocalLayer) -> Self {
        Self { base, local }
    }

    /// Builder whose fresh base layer holds `entities`
    pub fn from_entities<I>(entities: I) -> Result<Self>
    where
        I: IntoIterator<Item = Entity>,
    {
        let entities: Vec<Entity> = entities.into_iter().collect();
        validate_rebase_batch(&entities)?;

        let mut base = BaseLayer::default();
        let mut stats = RebaseStats::default();
        merge_into_base(&mut base, &entities, false, &mut stats);
        tracing::debug!(
            "Constructed base layer: merged={}, skipped_existing={}, skipped_deleted={}",
            stats.merged,
            stats.skipped_existing,
            stats.skipped_deleted
        );

        Ok(Self::from_layers(
            Arc::new(RwLock::new(base)),
            LocalLayer::default(),
        ))
    }

    /// Publish as an immutable snapshot
    pub fn freeze(self) -> Graph {
        Graph::from_layers(self.base, self.local)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Edits
    // ─────────────────────────────────────────────────────────────────────────

    /// Point `id` at `next` in the local layer, reconciling reverse indices
    /// against whatever the builder held before
    fn put(&mut self, id: EntityId, next: Option<Arc<Entity>>) {
        let base = read(&self.base);
        let previous = self.local.lookup(&base, id.as_str()).cloned();
        index::reconcile_local(&base, &mut self.local, &id, previous.as_deref(), next.as_deref());
        self.local.entities.insert(id, next);
    }

    /// Replace whatever holds `entity.id`; a no-op for an equal entity
    pub fn replace(&mut self, entity: Entity) -> &mut Self {
        if self.has_entity(entity.id.as_str()).as_deref() != Some(&entity) {
            let id = entity.id.clone();
            self.put(id, Some(Arc::new(entity)));
        }
        self
    }

    /// Tombstone `entity.id`
    pub fn remove(&mut self, entity: &Entity) -> &mut Self {
        self.put(entity.id.clone(), None);
        self
    }

    /// Drop the local override of `id`, falling back to the base layer
    pub fn revert(&mut self, id: &str) -> &mut Self {
        let Some(previous) = self.local.entities.get(id).cloned() else {
            return self;
        };
        {
            let base = read(&self.base);
            let restored = base.entities.get(id).cloned();
            index::reconcile_local(
                &base,
                &mut self.local,
                &EntityId::new(id),
                previous.as_deref(),
                restored.as_deref(),
            );
        }
        self.local.entities.remove(id);
        self
    }

    /// Restore saved local overrides; `None` restores a tombstone
    ///
    /// Every entry is validated before any is applied.
    pub fn load<I>(&mut self, overrides: I) -> Result<&mut Self>
    where
        I: IntoIterator<Item = (EntityId, Option<Entity>)>,
    {
        let overrides: Vec<(EntityId, Option<Entity>)> = overrides.into_iter().collect();
        for (id, entity) in &overrides {
            validate_entity_id(id)?;
            if let Some(entity) = entity {
                validate_entity(entity)?;
                if entity.id != *id {
                    return Err(Error::MalformedEntity(format!(
                        "override for {} carries entity {}",
                        id, entity.id
                    )));
                }
            }
        }

        for (id, entity) in overrides {
            self.put(id, entity.map(Arc::new));
        }
        Ok(self)
    }

    /// Run every mutation against this builder in place
    pub fn apply_batch(&mut self, mutations: Vec<Mutation<'_>>) -> Result<&mut Self> {
        if mutations.is_empty() {
            return Err(Error::InvalidMutation(
                "batch requires at least one mutation".to_string(),
            ));
        }
        for mutation in mutations {
            mutation(self)?;
        }
        Ok(self)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Lookups
    // ─────────────────────────────────────────────────────────────────────────

    pub fn has_entity(&self, id: &str) -> Option<Arc<Entity>> {
        let base = read(&self.base);
        self.local.lookup(&base, id).cloned()
    }

    pub fn entity(&self, id: &str) -> Result<Arc<Entity>> {
        let base = read(&self.base);
        self.local.must_lookup(&base, id)
    }

    pub fn parent_ways(&self, entity: &Entity) -> Vec<Arc<Entity>> {
        let base = read(&self.base);
        self.local.parents(&base, entity.id.as_str(), ParentKind::Way)
    }

    pub fn parent_relations(&self, entity: &Entity) -> Vec<Arc<Entity>> {
        let base = read(&self.base);
        self.local.parents(&base, entity.id.as_str(), ParentKind::Relation)
    }

    pub fn child_nodes(&self, way: &Entity) -> Result<Vec<Arc<Entity>>> {
        let base = read(&self.base);
        self.local.child_nodes(&base, way)
    }
}

impl Default for GraphBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for GraphBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphBuilder")
            .field("local_entities", &self.local.entities.len())
            .finish()
    }
}

impl Graph {
    /// Apply every mutation to one new snapshot
    ///
    /// The receiver is untouched; if a mutation fails the partially edited
    /// copy is discarded and the error returned.
    pub fn apply_batch(&self, mutations: Vec<Mutation<'_>>) -> Result<Graph> {
        if mutations.is_empty() {
            return Err(Error::InvalidMutation(
                "batch requires at least one mutation".to_string(),
            ));
        }
        let count = mutations.len();
        let mut builder = self.to_builder();
        builder.apply_batch(mutations)?;
        tracing::debug!("Applied batch of {} mutations", count);
        Ok(builder.freeze())
    }

    /// Apply a single mutation callback to one new snapshot
    pub fn update<'a, F>(&self, mutation: F) -> Result<Graph>
    where
        F: FnOnce(&mut GraphBuilder) -> Result<()> + 'a,
    {
        self.apply_batch(vec![Box::new(mutation) as Mutation<'a>])
    }
}

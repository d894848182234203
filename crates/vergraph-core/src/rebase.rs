//! Merging fetched entities into a chain's shared base layer
//!
//! [`rebase`] is the only code path that writes to a base layer after it has
//! been published. It holds the base write lock for the whole call, merges
//! the incoming entities, then walks every snapshot in the chain to re-layer
//! its local deltas and drop cached values that may now be stale.

use crate::entity::{Entity, EntityId, EntityType};
use crate::error::{Error, Result};
use crate::graph::Graph;
use crate::index;
use crate::layer::{write, BaseLayer, ParentKind};
use crate::validation::validate_rebase_batch;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;

/// Rebase behaviour switches
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RebaseOptions {
    /// Overwrite entities the base layer already holds
    #[serde(default)]
    pub force: bool,

    /// Lift a later snapshot's tombstone on a node once a merged way is
    /// found to reference it
    #[serde(default)]
    pub restore_referenced: bool,
}

impl RebaseOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn forced(mut self) -> Self {
        self.force = true;
        self
    }

    pub fn restoring_referenced(mut self) -> Self {
        self.restore_referenced = true;
        self
    }
}

/// What a rebase did
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RebaseStats {
    pub merged: usize,
    pub skipped_existing: usize,
    pub skipped_deleted: usize,
    pub reindexed_children: usize,
    pub snapshots_repaired: usize,
    pub restored: usize,
}

/// A merged entity and the children whose base parent sets it changed
#[derive(Debug)]
pub(crate) struct BaseChange {
    pub id: EntityId,
    pub touched: Vec<(ParentKind, EntityId)>,
}

/// Write `entities` into `base` under first-writer-wins (unless `force`),
/// never merging entities fetched as deleted
pub(crate) fn merge_into_base(
    base: &mut BaseLayer,
    entities: &[Entity],
    force: bool,
    stats: &mut RebaseStats,
) -> Vec<BaseChange> {
    let mut changes = Vec::new();

    for entity in entities {
        if !entity.is_visible() {
            stats.skipped_deleted += 1;
            continue;
        }
        let previous = base.entities.get(&entity.id).cloned();
        let unchanged = previous.as_deref() == Some(entity);
        if unchanged || (previous.is_some() && !force) {
            stats.skipped_existing += 1;
            continue;
        }

        let touched = index::reconcile_base(base, &entity.id, previous.as_deref(), Some(entity));
        base.entities
            .insert(entity.id.clone(), Arc::new(entity.clone()));
        stats.merged += 1;
        changes.push(BaseChange {
            id: entity.id.clone(),
            touched,
        });
    }

    changes
}

/// Merge `entities` into the base layer shared by `chain` and repair every
/// chain member
///
/// All chain members must share one base layer. Input is validated up
/// front; a malformed entity fails the call before anything is merged.
/// Local overrides, tombstones included, are never overwritten.
pub fn rebase(entities: &[Entity], chain: &[&Graph], options: RebaseOptions) -> Result<RebaseStats> {
    validate_rebase_batch(entities)?;

    let Some(head) = chain.first() else {
        return Err(Error::ChainMismatch("rebase chain is empty".to_string()));
    };
    if let Some(position) = chain.iter().position(|g| !g.shares_base_with(head)) {
        return Err(Error::ChainMismatch(format!(
            "snapshot {} does not share the chain's base layer",
            position
        )));
    }

    let base_handle = Arc::clone(head.base_handle());
    let mut base = write(&base_handle);
    let mut stats = RebaseStats::default();
    let changes = merge_into_base(&mut base, entities, options.force, &mut stats);

    let revealed: HashSet<EntityId> = if options.restore_referenced {
        changes
            .iter()
            .filter_map(|c| base.entities.get(&c.id))
            .filter(|e| e.entity_type() == EntityType::Way)
            .flat_map(|way| way.references())
            .filter(|id| base.entities.contains_key(id))
            .collect()
    } else {
        HashSet::new()
    };

    for (position, graph) in chain.iter().enumerate() {
        // The chain's first snapshot keeps its deletions.
        let restorable = if position == 0 { None } else { Some(&revealed) };
        let (reindexed, restored) = repair(graph, &base, &changes, restorable);
        stats.reindexed_children += reindexed;
        stats.restored += restored;
        if reindexed > 0 || restored > 0 {
            stats.snapshots_repaired += 1;
        }
    }

    tracing::debug!(
        "Rebased {} entities into chain of {}: merged={}, skipped_existing={}, skipped_deleted={}, repaired={}",
        entities.len(),
        chain.len(),
        stats.merged,
        stats.skipped_existing,
        stats.skipped_deleted,
        stats.snapshots_repaired
    );

    Ok(stats)
}

/// Re-layer one snapshot's local deltas over the changed base
///
/// Only composites the snapshot overrides need work: for everything else the
/// snapshot already reads straight through to the updated base index.
/// Cached values may depend on any merged entity, children included, so the
/// snapshot's whole transient cache is dropped once anything changed.
fn repair(
    graph: &Graph,
    base: &BaseLayer,
    changes: &[BaseChange],
    restorable: Option<&HashSet<EntityId>>,
) -> (usize, usize) {
    let mut local = write(graph.local_lock());
    let mut reindexed = 0;

    for change in changes {
        let Some(head) = local.entities.get(&change.id).cloned() else {
            continue;
        };
        for (kind, child) in &change.touched {
            let wanted = index::references_for(head.as_deref(), *kind).contains(child);
            index::settle(&mut local, base, *kind, child, &change.id, wanted);
            reindexed += 1;
        }
    }

    let mut restored = 0;
    if let Some(revealed) = restorable {
        for id in revealed {
            if matches!(local.entities.get(id), Some(None)) {
                tracing::trace!("Restoring {} revealed by a merged way", id);
                local.entities.remove(id);
                restored += 1;
            }
        }
    }
    drop(local);

    if !changes.is_empty() || restored > 0 {
        graph.transients().clear();
    }
    (reindexed, restored)
}

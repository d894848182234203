//! Incremental reverse-index maintenance
//!
//! When a composite entity moves from an old version to a new one, only the
//! children in the symmetric difference of the two reference sets have their
//! parent sets touched. The old version is always the one the graph held
//! before the mutation.
//!
//! Local deltas are kept normalized: a `(child, parent)` pair appears in a
//! snapshot's delta only when the snapshot overrides `parent` and its
//! membership differs from what the base layer says.

use crate::entity::{Entity, EntityId};
use crate::layer::{BaseLayer, LocalLayer, ParentKind};

/// Reference set of `entity` as seen by the `kind` index
pub(crate) fn references_for(entity: Option<&Entity>, kind: ParentKind) -> Vec<EntityId> {
    match entity {
        Some(e) if ParentKind::of(e) == Some(kind) => e.references(),
        _ => Vec::new(),
    }
}

/// `(added, removed)` between two reference sets
pub(crate) fn diff(old: &[EntityId], new: &[EntityId]) -> (Vec<EntityId>, Vec<EntityId>) {
    let added = new.iter().filter(|id| !old.contains(id)).cloned().collect();
    let removed = old.iter().filter(|id| !new.contains(id)).cloned().collect();
    (added, removed)
}

/// Does the base version of `parent` reference `child`?
fn base_references(base: &BaseLayer, parent: &EntityId, child: &EntityId, kind: ParentKind) -> bool {
    base.index(kind)
        .get(child)
        .map_or(false, |parents| parents.contains(parent))
}

/// Bring the local delta for `(child, parent)` in line with `wanted`,
/// the membership the snapshot should observe
pub(crate) fn settle(
    local: &mut LocalLayer,
    base: &BaseLayer,
    kind: ParentKind,
    child: &EntityId,
    parent: &EntityId,
    wanted: bool,
) {
    let in_base = base_references(base, parent, child, kind);
    let deltas = local.deltas_mut(kind);
    let delta = deltas.entry(child.clone()).or_default();

    delta.added.retain(|p| p != parent);
    delta.removed.retain(|p| p != parent);
    match (wanted, in_base) {
        (true, false) => delta.added.push(parent.clone()),
        (false, true) => delta.removed.push(parent.clone()),
        _ => {}
    }

    if delta.is_empty() {
        deltas.remove(child);
    }
}

/// Update `local` deltas for composite `id` going from `old` to `new`
/// (`None` meaning absent or tombstoned)
pub(crate) fn reconcile_local(
    base: &BaseLayer,
    local: &mut LocalLayer,
    id: &EntityId,
    old: Option<&Entity>,
    new: Option<&Entity>,
) {
    for kind in ParentKind::ALL {
        let old_refs = references_for(old, kind);
        let new_refs = references_for(new, kind);
        let (added, removed) = diff(&old_refs, &new_refs);

        for child in &added {
            tracing::trace!("{} gains parent {} ({:?})", child, id, kind);
            settle(local, base, kind, child, id, true);
        }
        for child in &removed {
            tracing::trace!("{} loses parent {} ({:?})", child, id, kind);
            settle(local, base, kind, child, id, false);
        }
    }
}

/// Update the base index for composite `id` going from `old` to `new`
///
/// Returns every `(kind, child)` whose base parent set changed.
pub(crate) fn reconcile_base(
    base: &mut BaseLayer,
    id: &EntityId,
    old: Option<&Entity>,
    new: Option<&Entity>,
) -> Vec<(ParentKind, EntityId)> {
    let mut touched = Vec::new();

    for kind in ParentKind::ALL {
        let old_refs = references_for(old, kind);
        let new_refs = references_for(new, kind);
        let (added, removed) = diff(&old_refs, &new_refs);
        let index = base.index_mut(kind);

        for child in added {
            let parents = index.entry(child.clone()).or_default();
            if !parents.contains(id) {
                parents.push(id.clone());
            }
            touched.push((kind, child));
        }
        for child in removed {
            if let Some(parents) = index.get_mut(&child) {
                parents.retain(|p| p != id);
                if parents.is_empty() {
                    index.remove(&child);
                }
            }
            touched.push((kind, child));
        }
    }

    touched
}

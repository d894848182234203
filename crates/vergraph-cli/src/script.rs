//! Edit scripts and the snapshot history they are replayed against
//!
//! A script is a JSON object with a `steps` array. Each step names its
//! operation in an `op` field:
//!
//! ```json
//! {"steps": [
//!   {"op": "replace", "entity": {"id": "w1", "type": "way", "nodes": ["n1"]}},
//!   {"op": "remove", "id": "n2"},
//!   {"op": "revert", "id": "n2"},
//!   {"op": "batch", "steps": [{"op": "remove", "id": "w1"}]},
//!   {"op": "rebase", "entities": [], "force": true},
//!   {"op": "undo"}
//! ]}
//! ```

use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use vergraph_core::validation::validate_entity;
use vergraph_core::{
    rebase, Entity, EntityId, Error, Graph, GraphBuilder, Mutation, RebaseOptions, RebaseStats,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum Step {
    Replace {
        entity: Entity,
    },
    Remove {
        id: EntityId,
    },
    Revert {
        id: EntityId,
    },
    /// Several edits landing in one snapshot
    Batch {
        steps: Vec<Step>,
    },
    /// Merge fetched entities into every snapshot in the history
    Rebase {
        entities: Vec<Entity>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        force: Option<bool>,
        #[serde(default)]
        restore_referenced: bool,
    },
    Undo,
}

impl Step {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Replace { .. } => "replace",
            Self::Remove { .. } => "remove",
            Self::Revert { .. } => "revert",
            Self::Batch { .. } => "batch",
            Self::Rebase { .. } => "rebase",
            Self::Undo => "undo",
        }
    }

    /// Apply an edit step to a builder; only edits may appear in a batch
    fn apply_to(&self, builder: &mut GraphBuilder) -> vergraph_core::Result<()> {
        match self {
            Self::Replace { entity } => {
                validate_entity(entity)?;
                builder.replace(entity.clone());
            }
            Self::Remove { id } => {
                let entity = builder.entity(id.as_str())?;
                builder.remove(&entity);
            }
            Self::Revert { id } => {
                builder.revert(id.as_str());
            }
            other => {
                return Err(Error::InvalidMutation(format!(
                    "{} cannot appear inside a batch",
                    other.name()
                )))
            }
        }
        Ok(())
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Script {
    pub steps: Vec<Step>,
}

impl Script {
    pub fn read(path: &Path) -> anyhow::Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read script {}", path.display()))?;
        serde_json::from_str(&json).with_context(|| format!("Invalid script {}", path.display()))
    }
}

/// A linear undo history of snapshots over one base layer
pub struct History {
    current: Graph,
    past: Vec<Graph>,
    force_default: bool,
    totals: RebaseStats,
}

impl History {
    /// Start a history over `loaded`, sharing its base layer
    pub fn new(loaded: &Graph, force_default: bool) -> Self {
        Self {
            current: loaded.fork(),
            past: Vec::new(),
            force_default,
            totals: RebaseStats::default(),
        }
    }

    pub fn head(&self) -> &Graph {
        &self.current
    }

    /// Number of snapshots in the history, head included
    pub fn len(&self) -> usize {
        self.past.len() + 1
    }

    pub fn rebase_totals(&self) -> &RebaseStats {
        &self.totals
    }

    fn chain(&self) -> Vec<&Graph> {
        self.past.iter().chain(std::iter::once(&self.current)).collect()
    }

    fn push(&mut self, next: Graph) {
        if Graph::ptr_eq(&next, &self.current) {
            tracing::debug!("Step left the head snapshot unchanged");
            return;
        }
        let previous = std::mem::replace(&mut self.current, next);
        self.past.push(previous);
    }

    pub fn perform(&mut self, step: &Step) -> anyhow::Result<()> {
        tracing::debug!("Performing {} step", step.name());
        match step {
            Step::Replace { entity } => {
                validate_entity(entity)?;
                let next = self.current.replace(entity.clone());
                self.push(next);
            }
            Step::Remove { id } => {
                let entity = self.current.entity(id.as_str())?;
                let next = self.current.remove(&entity);
                self.push(next);
            }
            Step::Revert { id } => {
                let next = self.current.revert(id.as_str());
                self.push(next);
            }
            Step::Batch { steps } => {
                let mutations: Vec<Mutation<'_>> = steps
                    .iter()
                    .map(|s| Box::new(move |b: &mut GraphBuilder| s.apply_to(b)) as Mutation<'_>)
                    .collect();
                let next = self.current.apply_batch(mutations)?;
                self.push(next);
            }
            Step::Rebase {
                entities,
                force,
                restore_referenced,
            } => {
                let options = RebaseOptions {
                    force: force.unwrap_or(self.force_default),
                    restore_referenced: *restore_referenced,
                };
                let stats = rebase(entities, &self.chain(), options)?;
                tracing::info!(
                    "Rebased {} entities: {} merged across {} snapshots",
                    entities.len(),
                    stats.merged,
                    self.len()
                );
                self.totals.merged += stats.merged;
                self.totals.skipped_existing += stats.skipped_existing;
                self.totals.skipped_deleted += stats.skipped_deleted;
                self.totals.reindexed_children += stats.reindexed_children;
                self.totals.snapshots_repaired += stats.snapshots_repaired;
                self.totals.restored += stats.restored;
            }
            Step::Undo => {
                self.current = self
                    .past
                    .pop()
                    .ok_or_else(|| anyhow::anyhow!("Nothing to undo"))?;
            }
        }
        Ok(())
    }
}
